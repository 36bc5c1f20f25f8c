use serde_json::{Map, Value};

#[derive(Debug, serde::Serialize)]
pub(crate) struct CallableRequest<'a> {
    pub(crate) data: &'a Value,
}

/// Body of a successful callable response. Older backends answer with `data`
/// instead of `result`; a `null` result is still a result.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(transparent)]
pub(crate) struct CallableResponse(Map<String, Value>);

impl CallableResponse {
    pub(crate) fn into_value(mut self) -> Option<Value> {
        self.0.remove("result").or_else(|| self.0.remove("data"))
    }
}
