use std::collections::HashMap;

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FetchRequest<'a> {
    pub(crate) app_instance_id: &'a str,
    pub(crate) app_id: &'a str,
    pub(crate) sdk_version: &'a str,
}

/// Template state reported by the fetch endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateState {
    #[default]
    Update,
    NoChange,
    NoTemplate,
    EmptyConfig,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponse {
    #[serde(default)]
    pub entries: HashMap<String, String>,
    #[serde(default)]
    pub state: TemplateState,
    pub template_version: Option<String>,
}

/// Where a value returned by a getter came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// Not set anywhere; the getter returned the type's zero value.
    Static,
    Default,
    Remote,
}
