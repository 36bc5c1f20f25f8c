use serde::{Deserialize, Serialize};

/// Identifies the Firebase project and this installation.
///
/// The values come from the platform's `google-services` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirebaseOptions {
    pub project_id: String,
    pub api_key: String,
    pub app_id: String,
    /// Stable per-install identifier. Used as the Crashlytics user id and the
    /// Remote Config app instance id.
    pub device_id: String,
}

impl FirebaseOptions {
    pub fn new(project_id: impl Into<String>, api_key: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            api_key: api_key.into(),
            app_id: app_id.into(),
            device_id: String::new(),
        }
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }
}
