use serde::{Deserialize, Serialize};

/// Body returned to AJAX callers.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
pub struct JsonResponse {
    pub success: bool,
    pub title: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

impl JsonResponse {
    pub fn success(title: &str, text: &str) -> Self {
        Self {
            success: true,
            title: title.to_string(),
            text: text.to_string(),
            redirect_url: None,
        }
    }

    pub fn failure(title: &str, text: &str) -> Self {
        Self {
            success: false,
            title: title.to_string(),
            text: text.to_string(),
            redirect_url: None,
        }
    }

    pub fn with_redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
