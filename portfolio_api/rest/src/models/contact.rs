use portfolio_models::contact::ContactSubmission;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Raw contact form fields. Values which are not strings are treated as if
/// they were missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiContactSubmission {
    /// Name of the author
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    /// Email address of the author
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    /// Content of the message
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
}

impl From<ApiContactSubmission> for ContactSubmission {
    fn from(value: ApiContactSubmission) -> Self {
        Self {
            name: value.name,
            email: value.email,
            message: value.message,
        }
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(Some(value)),
        _ => Ok(None),
    }
}
