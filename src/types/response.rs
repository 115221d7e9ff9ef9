use serde::{Deserialize, Serialize};

/// Body of every API response: `{code, message?, data?}`. Errors carry a
/// message and no data, successes carry data (or nothing, for deletes).
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn data(code: u16, data: T) -> Self {
        Self {
            code,
            message: None,
            data: Some(data),
        }
    }

    pub fn message(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn empty(code: u16) -> Self {
        Self {
            code,
            message: None,
            data: None,
        }
    }
}
