use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// User name or email address.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// What a successful login returns. Never carries the submitted credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub user: i64,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<u64>,
}
