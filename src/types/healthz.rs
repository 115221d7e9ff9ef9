use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthzResponse {
    pub version: String,
    /// Server clock, unix seconds.
    pub now: u64,
    pub time_zone: String,
    pub uptime_secs: u64,
    pub client_ip: Option<String>,
    /// Whether the root user has been seeded into the store.
    pub bootstrapped: bool,
}
