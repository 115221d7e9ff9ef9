use serde::{Deserialize, Serialize};

use super::method::Method;

/// Grants of one role (or API key) on one resource, with every method present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodGrants {
    #[serde(rename = "GET")]
    pub get: u8,
    #[serde(rename = "POST")]
    pub post: u8,
    #[serde(rename = "PATCH")]
    pub patch: u8,
    #[serde(rename = "PUT")]
    pub put: u8,
    #[serde(rename = "DELETE")]
    pub delete: u8,
}

impl MethodGrants {
    pub fn set(&mut self, method: Method, value: u8) {
        match method {
            Method::Get => self.get = value,
            Method::Post => self.post = value,
            Method::Patch => self.patch = value,
            Method::Put => self.put = value,
            Method::Delete => self.delete = value,
        }
    }
}
