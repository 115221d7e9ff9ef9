pub mod api;
pub mod healthz;
pub mod sessions;

use actix_web::HttpRequest;
use thiserror::Error;

use super::response::Response;

pub trait Handler {
    fn handle(&self, path: &str, req: HttpRequest, body: Option<Vec<u8>>) -> Response;
}

/// Request failures that are not authorization decisions.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("resource not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),
}
