use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder};
use serde::Serialize;

use crate::types::response::ApiResponse;

pub const AUTHN_ERROR: &str = "Authentication failed";
pub const STORE_ERROR: &str = "Database error";
pub const TOKEN_ERROR: &str = "Issue token failed";
pub const INVALID_CREDENTIALS: &str = "invalid username or password";

/// A wrapper struct for HTTP responses that provides convenient methods
/// for creating common response types
pub struct Response {
    http_response: HttpResponse,
}

impl Response {
    pub fn not_found() -> Self {
        Self::err_response(StatusCode::NOT_FOUND, "Resource not found".to_string())
    }

    pub fn bad_request(message: impl AsRef<str>) -> Self {
        let message = format!("Bad request: {}", message.as_ref());
        Self::err_response(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthenticated(message: impl AsRef<str>) -> Self {
        let message = format!("Unauthenticated: {}", message.as_ref());
        Self::err_response(StatusCode::UNAUTHORIZED, message)
    }

    /// No detail on which rule failed is ever given.
    pub fn forbidden() -> Self {
        Self::err_response(StatusCode::FORBIDDEN, "Forbidden: access denied".to_string())
    }

    pub fn method_not_allowed() -> Self {
        Self::err_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed".to_string(),
        )
    }

    pub fn error(message: &str) -> Self {
        let message = format!("Server error: {message}");
        Self::err_response(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn unavailable(message: &str) -> Self {
        let message = format!("Service unavailable: {message}");
        Self::err_response(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn ok() -> Self {
        let resp = ApiResponse::<()>::empty(StatusCode::OK.into());
        Self {
            http_response: HttpResponse::Ok().json(resp),
        }
    }

    pub fn json<T: Serialize>(data: T) -> Self {
        let resp = ApiResponse::data(StatusCode::OK.into(), data);
        Self {
            http_response: HttpResponse::Ok().json(resp),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.http_response.status()
    }

    fn err_response(status: StatusCode, message: String) -> Self {
        let resp = ApiResponse::<()>::message(status.into(), message);
        Self {
            http_response: HttpResponseBuilder::new(status).json(resp),
        }
    }
}

impl From<Response> for HttpResponse {
    fn from(val: Response) -> Self {
        val.http_response
    }
}
