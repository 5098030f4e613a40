//! Request/response DTOs for the HTTP surface.

pub mod auth;

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
