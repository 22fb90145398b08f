//! Error replies.
//!
//! Every `ProxyError` becomes the same `500 Proxy Error` body; the variant
//! only shows up in the `message` text and in logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ProxyError;

const STATUS_MESSAGE: &str = "Proxy Error";

/// JSON body of a failed `POST /api/proxy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub status_message: String,
    pub message: String,
}

impl From<&ProxyError> for ErrorBody {
    fn from(err: &ProxyError) -> Self {
        let message = err.to_string();
        Self {
            status_code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            status_message: STATUS_MESSAGE.to_string(),
            message: if message.is_empty() {
                "Unknown error".to_string()
            } else {
                message
            },
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::from(&self))).into_response()
    }
}
