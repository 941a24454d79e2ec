//! Web-layer error type: maps [`braid_core::CollabError`] (and this crate's own failures) onto
//! HTTP status codes, matching the teacher's `Error` / `IntoResponse` shape.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use braid_core::CollabError;
use serde_json::json;
use tracing::{error, warn};

#[derive(Debug)]
pub enum Error {
    AuthFailNoUser,
    Collab(CollabError),
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::AuthFailNoUser => (StatusCode::UNAUTHORIZED, "no user identity on request".to_string()),
            Error::Collab(e) => {
                if e.is_silent() {
                    warn!(error = %e, "transient collaboration error");
                } else if matches!(e, CollabError::Fatal(_)) {
                    error!(error = %e, "fatal collaboration error");
                }
                let status = match e {
                    CollabError::Unauthorized(_) => StatusCode::FORBIDDEN,
                    CollabError::NotFound(_) => StatusCode::NOT_FOUND,
                    CollabError::BadOperation(_) => StatusCode::BAD_REQUEST,
                    CollabError::Conflict(_) => StatusCode::CONFLICT,
                    CollabError::Stale => StatusCode::CONFLICT,
                    CollabError::Oversize(_) => StatusCode::PAYLOAD_TOO_LARGE,
                    CollabError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
                    CollabError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    CollabError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
            Error::Internal(msg) => {
                error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        (status, Json(json!({ "error": { "message": message } }))).into_response()
    }
}

impl From<CollabError> for Error {
    fn from(err: CollabError) -> Self {
        Error::Collab(err)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Internal(err.to_string())
    }
}
