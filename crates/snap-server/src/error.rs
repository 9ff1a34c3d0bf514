use std::error::Error as _;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

use snap_content::ContentError;
use snap_images::ImageError;
use snap_notify::NotifyError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Content(e) => match e {
                ContentError::Validation(_) | ContentError::ImageReferences(_) => {
                    StatusCode::BAD_REQUEST
                }
                ContentError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Image(e) => match e {
                ImageError::UnsupportedType(_) | ImageError::TooLarge { .. } => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Extra machine-readable context for the failure envelope.
    fn details(&self) -> Option<Value> {
        match self {
            Self::Content(ContentError::ImageReferences(refs)) => serde_json::to_value(refs).ok(),
            Self::Content(e @ ContentError::CommitFailed { .. }) => {
                let mut chain = Vec::new();
                let mut source = e.source();
                while let Some(cause) = source {
                    chain.push(Value::String(cause.to_string()));
                    source = cause.source();
                }
                Some(Value::Array(chain))
            }
            _ => None,
        }
    }
}

impl From<NotifyError> for ServerError {
    fn from(e: NotifyError) -> Self {
        match e {
            NotifyError::Unauthorized => Self::Unauthorized,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ServerError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ServerError {
    fn from(e: MultipartError) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let mut body = json!({
            "success": false,
            "error": self.to_string(),
        });
        if let Some(details) = self.details() {
            body["details"] = details;
        }
        (status, Json(body)).into_response()
    }
}
