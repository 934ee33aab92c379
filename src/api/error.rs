use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::store::{StoreError, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The request never reached validation: unreadable body or id.
    #[error("{0}")]
    BadRequest(String),
    #[error("Email is already registered")]
    DuplicateEmail,
    #[error("{0}")]
    NotFound(&'static str),
    /// Generic message only; the cause is logged where it happened.
    #[error("{0}")]
    Internal(&'static str),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) | ApiError::DuplicateEmail => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Maps a store failure, logging infrastructure errors under `context`.
    pub fn from_store(err: StoreError, context: &'static str) -> Self {
        match err {
            StoreError::DuplicateEmail => ApiError::DuplicateEmail,
            StoreError::NotFound => ApiError::NotFound("Contact not found"),
            StoreError::Validation(e) => ApiError::Validation(e),
            StoreError::Database(e) => {
                error!("{}: {}", context, e);
                tracing::Span::current().record("error", tracing::field::display(&e));
                ApiError::Internal(context)
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected contact body: {}", rejection.body_text());
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        warn!("Rejected contact id: {}", rejection.body_text());
        ApiError::BadRequest("Invalid contact id".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "message": self.to_string() }))).into_response()
    }
}
