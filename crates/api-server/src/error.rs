//! API error type and response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use augment_cache::AugmentError;
use lexicon_graph::{GraphQueryError, ResolveError};

/// Everything a handler can fail with, mapped onto a status code and a
/// JSON `{ error, detail }` body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad or missing request parameter. Rejected before any store call.
    #[error("{0}")]
    Validation(String),

    /// The center could not be resolved.
    #[error("{0}")]
    NotFound(String),

    /// The graph store or the cache database failed.
    #[error("{0}")]
    Upstream(String),

    /// Content generation failed on an explicit augment request.
    #[error("{0}")]
    Generation(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Generation(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::Upstream(_) => "upstream_error",
            ApiError::Generation(_) => "generation_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.to_string();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = self.label(), "{}", detail);
        }

        let body = serde_json::json!({
            "error": self.label(),
            "detail": detail,
        });
        (status, Json(body)).into_response()
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            ResolveError::Store(_) => ApiError::Upstream(err.to_string()),
        }
    }
}

impl From<GraphQueryError> for ApiError {
    fn from(err: GraphQueryError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl From<AugmentError> for ApiError {
    fn from(err: AugmentError) -> Self {
        match err {
            AugmentError::Generation(_) | AugmentError::Interrupted => {
                ApiError::Generation(err.to_string())
            }
            AugmentError::Database(_) | AugmentError::Io(_) | AugmentError::Corrupt(_) => {
                ApiError::Upstream(err.to_string())
            }
        }
    }
}
