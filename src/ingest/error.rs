use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::error::{masked, ErrorResponse};
use crate::normalizer::NormalizeError;
use crate::store::StoreError;

/// Terminal failure of one webhook ingestion.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Missing webhook token")]
    MissingToken,

    #[error("Invalid webhook token")]
    InvalidToken,

    /// Source missing or disabled; callers cannot tell which
    #[error("Source not found")]
    SourceUnavailable,

    #[error("Malformed body: {0}")]
    MalformedBody(String),

    #[error(transparent)]
    PayloadRejected(#[from] NormalizeError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    pub fn status(&self) -> StatusCode {
        match self {
            IngestError::UnknownProvider(_) | IngestError::MalformedBody(_) => {
                StatusCode::BAD_REQUEST
            }
            IngestError::MissingToken | IngestError::InvalidToken => StatusCode::UNAUTHORIZED,
            IngestError::SourceUnavailable => StatusCode::NOT_FOUND,
            IngestError::PayloadRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            IngestError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            IngestError::UnknownProvider(_) => "UNKNOWN_PROVIDER",
            IngestError::MissingToken => "MISSING_TOKEN",
            IngestError::InvalidToken => "INVALID_TOKEN",
            IngestError::SourceUnavailable => "SOURCE_UNAVAILABLE",
            IngestError::MalformedBody(_) => "MALFORMED_BODY",
            IngestError::PayloadRejected(_) => "PAYLOAD_REJECTED",
            IngestError::Store(_) => "STORE_ERROR",
        }
    }

    /// Metric label for this outcome.
    pub fn outcome(&self) -> &'static str {
        match self {
            IngestError::UnknownProvider(_) => "unknown_provider",
            IngestError::MissingToken => "missing_token",
            IngestError::InvalidToken => "invalid_token",
            IngestError::SourceUnavailable => "source_unavailable",
            IngestError::MalformedBody(_) => "malformed_body",
            IngestError::PayloadRejected(_) => "payload_rejected",
            IngestError::Store(_) => "store_error",
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            IngestError::Store(e) => masked(e.to_string(), "Service temporarily unavailable"),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(code = %self.code(), error = %self, "Ingestion failed");
        } else {
            tracing::debug!(code = %self.code(), error = %self, "Ingestion rejected");
        }

        (status, Json(ErrorResponse::new(self.code(), message))).into_response()
    }
}
