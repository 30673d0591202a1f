// src/error.rs
//! Error taxonomy shared by the scraping, search and scoring layers.
//!
//! Fetch-level failures never surface here as raised errors: the fetcher
//! absorbs them into `None`. What remains are the failures a request-serving
//! boundary has to tell apart, each with a stable wire code.

use axum::http::StatusCode;

use crate::llm::{DecodeError, LlmError};

/// Coarse classification exposed to API callers. `code()` is part of the
/// public wire format; retry logic on the caller side keys off it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unreachable,
    InvalidContent,
    InsufficientInput,
    ModelRefusal,
    MalformedModelOutput,
    RateLimited,
    Timeout,
    Upstream,
    Internal,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Unreachable => "unreachable",
            ErrorKind::InvalidContent => "invalid_content",
            ErrorKind::InsufficientInput => "insufficient_input",
            ErrorKind::ModelRefusal => "model_refusal",
            ErrorKind::MalformedModelOutput => "malformed_output",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Upstream => "upstream_error",
            ErrorKind::Internal => "internal",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Unreachable => StatusCode::BAD_GATEWAY,
            ErrorKind::InvalidContent => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::InsufficientInput => StatusCode::BAD_REQUEST,
            ErrorKind::ModelRefusal => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::MalformedModelOutput => StatusCode::BAD_GATEWAY,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScoutError {
    #[error("Invalid link. Unable to access {0} (403/404 error or invalid URL)")]
    Unreachable(String),

    #[error("page at {0} did not render usable content")]
    InvalidContent(String),

    /// Validation gate failure; the message is shown to the user verbatim.
    #[error("{0}")]
    InsufficientInput(String),

    #[error("model could not process the input: {0}")]
    ModelRefusal(String),

    #[error("model returned unparsable output: {0}")]
    MalformedModelOutput(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("storage error: {0}")]
    Store(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

impl ScoutError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScoutError::Unreachable(_) => ErrorKind::Unreachable,
            ScoutError::InvalidContent(_) => ErrorKind::InvalidContent,
            ScoutError::InsufficientInput(_) => ErrorKind::InsufficientInput,
            ScoutError::ModelRefusal(_) => ErrorKind::ModelRefusal,
            ScoutError::MalformedModelOutput(_) => ErrorKind::MalformedModelOutput,
            ScoutError::Llm(e) => e.kind(),
            ScoutError::Store(_) | ScoutError::Json(_) | ScoutError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl From<DecodeError> for ScoutError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::Refusal(s) => ScoutError::ModelRefusal(s),
            DecodeError::Unparsable(s) => ScoutError::MalformedModelOutput(s),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScoutError>;
