// src/handlers/error.rs
use std::fmt;
use warp::http::StatusCode;
use warp::reject::Reject;

use crate::services::offline_router::RouterError;
use crate::services::push::PushError;
use crate::services::rent_to_own::QuoteError;

#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}
impl Reject for ApiError {}

impl From<QuoteError> for ApiError {
    fn from(err: QuoteError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<PushError> for ApiError {
    fn from(err: PushError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<RouterError> for ApiError {
    fn from(err: RouterError) -> Self {
        let status = match &err {
            RouterError::Offline { .. } | RouterError::MissingFallback(_) => StatusCode::SERVICE_UNAVAILABLE,
            RouterError::Network(_) => StatusCode::BAD_GATEWAY,
            RouterError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            RouterError::InstallFailed { .. } | RouterError::InvalidState { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, err.to_string())
    }
}
