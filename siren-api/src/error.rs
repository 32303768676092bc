//! Errors surfaced by HTTP handlers.
//!
//! Every failure maps onto the same `{ success: false, error }` envelope
//! with status 400, which is what dispatch consoles branch on.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use siren_core::{DispatchError, StoreError};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{error, warn};

use crate::wire::{ErrorBody, RequestError};

/// Message returned when the failure detail is internal.
const INTERNAL_MESSAGE: &str = "dispatch store unavailable";

/// Errors returned by the API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The body was not valid JSON for the endpoint.
    #[error("invalid request body: {0}")]
    Body(#[from] JsonRejection),
    /// The query string could not be decoded.
    #[error("invalid query string: {0}")]
    Query(#[from] QueryRejection),
    /// The body decoded but failed validation.
    #[error(transparent)]
    Request(#[from] RequestError),
    /// The orchestrator rejected the dispatch.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// A read-only view could not load its data.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The blocking worker running the request did not finish.
    #[error("request worker failed: {0}")]
    Worker(#[from] JoinError),
}

impl ApiError {
    /// Whether the detail belongs in server logs rather than the response.
    const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Worker(_) | Self::Dispatch(DispatchError::Store(_))
        )
    }

    /// Text placed in the failure envelope.
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            INTERNAL_MESSAGE.to_owned()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.is_internal() {
            error!(error = %self, "request failed");
        } else {
            warn!(error = %self, "request rejected");
        }
        let body = ErrorBody::new(self.public_message());
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use siren_core::VehicleType;

    #[rstest]
    fn dispatch_failures_keep_their_message() {
        let err = ApiError::from(DispatchError::NoDepot {
            vehicle_type: VehicleType::Police,
        });
        assert_eq!(err.public_message(), "no depot found for police");
    }

    #[rstest]
    fn store_failures_are_masked() {
        let source = std::io::Error::other("disk gone");
        let err = ApiError::from(DispatchError::Store(StoreError::backend("load zones", source)));
        assert_eq!(err.public_message(), INTERNAL_MESSAGE);
    }

    #[rstest]
    fn responses_use_bad_request() {
        let response = ApiError::from(RequestError::MissingTarget).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
