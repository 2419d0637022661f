//! Error Handling
//!
//! Unified error types and their conversion into JSON API responses. Every
//! failure path of the service ends up as `{ "error": "<message>" }` with one of
//! 400 / 401 / 403 / 404 / 500.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::orders::OrderError;

/// ApiError
///
/// The error type returned by every handler and by the `AuthUser` extractor.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or semantically invalid input (400).
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credentials (401).
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but the role or ownership does not allow the action (403).
    #[error("{0}")]
    Forbidden(String),

    /// The addressed resource does not exist (404).
    #[error("{0}")]
    NotFound(String),

    /// Persistence or other internal failure (500). The message is logged, not returned.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// ErrorBody
///
/// Wire shape shared by every error response.
#[derive(Debug, Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                "Internal server error".to_string()
            }
            ApiError::Unauthorized(msg) | ApiError::Forbidden(msg) => {
                tracing::warn!(status = status.as_u16(), reason = %msg, "access denied");
                msg
            }
            ApiError::Validation(msg) | ApiError::NotFound(msg) => msg,
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// RepoError
///
/// Failures surfaced by `Repository` implementations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The generated order number already exists; the caller may retry with a new one.
    #[error("order number {0} already exists")]
    DuplicateOrderNumber(String),

    /// A stored row could not be mapped back into a domain value.
    #[error("corrupt row: {0}")]
    Decode(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// JSON body extractor/response whose rejections use the `ApiError` shape.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

impl<T: Serialize> IntoResponse for AppJson<T> {
    fn into_response(self) -> Response {
        Json(self.0).into_response()
    }
}

/// Query-string extractor whose rejections use the `ApiError` shape.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

/// Path extractor whose rejections use the `ApiError` shape.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);
