use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Resource not found error.
    NotFound(String),
    /// Bad request error (malformed payload).
    BadRequest(String),
    /// A financing input failed validation.
    InvalidInput(InvalidInputError),
    /// Error interacting with the identity provider.
    ExternalApiError(String),
    /// Unauthorized access error.
    Unauthorized(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::InvalidInput(e) => write!(f, "Invalid input: {}", e),
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status code and JSON body.
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::InvalidInput(e) => {
                tracing::debug!("Rejected financing input: {}", e);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({ "error": e.reason, "field": e.field }),
                )
            }
            AppError::ExternalApiError(msg) => {
                tracing::error!("External API error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "External service error" }),
                )
            }
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                (StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" }))
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<InvalidInputError> for AppError {
    fn from(err: InvalidInputError) -> Self {
        AppError::InvalidInput(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Failure while resolving the session or the account behind it.
///
/// Never surfaced to the user: the guard turns it into a login redirect.
#[derive(Debug, Clone)]
pub enum SessionLookupError {
    /// The provider could not be reached or answered with an unexpected status.
    Provider(String),
    /// The circuit breaker is open and the call was not attempted.
    CircuitOpen,
    /// The provider answered, but the payload could not be understood.
    Malformed(String),
}

impl fmt::Display for SessionLookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionLookupError::Provider(msg) => write!(f, "identity provider failure: {}", msg),
            SessionLookupError::CircuitOpen => write!(f, "identity provider circuit is open"),
            SessionLookupError::Malformed(msg) => write!(f, "malformed provider response: {}", msg),
        }
    }
}

impl std::error::Error for SessionLookupError {}

/// Failure inserting the default record for a session that has no account.
#[derive(Debug, Clone)]
pub struct AccountProvisioningError {
    pub account_id: String,
    pub reason: String,
}

impl fmt::Display for AccountProvisioningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not provision account {}: {}",
            self.account_id, self.reason
        )
    }
}

impl std::error::Error for AccountProvisioningError {}

/// Out-of-range financing input. `field` uses the wire name of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidInputError {
    pub field: &'static str,
    pub reason: String,
}

impl InvalidInputError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for InvalidInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

impl std::error::Error for InvalidInputError {}
