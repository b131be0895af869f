//! Layered error types for the notification substrate.
//!
//! - [`DomainError`] — business-level errors raised by the three core
//!   components (store conflicts, constraint violations, quota, etc).
//! - [`InvalidPushToken`] — the single opaque error push-token verification
//!   is allowed to surface; it deliberately does not expose which internal
//!   check failed.
//! - [`NotifyError`] — unifies the above for application code.
//! - [`ApiError`] — HTTP-facing error with a [`IntoResponse`] impl.
//!
//! # Error Philosophy
//!
//! Per-request paths (`poll`, `verify_push_token`) surface errors to the
//! caller with a domain-level kind and an implied HTTP status. The
//! scheduler never propagates an error out of its sweep loop: everything
//! it encounters is logged and the sweep continues.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// DOMAIN ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Domain-level errors raised by the watch store, poll coalescer, and
/// push-token verifier.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DomainError {
    /// Creating a watch whose id already exists.
    #[error("duplicate watch id: {0}")]
    Duplicate(String),

    /// Getting a missing watch record.
    #[error("watch record not found: {0}")]
    NotFound(String),

    /// Watch CAS failed (sequence conflict).
    #[error("sequence conflict, expected sequence {expected}")]
    InvalidState {
        /// The sequence the caller should have supplied.
        expected: u64,
    },

    /// TTL too long at watch creation, or a push-token constraint
    /// (expiry, event mismatch, signature mismatch) failed.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Push token is structurally malformed.
    #[error("malformed push token")]
    Syntax,

    /// HMAC key uses an unrecognized multibase or multikey header.
    #[error("unsupported key encoding: {0}")]
    NotSupported(String),

    /// HMAC key length does not match its declared type.
    #[error("invalid key material: {0}")]
    Data(String),

    /// The poll cache's in-flight capacity is saturated.
    #[error("poll cache saturated")]
    QuotaExceeded,

    /// The external resource client failed.
    #[error("resource operation failed: {0}")]
    Operation(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DomainError {
    /// Build an [`Operation`](Self::Operation) error from any source error.
    pub fn operation<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Operation(Box::new(err))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PUSH TOKEN ERROR (opaque at the public boundary)
// ═══════════════════════════════════════════════════════════════════════════════

/// Opaque failure of push-token verification.
///
/// Deliberately does not implement `From<DomainError>` publicly and does not
/// expose its cause through `Display`: callers must not be able to learn
/// whether a token was expired, mismatched, or malformed from this type
/// alone. The cause is kept for internal logging via `#[source]`.
#[derive(Debug, Error)]
#[error("invalid push token")]
pub struct InvalidPushToken {
    #[source]
    pub(crate) cause: DomainError,
}

impl InvalidPushToken {
    pub(crate) fn new(cause: DomainError) -> Self {
        Self { cause }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// APPLICATION ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Application-level errors combining domain and push-token errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NotifyError {
    /// A domain-level error from the store, coalescer, or key loader.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Push-token verification failed.
    #[error(transparent)]
    InvalidPushToken(#[from] InvalidPushToken),

    /// Settings failed to load or validate.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Type alias for application `Result`s.
pub type Result<T> = std::result::Result<T, NotifyError>;

// ═══════════════════════════════════════════════════════════════════════════════
// API ERRORS (HTTP-specific)
// ═══════════════════════════════════════════════════════════════════════════════

/// API-level errors with HTTP status codes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Wrapped application error.
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// Invalid request parameters that never reached domain logic.
    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::Notify(NotifyError::Domain(DomainError::Duplicate(_))) => {
                (StatusCode::CONFLICT, "DUPLICATE", self.to_string())
            }
            Self::Notify(NotifyError::Domain(DomainError::NotFound(_))) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string())
            }
            Self::Notify(NotifyError::Domain(DomainError::InvalidState { .. })) => {
                (StatusCode::CONFLICT, "INVALID_STATE", self.to_string())
            }
            Self::Notify(NotifyError::Domain(
                DomainError::Constraint(_)
                | DomainError::Syntax
                | DomainError::NotSupported(_)
                | DomainError::Data(_),
            ))
            | Self::Notify(NotifyError::InvalidPushToken(_))
            | Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", self.to_string()),

            Self::Notify(NotifyError::Domain(DomainError::QuotaExceeded)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "QUOTA_EXCEEDED", self.to_string())
            }

            Self::Notify(NotifyError::Domain(DomainError::Operation(_)))
            | Self::Notify(NotifyError::Config(_)) => {
                tracing::error!(error = ?self, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal error".into(),
                )
            }
        };

        (
            status,
            Json(json!({
                "error": {
                    "code": code,
                    "message": message
                }
            })),
        )
            .into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
