use crate::identity::AuthError;
use crate::lifecycle::LifecycleError;
use crate::models::ValidationError;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
///
/// Every handler converts its failure into exactly one of these, and each
/// one becomes a single user-visible message.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Submission rejected before reaching the store.
    Validation(ValidationError),
    /// Record store failure, with the message shown to the user.
    Store {
        /// The underlying store failure (logged, never shown).
        source: StoreError,
        /// Generic user-facing message for the failed action.
        message: &'static str,
    },
    /// Identity provider failure.
    Auth(AuthError),
    /// Missing or invalid bearer token.
    Unauthorized(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Input understood syntactically but nothing usable in it.
    Unprocessable(String),
}

impl AppError {
    pub fn store(source: StoreError, message: &'static str) -> Self {
        AppError::Store { source, message }
    }

    /// Maps a lifecycle failure, using `message` for store errors.
    pub fn lifecycle(err: LifecycleError, message: &'static str) -> Self {
        match err {
            LifecycleError::Validation(e) => AppError::Validation(e),
            LifecycleError::Store(e) => AppError::store(e, message),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "Validation error on {}: {}", e.field, e.message),
            AppError::Store { source, message } => write!(f, "{}: {}", message, source),
            AppError::Auth(e) => write!(f, "Auth error: {}", e),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Unprocessable(msg) => write!(f, "Unprocessable: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status code and JSON body.
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Validation(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": e.message, "field": e.field }),
            ),
            AppError::Store { source, message } => {
                let status = match source {
                    StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                tracing::error!("Store error: {}", source);
                (status, json!({ "error": message }))
            }
            AppError::Auth(e) => {
                let status = match e {
                    AuthError::InvalidCredentials | AuthError::InvalidToken => {
                        StatusCode::UNAUTHORIZED
                    }
                    AuthError::AlreadyRegistered => StatusCode::CONFLICT,
                    AuthError::Provider(_) => StatusCode::BAD_REQUEST,
                };
                tracing::warn!("Auth error: {:?}", e);
                (status, json!({ "error": e.user_message() }))
            }
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                (StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" }))
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Unprocessable(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": msg }))
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}
