use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Application-level error taxonomy.
///
/// Donor-facing responses carry field-level messages for validation
/// failures and generic text for everything else; the underlying detail is
/// written to the operator log, never serialized into the response body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// A single-field rejection with a donor-facing message (amount bounds,
    /// reward minimums).
    #[error("{field}: {message}")]
    Field { field: &'static str, message: String },

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    /// Operator misconfiguration (missing credentials, bad settings).
    #[error("Configuration error: {0}")]
    Configuration(anyhow::Error),

    /// The payment provider could not be reached or answered non-2xx.
    /// `detail` carries the raw provider error body for diagnostics.
    #[error("Payment gateway unavailable: {detail}")]
    GatewayUnavailable { detail: String },

    /// A provider callback that is missing required fields or otherwise
    /// does not match the integration contract.
    #[error("Malformed callback: {0}")]
    MalformedCallback(anyhow::Error),

    #[error("Database error: {0}")]
    Database(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<BTreeMap<String, Vec<String>>>,
}

fn field_map(field: &str, message: String) -> BTreeMap<String, Vec<String>> {
    let mut errors = BTreeMap::new();
    errors.insert(field.to_string(), vec![message]);
    errors
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match self {
            AppError::Validation(errs) => {
                let mut map = BTreeMap::new();
                for (field, field_errors) in errs.field_errors() {
                    let messages = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| format!("The {} field is invalid.", field))
                        })
                        .collect();
                    map.insert(field.to_string(), messages);
                }
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "The given data was invalid.".to_string(),
                    Some(map),
                )
            }
            AppError::Field { field, message } => (
                StatusCode::BAD_REQUEST,
                "The given data was invalid.".to_string(),
                Some(field_map(field, message)),
            ),
            AppError::BadRequest(err) => (StatusCode::BAD_REQUEST, err.to_string(), None),
            AppError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string(), None),
            AppError::Conflict(err) => (StatusCode::CONFLICT, err.to_string(), None),
            AppError::Configuration(err) => {
                tracing::error!(error = %err, "configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "The service is not available right now. Please try again later.".to_string(),
                    None,
                )
            }
            AppError::GatewayUnavailable { detail } => {
                tracing::error!(detail = %detail, "payment gateway unavailable");
                (
                    StatusCode::BAD_GATEWAY,
                    "We could not reach the payment provider. Please try again.".to_string(),
                    None,
                )
            }
            AppError::MalformedCallback(err) => {
                tracing::error!(error = %err, "malformed provider callback");
                (
                    StatusCode::BAD_REQUEST,
                    "The payment could not be confirmed.".to_string(),
                    None,
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred. Please try again later.".to_string(),
                    None,
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred. Please try again later.".to_string(),
                    None,
                )
            }
        };

        (
            status,
            Json(ErrorBody {
                status: "error",
                message,
                errors,
            }),
        )
            .into_response()
    }
}
