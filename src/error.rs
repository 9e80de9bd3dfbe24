//! Error types shared across the crate.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Main error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Invalid reservation: {0}")]
    InvalidReservation(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Application error: {0}")]
    App(String),

    #[error("Not found")]
    NotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Reservation store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Reservation not found: {0}")]
    NotFound(i64),

    #[error("Reservation {id} belongs to namespace `{namespace}`")]
    WrongNamespace { id: i64, namespace: String },

    #[error("Store is poisoned")]
    Poisoned,
}

/// Template resolution errors.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("None of the templates exist: {}", .0.join(", "))]
    NotFound(Vec<String>),

    #[error("No template given")]
    NothingSelected,
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl Error {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Error::NotFound | Error::Store(StoreError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            Error::Store(StoreError::WrongNamespace { .. }) => (StatusCode::NOT_FOUND, "not_found"),
            Error::InvalidDate(_) => (StatusCode::NOT_FOUND, "invalid_date"),
            Error::InvalidReservation(_) => (StatusCode::BAD_REQUEST, "invalid_reservation"),
            Error::Template(_) => (StatusCode::INTERNAL_SERVER_ERROR, "template"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
                code,
            }),
        )
            .into_response()
    }
}
