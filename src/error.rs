//! Error handler for courier.

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Json(#[from] JsonRejection),

    #[error("invalid 'X-API-Key' header")]
    Unauthorized,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("no route matches `{0}`")]
    NotFound(String),

    #[error("email could not be sent: {0}")]
    Send(String),

    #[error("internal server error, {details}")]
    Internal {
        details: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Structure for error response bodies.
///
/// Every error leaving the service carries `success: false`, a short
/// `error` title, a human-readable `message` and an RFC-3339 timestamp.
/// Validation failures additionally enumerate the offending fields.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    success: bool,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
    timestamp: String,
    #[serde(skip)]
    status: StatusCode,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    /// Update `error` title field.
    pub fn title(mut self, title: &str) -> Self {
        self.error = title.into();
        self
    }

    /// Add detailed error message.
    pub fn details(mut self, description: &str) -> Self {
        self.message = description.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(self) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            success: false,
            error: "Internal Server Error".to_owned(),
            message: "An unexpected error occurred.".to_owned(),
            errors: None,
            timestamp: Utc::now().to_rfc3339(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue.to_string(),
            })
        })
        .collect()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = ResponseError::default()
            .title("Validation Error")
            .details(&self.to_string())
            .status(StatusCode::BAD_REQUEST);

        let response = match &self {
            ServerError::Validation(validation_errors) => {
                response
                    .details("There were validation errors with your request.")
                    .errors(validation_errors)
            },

            ServerError::Json(err) => response
                .title("Invalid Body")
                .details(&err.body_text()),

            ServerError::Unauthorized => response
                .title("Unauthorized")
                .details("Missing or invalid 'X-API-Key' header.")
                .status(StatusCode::UNAUTHORIZED),

            ServerError::RateLimited => response
                .title("Too Many Requests")
                .details("Rate limit exceeded, retry later.")
                .status(StatusCode::TOO_MANY_REQUESTS),

            ServerError::NotFound(path) => response
                .title("Not Found")
                .details(&format!("No route matches `{path}`."))
                .status(StatusCode::NOT_FOUND),

            ServerError::Send(details) => {
                tracing::error!(%details, "email dispatch failed");

                response
                    .title("Email Delivery Failed")
                    .details(details)
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
            },

            ServerError::Internal { details, source } => {
                tracing::error!(err = ?source, %details, "server returned 500 status");

                if cfg!(debug_assertions) {
                    ResponseError::default().details(details)
                } else {
                    ResponseError::default()
                }
            },
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "success": false,
                "error": "Internal Server Error",
                "message": "An unexpected error occurred.",
                "timestamp": Utc::now().to_rfc3339(),
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}
