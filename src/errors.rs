use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use crate::{accounts::validation::FieldErrors, response::Envelope};

pub const INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const UNAUTHENTICATED: &str = "Unauthenticated.";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed on {} field(s)", .0.len())]
    Validation(FieldErrors),
    /// Unknown email and wrong password both end up here.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("unauthenticated")]
    Unauthenticated,
    /// The body could not be read or decoded at all.
    #[error("malformed request body: {message}")]
    MalformedBody { status: StatusCode, message: String },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidCredentials | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::MalformedBody { status, .. } => *status,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation(errors) => Envelope::invalid(errors),
            AppError::InvalidCredentials => Envelope::failure(INVALID_CREDENTIALS),
            AppError::Unauthenticated => Envelope::failure(UNAUTHENTICATED),
            AppError::MalformedBody { message, .. } => {
                warn!(%status, message = %message, "request body rejected");
                Envelope::failure(message)
            }
            AppError::Internal(e) => {
                error!(error = ?e, "request failed");
                Envelope::failure("Server Error")
            }
        };
        (status, Json(body)).into_response()
    }
}
