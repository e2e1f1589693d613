use serde::Serialize;

use crate::accounts::validation::FieldErrors;

/// `{status, data?, errors?, message?}` wrapper every endpoint answers with.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            status: true,
            data: Some(data),
            errors: None,
            message: None,
        }
    }
}

impl Envelope<()> {
    pub fn ok() -> Self {
        Self {
            status: true,
            data: None,
            errors: None,
            message: None,
        }
    }

    pub fn invalid(errors: FieldErrors) -> Self {
        Self {
            status: false,
            data: None,
            errors: Some(errors),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: false,
            data: None,
            errors: None,
            message: Some(message.into()),
        }
    }
}
