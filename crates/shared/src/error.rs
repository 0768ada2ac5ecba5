use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Network,
    Server,
    Schema,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassificationError {
    #[error("{message}")]
    Validation { message: String },
    #[error("network error: {message}")]
    Network { message: String },
    #[error("server error {status}: {message}")]
    Server {
        status: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        message: String,
    },
    #[error("unrecognized response: {message}")]
    Schema { message: String },
}

impl ClassificationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn server(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Network { .. } => ErrorKind::Network,
            Self::Server { .. } => ErrorKind::Server,
            Self::Schema { .. } => ErrorKind::Schema,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message suitable for showing next to the selected image.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message } => message.clone(),
            Self::Network { .. } => {
                "Classification service is unreachable; check your connection and retry."
                    .to_string()
            }
            Self::Server {
                status, message, ..
            } => match status {
                400 => "The service rejected the image as invalid; try a different photo."
                    .to_string(),
                413 => "The image file is too large for the classification service.".to_string(),
                422 => "The service could not process this image; try a clearer photo.".to_string(),
                429 => "Too many classification requests; wait a moment and retry.".to_string(),
                500..=599 => {
                    "The classification service hit an internal error; retry later.".to_string()
                }
                _ => message.clone(),
            },
            Self::Schema { .. } => {
                "The classification service returned a response this client does not understand."
                    .to_string()
            }
        }
    }
}
