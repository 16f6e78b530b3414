use thiserror::Error;

/// Everything that can go wrong between the client and the MathMentor backend.
///
/// None of these are fatal: the controller and form flows convert them into
/// inline feedback (an error bubble, a field message, a sidebar banner).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// HTTP 401 from a wrapped endpoint. The host has already been redirected.
    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("{message}")]
    Validation { field: Field, message: String },

    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Local storage error: {0}")]
    Storage(String),
}

/// Form fields that can carry a validation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Email,
    Username,
    Password,
    ConfirmPassword,
}

impl ClientError {
    pub fn validation(field: Field, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<sqlx::Error> for ClientError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
