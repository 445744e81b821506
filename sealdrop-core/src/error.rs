use thiserror::Error;

#[derive(Debug, Error)]
pub enum DropError {
    #[error("network error: {0}")]
    Network(String),

    #[error("http error: status={status} {message}")]
    Http { status: u16, message: String },

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("folder id resolution failed: {0}")]
    ResolutionFailed(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DropError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            DropError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DropError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => DropError::Http {
                status: status.as_u16(),
                message: error.to_string(),
            },
            None if error.is_decode() => DropError::Deserialization(error.to_string()),
            None => DropError::Network(error.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DropError>;
