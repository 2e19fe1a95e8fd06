use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConsoleError>;

/// Every failure the console surfaces to the operator.
///
/// None of these are fatal: the component that issued the call catches the error,
/// alerts once and leaves the session as it was before the call.
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("{0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server error: {0}")]
    Server(String),

    #[error("{0}")]
    Stream(String),

    #[error("Model switch failed: {0}")]
    Switch(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Delete failed: {0}")]
    Delete(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConsoleError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// The bare message without the category prefix, for operation-specific errors
    /// that must be shown verbatim.
    pub fn message(&self) -> String {
        match self {
            Self::Validation(msg)
            | Self::Server(msg)
            | Self::Stream(msg)
            | Self::Switch(msg)
            | Self::Upload(msg)
            | Self::Delete(msg)
            | Self::Config(msg) => msg.clone(),
            Self::Network(err) => err.to_string(),
            Self::Io(err) => err.to_string(),
        }
    }
}
