use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Error fetching video metadata: {0}")]
    MetadataFetch(String),

    #[error("Error initiating download: {0}")]
    JobInitiation(String),

    #[error("Error fetching progress: {0}")]
    JobCommunication(String),

    #[error("{0}")]
    JobFailed(String),
}

impl AppError {
    /// Message shown to the user when the error surfaces in the UI state.
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidInput(msg) if msg.is_empty() => "Please enter a video URL.".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
