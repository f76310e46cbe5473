use thiserror::Error;

/// Result type for ReMIP client operations
pub type Result<T> = std::result::Result<T, RemipError>;

/// Errors that can occur when talking to a ReMIP solver server
#[derive(Error, Debug)]
pub enum RemipError {
    /// HTTP request failed, including body read failures mid-stream
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Invalid URL provided
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Solver answered with a non-success status
    #[error("API request failed with status {status}: {body}")]
    ApiError { status: u16, body: String },

    /// Solver answered without a body
    #[error("Solver response carried no body")]
    EmptyBody,

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Authentication failed
    #[error("Authentication failed")]
    AuthenticationFailed,
}
