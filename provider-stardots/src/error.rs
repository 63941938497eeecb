//! Error types for the StarDots provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// StarDots provider errors
#[derive(Error, Debug)]
pub enum StarDotsError {
    /// Credentials or space are missing or malformed
    #[error("Invalid StarDots configuration: {0}")]
    InvalidConfig(String),

    /// Request signature or API key rejected
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Non-2xx HTTP status
    #[error("StarDots API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// The API answered `success: false`
    #[error("StarDots rejected the request: {0}")]
    Rejected(String),

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for StarDots operations
pub type Result<T> = std::result::Result<T, StarDotsError>;

impl From<StarDotsError> for BridgeError {
    fn from(error: StarDotsError) -> Self {
        match error {
            StarDotsError::InvalidConfig(msg) => {
                BridgeError::NotAvailable(format!("StarDots not configured: {}", msg))
            }
            StarDotsError::AuthenticationFailed(msg) => {
                BridgeError::OperationFailed(format!("Authentication failed: {}", msg))
            }
            StarDotsError::ApiError {
                status_code,
                message,
            } => BridgeError::OperationFailed(format!(
                "API error (status {}): {}",
                status_code, message
            )),
            StarDotsError::Rejected(msg) => {
                BridgeError::OperationFailed(format!("Request rejected: {}", msg))
            }
            StarDotsError::ParseError(msg) => {
                BridgeError::InvalidResponse(format!("Parse error: {}", msg))
            }
            StarDotsError::BridgeError(e) => e,
        }
    }
}
