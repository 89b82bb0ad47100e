//! Error types shared by docroute crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised by the shared utilities
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid {setting}: {value}")]
    InvalidSetting { setting: &'static str, value: String },

    #[error("Logging initialization failed: {0}")]
    Logging(String),
}
