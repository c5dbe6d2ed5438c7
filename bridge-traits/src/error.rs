use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Server rejected credentials: {0}")]
    Unauthorized(String),

    #[error("Remote resource not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether repeating the same call may succeed.
    ///
    /// Rejected credentials and missing resources are permanent; everything
    /// else (timeouts, 5xx, dropped connections, local I/O hiccups) is worth
    /// another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Unauthorized(_) | Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
