use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid server URL: {0}")]
    InvalidServerUrl(String),

    #[error("Authentication against {base_url} failed: {reason}")]
    AuthenticationFailed { base_url: String, reason: String },

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Gateway error: {0}")]
    Gateway(#[from] BridgeError),
}

impl AuthError {
    /// `false` when the server rejected the credentials themselves; retrying
    /// the same login cannot succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            AuthError::AuthenticationFailed { .. }
                | AuthError::InvalidServerUrl(_)
                | AuthError::Gateway(BridgeError::Unauthorized(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
