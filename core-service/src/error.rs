use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] core_transfer::TransferError),
}

impl CoreError {
    /// Whether the host should send the user back to the login screen.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            CoreError::Auth(core_auth::AuthError::NotAuthenticated)
                | CoreError::Auth(core_auth::AuthError::AuthenticationFailed { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
