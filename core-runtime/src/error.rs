use thiserror::Error;

/// Errors raised while assembling the runtime (config, logging).
#[derive(Error, Debug)]
pub enum Error {
    /// A setting failed validation or logging could not be installed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required bridge was neither injected nor available as a desktop default.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
