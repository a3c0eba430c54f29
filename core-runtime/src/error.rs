//! Errors raised while assembling the runtime.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value failed validation.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Missing bridge {capability}: {message}")]
    CapabilityMissing { capability: String, message: String },

    /// The tracing subscriber could not be installed.
    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// A default desktop bridge could not be created.
    #[error("Default bridge unavailable: {0}")]
    BridgeInit(String),
}

pub type Result<T> = std::result::Result<T, Error>;
