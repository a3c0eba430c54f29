use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Transfer interrupted after {bytes_written} bytes: {message}")]
    TransferInterrupted { bytes_written: u64, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the failure originated on the local device (disk, permissions)
    /// rather than on the network.
    pub fn is_local_io(&self) -> bool {
        matches!(self, BridgeError::Io(_) | BridgeError::StorageError(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
