//! Resumable file transfer.
//!
//! A [`FileTransfer`] streams a remote resource to a local path, reporting
//! progress as bytes land on disk. When a partial file is already present at
//! the destination and resuming is requested, the transfer continues from the
//! existing length instead of starting over.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;

/// Description of a single download.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub url: String,
    pub destination: PathBuf,
    pub headers: HashMap<String, String>,
    /// Continue from an existing partial file at `destination`.
    pub resume: bool,
}

impl TransferRequest {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            headers: HashMap::new(),
            resume: true,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn fresh(mut self) -> Self {
        self.resume = false;
        self
    }
}

/// Progress snapshot delivered during a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes present at the destination, including any resumed prefix.
    pub bytes_written: u64,
    /// Expected total size when the server reports one.
    pub total_bytes: Option<u64>,
}

impl TransferProgress {
    /// Fraction complete against `expected_total`, clamped to `0.0..=1.0`.
    pub fn fraction_of(&self, expected_total: u64) -> f64 {
        if expected_total == 0 {
            return 0.0;
        }
        (self.bytes_written as f64 / expected_total as f64).clamp(0.0, 1.0)
    }
}

/// Result of a finished transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub path: PathBuf,
    pub bytes_written: u64,
    /// Length of the partial file the transfer resumed from.
    pub resumed_from: u64,
}

pub type ProgressCallback = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// Streams remote content to local storage.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// Download `request.url` into `request.destination`.
    ///
    /// `on_progress` may be called many times from the transfer task. Fails
    /// with an IO error for local write failures and with
    /// `TransferInterrupted`/`OperationFailed` for network failures.
    async fn download(
        &self,
        request: TransferRequest,
        on_progress: ProgressCallback,
    ) -> Result<TransferOutcome>;
}
