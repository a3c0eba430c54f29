//! Resumable downloads over HTTP.
//!
//! Bytes are streamed into `<destination>.part`; the partial file is renamed
//! onto the destination only after the body has been fully written, so the
//! destination path never exists in a truncated state. A later attempt with
//! `resume` set asks the server for the remaining range.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    transfer::{FileTransfer, ProgressCallback, TransferOutcome, TransferProgress, TransferRequest},
};
use futures_util::StreamExt;
use reqwest::{header, Client, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::http::USER_AGENT;

/// `FileTransfer` backed by a reqwest byte stream.
pub struct ReqwestFileTransfer {
    client: Client,
}

impl ReqwestFileTransfer {
    pub fn new() -> Self {
        // No overall timeout: chapter recitations can be large.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Sibling path used while the body is still arriving.
    pub fn partial_path(destination: &Path) -> PathBuf {
        let mut name = destination
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".part");
        destination.with_file_name(name)
    }

    async fn partial_len(path: &Path) -> u64 {
        fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
    }

    async fn finish(
        partial: &Path,
        destination: &Path,
        bytes_written: u64,
        resumed_from: u64,
    ) -> Result<TransferOutcome> {
        fs::rename(partial, destination).await?;
        Ok(TransferOutcome {
            path: destination.to_path_buf(),
            bytes_written,
            resumed_from,
        })
    }
}

impl Default for ReqwestFileTransfer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileTransfer for ReqwestFileTransfer {
    #[instrument(skip(self, request, on_progress), fields(url = %request.url))]
    async fn download(
        &self,
        request: TransferRequest,
        on_progress: ProgressCallback,
    ) -> Result<TransferOutcome> {
        if let Some(parent) = request.destination.parent() {
            fs::create_dir_all(parent).await?;
        }

        let partial = Self::partial_path(&request.destination);
        let existing = if request.resume {
            Self::partial_len(&partial).await
        } else {
            0
        };

        let mut builder = self.client.get(&request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if existing > 0 {
            debug!(offset = existing, "Resuming partial download");
            builder = builder.header(header::RANGE, format!("bytes={}-", existing));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BridgeError::TransferInterrupted {
                bytes_written: existing,
                message: e.to_string(),
            })?;

        let status = response.status();
        let (mut file, start) = if status == StatusCode::PARTIAL_CONTENT && existing > 0 {
            let file = fs::OpenOptions::new().append(true).open(&partial).await?;
            (file, existing)
        } else if status == StatusCode::RANGE_NOT_SATISFIABLE && existing > 0 {
            // The partial file already holds the whole body.
            info!(bytes = existing, "Partial download already complete");
            on_progress(TransferProgress {
                bytes_written: existing,
                total_bytes: Some(existing),
            });
            return Self::finish(&partial, &request.destination, existing, existing).await;
        } else if status.is_success() {
            if existing > 0 {
                warn!(status = status.as_u16(), "Server ignored range request, restarting");
            }
            (fs::File::create(&partial).await?, 0)
        } else {
            return Err(BridgeError::OperationFailed(format!(
                "HTTP {} for {}",
                status.as_u16(),
                request.url
            )));
        };

        let total_bytes = response.content_length().map(|len| len + start);
        let mut bytes_written = start;
        on_progress(TransferProgress {
            bytes_written,
            total_bytes,
        });

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| BridgeError::TransferInterrupted {
                bytes_written,
                message: e.to_string(),
            })?;
            file.write_all(&chunk).await?;
            bytes_written += chunk.len() as u64;
            on_progress(TransferProgress {
                bytes_written,
                total_bytes,
            });
        }

        file.flush().await?;
        drop(file);

        debug!(bytes = bytes_written, resumed_from = start, "Download finished");
        Self::finish(&partial, &request.destination, bytes_written, start).await
    }
}
