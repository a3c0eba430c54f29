//! # Host Bridge Traits
//!
//! Capabilities the recitation core needs from its host platform.
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP for the content API
//! - [`FileTransfer`](transfer::FileTransfer) - Resumable download to a local path with progress
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Existence checks and directory management
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences (selected narrator)
//!
//! ### Audio
//! - [`PlaybackAdapter`](playback::PlaybackAdapter) - The single audio output device
//!
//! ### Utilities
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core refuses to start when a required capability is missing:
//!
//! ```ignore
//! let adapter = config.playback_adapter
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "PlaybackAdapter".to_string(),
//!         message: "Inject the host audio device adapter.".to_string(),
//!     })?;
//! ```
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind `Arc`.

pub mod error;
pub mod http;
pub mod log;
pub mod playback;
pub mod storage;
pub mod transfer;

pub use error::BridgeError;

pub use http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
pub use log::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use playback::{
    status_channel, AudioSource, DeviceStatus, DeviceStatusUpdate, PlaybackAdapter,
    PlaybackRequest, PlaybackSessionId, StatusReceiver, StatusSender,
};
pub use storage::{FileSystemAccess, SettingsStore};
pub use transfer::{FileTransfer, ProgressCallback, TransferOutcome, TransferProgress, TransferRequest};
