//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux):
//! - `HttpClient` using `reqwest`
//! - `FileTransfer` using `reqwest` byte streams with HTTP `Range` resume
//! - `FileSystemAccess` using `tokio::fs`
//! - `SettingsStore` using a SQLite-backed key-value table
//!
//! There is no desktop `PlaybackAdapter`; hosts inject their own audio device.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestFileTransfer, ReqwestHttpClient, TokioFileSystem};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new();
//!     let transfer = ReqwestFileTransfer::new();
//!     let fs = TokioFileSystem::new();
//!     // Hand these to CoreConfig::builder()
//! }
//! ```

mod filesystem;
mod http;
mod settings;
mod transfer;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use settings::SqliteSettingsStore;
pub use transfer::ReqwestFileTransfer;
