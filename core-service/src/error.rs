use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Content error: {0}")]
    Content(#[from] core_content::ContentError),

    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),

    #[error("Settings error: {0}")]
    Settings(#[from] bridge_traits::error::BridgeError),

    #[error("Stored selection is malformed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Narrator {0} is not in the catalog")]
    UnknownNarrator(u32),
}

pub type Result<T> = std::result::Result<T, CoreError>;
