use thiserror::Error;

/// All errors produced by wayfinder-core.
#[derive(Debug, Error)]
pub enum WayfinderError {
    #[error("detector error: {0}")]
    Detector(String),

    #[error("no detection model loaded")]
    ModelNotLoaded,

    #[error("speech backend error: {0}")]
    Speech(String),

    #[error("vibration backend error: {0}")]
    Vibration(String),

    #[error("audio attention request failed: {0}")]
    Attention(String),

    #[error("telemetry endpoint returned status {status}")]
    Delivery { status: u16 },

    #[error("telemetry transport error: {0}")]
    Transport(String),

    #[error("invalid telemetry endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("telemetry worker is already running")]
    AlreadyRunning,

    #[error("telemetry worker is not running")]
    NotRunning,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, WayfinderError>;
