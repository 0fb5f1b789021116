use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown track id {0}")]
    UnknownTrack(u32),

    #[error("capture error: {0}")]
    Capture(String),

    #[error("detector error: {0}")]
    Detector(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, Error>;
