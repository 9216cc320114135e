use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid aspect ratio bucket `{0}` (expected W_by_H)")]
    InvalidAspectRatio(String),

    #[error("Invalid profile {organ} for bucket {bucket}: {reason}")]
    InvalidProfile {
        bucket: String,
        organ: String,
        reason: String,
    },

    #[error("Invalid position settings: {0}")]
    InvalidSettings(String),

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid landmark fixture: {0}")]
    Fixture(#[from] serde_json::Error),
}
