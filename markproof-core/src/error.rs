use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatermarkError {
    /// Payload or parameter rejected before any transform ran.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported wavelet: {0}")]
    UnsupportedWavelet(String),

    #[error("Insufficient capacity: {bits} bits need {needed}, image offers {available}")]
    InsufficientCapacity {
        bits: usize,
        needed: String,
        available: String,
    },

    /// Numeric failure inside a transform (non-convergent SVD, non-finite data).
    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Decoder not ready: {0}")]
    NotReady(String),

    #[error("Failed to load {artifact} from {path}: {reason}")]
    FatalLoad {
        artifact: &'static str,
        path: PathBuf,
        reason: String,
    },
}

impl WatermarkError {
    /// True for errors caused by the caller's arguments rather than by the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::UnsupportedWavelet(_)
                | Self::InsufficientCapacity { .. }
                | Self::InvalidImage(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WatermarkError>;
