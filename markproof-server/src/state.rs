//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use markproof_core::{DecoderService, Embedder, WatermarkError};

use crate::config::Config;
use crate::error::ApiError;

/// Application state containing shared resources.
///
/// The decoder is loaded once at startup and only ever read afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Decoder for /extract (None when artifacts were not loaded, e.g. in tests)
    pub decoder: Option<Arc<DecoderService>>,
    /// Stateless embedder configured with the service's strength
    pub embedder: Embedder,
    /// Maximum accepted image upload in bytes
    pub max_file_size: usize,
}

impl AppState {
    pub fn new(config: &Config, decoder: Option<Arc<DecoderService>>) -> Result<Self, WatermarkError> {
        Ok(Self {
            decoder,
            embedder: Embedder::new(config.embed_strength)?.with_frame_edge(config.frame_edge)?,
            max_file_size: config.max_file_size_bytes(),
        })
    }

    /// The loaded decoder, or a 503-mapped error when it is missing.
    pub fn decoder(&self) -> Result<Arc<DecoderService>, ApiError> {
        self.decoder.clone().ok_or_else(|| {
            ApiError::from(WatermarkError::NotReady(
                "decoder artifacts are not loaded".into(),
            ))
        })
    }
}
