//! MarkProof Core - invisible image watermarking library
//!
//! This crate hides a fixed-length bit payload in the wavelet/singular-value
//! structure of an RGB image and recovers it later, even from a resized copy.
//!
//! # Pipelines
//!
//! - **Embedding**: each RGB channel is resampled into a fixed square
//!   frame, where a multi-level DWT isolates the approximation band. The
//!   band is tiled into one block per bit and each bit is written into the
//!   dominant singular value of its block by quantization-index
//!   modulation. The resulting change is resampled back and added to the
//!   image at its own resolution.
//! - **Decoding**: a candidate image of any size and aspect ratio is
//!   resampled into the same frame to read one lattice phase per bit and
//!   channel. The phases are normalised by a fitted scaler and fed to a
//!   learned decoder that outputs per-bit probabilities, thresholded at 0.5.
//!
//! # Example
//!
//! ```no_run
//! use markproof_core::{DecoderService, Embedder, Wavelet};
//!
//! # fn example() -> markproof_core::Result<()> {
//! let bytes = std::fs::read("photo.png").unwrap();
//! let image = markproof_core::load_rgb(&bytes)?;
//!
//! let bits: Vec<u8> = (0..128).map(|i| (i % 2) as u8).collect();
//! let marked = Embedder::default().embed(&image, bits.len(), &bits, Wavelet::Haar)?;
//!
//! // Artifacts are loaded once and shared by every decode call
//! let decoder = DecoderService::load("decoder.json", "scaler.json")?;
//! let decoded = decoder.decode(&marked, Wavelet::Haar)?;
//! assert_eq!(decoded.len(), 128);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod decoder;
pub mod embed;
pub mod error;
pub mod features;
pub mod image_io;
pub mod model;
pub mod plane;
pub mod resample;
pub mod scaler;
pub mod svd;
pub mod wavelet;

/// Payload length used when none is configured.
pub const DEFAULT_BIT_COUNT: usize = 128;

/// Default QIM lattice step, in grey levels.
pub const DEFAULT_STRENGTH: f64 = 6.0;

/// Edge of the square frame both pipelines resample channels into.
pub const DEFAULT_FRAME_EDGE: u32 = 512;

/// Largest approximation-band edge the decomposition depth aims for.
pub const APPROX_EDGE_TARGET: u32 = 128;

// Re-export main types for convenience
pub use aggregate::{SequenceAggregator, DECISION_THRESHOLD};
pub use decoder::DecoderService;
pub use embed::{capacity, capacity_in, validate_payload, Capacity, Embedder};
pub use error::{Result, WatermarkError};
pub use features::FeatureExtractor;
pub use image_io::{encode_png, load_rgb};
pub use plane::Frame;
pub use model::{Activation, BitDecoderModel, DenseDecoder, DenseLayer, ModelArtifact};
pub use scaler::Scaler;
pub use wavelet::{Wavelet, WaveletCoefficients, WaveletTransform};
