//! Embedding pipeline.
//!
//! Every RGB channel carries the full payload. Per channel the image is
//! resampled into the working frame and decomposed, the normalised
//! approximation band is tiled into one block per bit, and each block's
//! dominant singular value is moved onto its bit's lattice. The change
//! this makes to the frame is resampled back to the image's own size and
//! added to the original pixels, which are then rounded to 8 bits.
//! Payload and capacity are validated before any transform runs, so a
//! rejected call never produces an image.

use image::RgbImage;
use ndarray::Array2;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, WatermarkError};
use crate::features::channel_phases;
use crate::plane::{Frame, CHANNELS};
use crate::svd::{decide, partition, BlockGrid, BlockSvdCodec};
use crate::wavelet::{Wavelet, WaveletTransform};
use crate::DEFAULT_STRENGTH;

/// Smallest span, in image pixels along each axis, one block may cover.
pub const MIN_BLOCK_PIXELS: u32 = 8;

/// Check a payload against its declared length.
pub fn validate_payload(bit_length: usize, bits: &[u8]) -> Result<()> {
    if bit_length == 0 {
        return Err(WatermarkError::InvalidInput(
            "watermark length must be at least 1".into(),
        ));
    }
    if bits.len() != bit_length {
        return Err(WatermarkError::InvalidInput(format!(
            "watermark has {} bits but declared length is {}",
            bits.len(),
            bit_length
        )));
    }
    if let Some(position) = bits.iter().position(|&b| b > 1) {
        return Err(WatermarkError::InvalidInput(format!(
            "watermark bit {} is {}, expected 0 or 1",
            position, bits[position]
        )));
    }
    Ok(())
}

/// Embedding geometry for an image size and payload length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capacity {
    pub width: u32,
    pub height: u32,
    pub frame_edge: u32,
    pub levels: usize,
    pub band_rows: usize,
    pub band_cols: usize,
    pub grid_rows: usize,
    pub grid_cols: usize,
    pub block_rows: usize,
    pub block_cols: usize,
    pub bit_count: usize,
    /// Largest payload this image size can host.
    pub max_bits: usize,
}

/// Report how `bit_count` bits would be laid out on a `width x height`
/// image in the default frame.
///
/// Nothing is transformed; the same checks as [`Embedder::embed`] apply.
pub fn capacity(width: u32, height: u32, bit_count: usize) -> Result<Capacity> {
    capacity_in(&Frame::default(), width, height, bit_count)
}

/// [`capacity`] for an explicit frame.
pub fn capacity_in(frame: &Frame, width: u32, height: u32, bit_count: usize) -> Result<Capacity> {
    let grid = fit_grid(frame, width, height, bit_count)?;
    let (band_rows, band_cols) = frame.band_shape();

    // Both limits tighten monotonically with the bit count
    let mut max_bits = bit_count;
    while fit_grid(frame, width, height, max_bits + 1).is_ok() {
        max_bits += 1;
    }

    Ok(Capacity {
        width,
        height,
        frame_edge: frame.edge(),
        levels: frame.levels(),
        band_rows,
        band_cols,
        grid_rows: grid.rows,
        grid_cols: grid.cols,
        block_rows: grid.block_rows,
        block_cols: grid.block_cols,
        bit_count,
        max_bits,
    })
}

/// Block grid for `bit_count` bits, checked against both the frame band
/// and the image's own pixel count.
fn fit_grid(frame: &Frame, width: u32, height: u32, bit_count: usize) -> Result<BlockGrid> {
    let (band_rows, band_cols) = frame.band_shape();
    let grid = BlockGrid::new(band_rows, band_cols, bit_count)?;

    let needed_width = grid.cols as u64 * u64::from(MIN_BLOCK_PIXELS);
    let needed_height = grid.rows as u64 * u64::from(MIN_BLOCK_PIXELS);
    if u64::from(width) < needed_width || u64::from(height) < needed_height {
        return Err(WatermarkError::InsufficientCapacity {
            bits: bit_count,
            needed: format!("at least {}x{} pixels", needed_width, needed_height),
            available: format!("{}x{} pixels", width, height),
        });
    }
    Ok(grid)
}

/// Stateless embedder. Safe to share between threads.
#[derive(Debug, Clone, Copy)]
pub struct Embedder {
    strength: f64,
    frame: Frame,
}

impl Default for Embedder {
    fn default() -> Self {
        Self {
            strength: DEFAULT_STRENGTH,
            frame: Frame::default(),
        }
    }
}

impl Embedder {
    /// Create an embedder with a custom lattice step (grey levels).
    pub fn new(strength: f64) -> Result<Self> {
        BlockSvdCodec::new(strength)?;
        Ok(Self {
            strength,
            frame: Frame::default(),
        })
    }

    /// Use a frame of `edge x edge` pixels instead of the default.
    pub fn with_frame_edge(self, edge: u32) -> Result<Self> {
        Ok(Self {
            frame: Frame::new(edge)?,
            ..self
        })
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Embed `bits` into `image`.
    ///
    /// # Arguments
    ///
    /// * `image` - Cover image, left untouched
    /// * `bit_length` - Declared payload length; must equal `bits.len()`
    /// * `bits` - Payload, each element 0 or 1
    /// * `wavelet` - Wavelet family used for the decomposition
    ///
    /// # Returns
    ///
    /// The watermarked image, same size as the input. Identical arguments
    /// always produce an identical image.
    pub fn embed(
        &self,
        image: &RgbImage,
        bit_length: usize,
        bits: &[u8],
        wavelet: Wavelet,
    ) -> Result<RgbImage> {
        validate_payload(bit_length, bits)?;

        let (width, height) = image.dimensions();
        let grid = fit_grid(&self.frame, width, height, bit_length)?;

        debug!(
            width,
            height,
            frame_edge = self.frame.edge(),
            levels = self.frame.levels(),
            block_rows = grid.block_rows,
            block_cols = grid.block_cols,
            %wavelet,
            "Embedding watermark"
        );

        let codec = BlockSvdCodec::new(self.strength)?.with_value_range(0.0, 255.0);
        let transform = WaveletTransform::new(wavelet);
        let gain = self.frame.band_gain();

        let planes = self.frame.project(image)?;
        let mut deltas: [Array2<f64>; CHANNELS] = Default::default();
        for (plane, delta) in planes.iter().zip(deltas.iter_mut()) {
            let mut coeffs = transform.decompose(plane, self.frame.levels())?;
            let mut band = coeffs.approximation.mapv(|v| v / gain);

            for block in partition(&band, bit_length)? {
                let bit = bits[block.region.index];
                codec.embed_bit(&block, bit)?.write(&mut band);
            }

            coeffs.approximation = band.mapv(|v| v * gain);
            *delta = transform.reconstruct(&coeffs)? - plane;
        }

        let marked = self.frame.apply(image, &deltas);
        self.self_check(&marked, bits, wavelet, &codec);
        Ok(marked)
    }

    /// Re-read the 8-bit result and report blocks that lost their bit to
    /// resampling, rounding or clipping. Never changes the output.
    fn self_check(&self, marked: &RgbImage, bits: &[u8], wavelet: Wavelet, codec: &BlockSvdCodec) {
        match channel_phases(marked, &self.frame, wavelet, bits.len(), codec) {
            Ok(channels) => {
                let flipped: usize = channels
                    .iter()
                    .map(|phases| {
                        phases
                            .iter()
                            .zip(bits)
                            .filter(|&(&phase, &bit)| decide(phase) != bit)
                            .count()
                    })
                    .sum();
                if flipped > 0 {
                    warn!(
                        flipped,
                        total = bits.len() * channels.len(),
                        "Embedded blocks do not read back their bit"
                    );
                } else {
                    debug!("Embedding self-check passed");
                }
            }
            Err(e) => warn!(error = %e, "Embedding self-check could not run"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn test_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                ((x * 7 + y * 3) % 200 + 20) as u8,
                ((x * 5 + y * 11) % 180 + 40) as u8,
                ((x * y) % 150 + 50) as u8,
            ])
        })
    }

    fn assert_reads_back(marked: &RgbImage, embedder: &Embedder, bits: &[u8], wavelet: Wavelet) {
        let codec = BlockSvdCodec::new(embedder.strength()).unwrap();
        let channels = channel_phases(marked, &embedder.frame(), wavelet, bits.len(), &codec).unwrap();
        for phases in &channels {
            let read: Vec<u8> = phases.iter().map(|&p| decide(p)).collect();
            assert_eq!(read, bits, "wavelet {}", wavelet);
        }
    }

    #[test]
    fn test_validate_payload() {
        assert!(validate_payload(3, &[0, 1, 1]).is_ok());
        assert!(validate_payload(0, &[]).is_err());
        assert!(validate_payload(4, &[0, 1, 1]).is_err());
        assert!(validate_payload(3, &[0, 2, 1]).is_err());
    }

    #[test]
    fn test_capacity_report() {
        let report = capacity(256, 256, 128).unwrap();
        assert_eq!(report.frame_edge, 512);
        assert_eq!(report.levels, 2);
        assert_eq!((report.band_rows, report.band_cols), (128, 128));
        assert_eq!((report.grid_rows, report.grid_cols), (11, 12));
        assert_eq!((report.block_rows, report.block_cols), (11, 10));
        // 256 pixels leave room for a 32x32 grid of 8-pixel blocks
        assert_eq!(report.max_bits, 1024);
        assert!(capacity(256, 256, 1025).is_err());
    }

    #[test]
    fn test_capacity_does_not_depend_on_aspect_ratio() {
        let square = capacity(512, 512, 128).unwrap();
        let wide = capacity(2000, 300, 128).unwrap();
        assert_eq!(
            (square.grid_rows, square.grid_cols, square.block_rows, square.block_cols),
            (wide.grid_rows, wide.grid_cols, wide.block_rows, wide.block_cols)
        );
    }

    #[test]
    fn test_capacity_too_small() {
        let err = capacity(20, 20, 128).unwrap_err();
        assert!(matches!(
            err,
            WatermarkError::InsufficientCapacity { bits: 128, .. }
        ));
        // Wide enough, but too short for eleven rows of blocks
        assert!(capacity(2000, 80, 128).is_err());
        assert!(capacity(96, 88, 128).is_ok());
    }

    #[test]
    fn test_capacity_in_custom_frame() {
        let frame = Frame::new(64).unwrap();
        let report = capacity_in(&frame, 256, 256, 16).unwrap();
        assert_eq!((report.frame_edge, report.levels), (64, 1));
        assert_eq!((report.band_rows, report.band_cols), (32, 32));
        assert!(capacity_in(&frame, 256, 256, 1024).is_err());
    }

    #[test]
    fn test_new_rejects_bad_strength() {
        assert!(Embedder::new(0.0).is_err());
        assert_eq!(Embedder::new(4.0).unwrap().strength(), 4.0);
    }

    #[test]
    fn test_with_frame_edge() {
        let embedder = Embedder::new(4.0).unwrap().with_frame_edge(256).unwrap();
        assert_eq!(embedder.frame().edge(), 256);
        assert_eq!(embedder.strength(), 4.0);
        assert!(Embedder::default().with_frame_edge(7).is_err());
    }

    #[test]
    fn test_embed_keeps_dimensions_and_changes_pixels() {
        let image = test_image(96, 80);
        let bits = vec![1u8; 16];
        let marked = Embedder::default()
            .embed(&image, 16, &bits, Wavelet::Haar)
            .unwrap();
        assert_eq!(marked.dimensions(), image.dimensions());
        assert_ne!(marked, image);
    }

    #[test]
    fn test_embed_rejects_invalid_payload() {
        let image = test_image(64, 64);
        let embedder = Embedder::default();
        assert!(matches!(
            embedder.embed(&image, 8, &[0, 1, 0], Wavelet::Haar),
            Err(WatermarkError::InvalidInput(_))
        ));
        assert!(matches!(
            embedder.embed(&image, 3, &[0, 3, 0], Wavelet::Haar),
            Err(WatermarkError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_embed_rejects_small_image() {
        let image = test_image(16, 16);
        let bits = vec![0u8; 128];
        assert!(matches!(
            Embedder::default().embed(&image, 128, &bits, Wavelet::Haar),
            Err(WatermarkError::InsufficientCapacity { bits: 128, .. })
        ));
    }

    #[test]
    fn test_embed_reads_back_per_channel() {
        let image = test_image(128, 128);
        let bits: Vec<u8> = (0..36).map(|i| ((i * 7) % 3 == 0) as u8).collect();
        let embedder = Embedder::default();

        for wavelet in [Wavelet::Haar, Wavelet::Db2] {
            let marked = embedder.embed(&image, bits.len(), &bits, wavelet).unwrap();
            assert_reads_back(&marked, &embedder, &bits, wavelet);
        }
    }

    #[test]
    fn test_embed_panorama_reads_back() {
        let image = test_image(2000, 300);
        let bits: Vec<u8> = (0..16).map(|i| (i % 3 == 1) as u8).collect();
        let embedder = Embedder::default();
        let marked = embedder
            .embed(&image, bits.len(), &bits, Wavelet::Haar)
            .unwrap();
        assert_eq!(marked.dimensions(), (2000, 300));
        assert_reads_back(&marked, &embedder, &bits, Wavelet::Haar);
    }
}
