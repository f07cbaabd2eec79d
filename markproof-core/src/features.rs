//! Feature extraction pipeline.
//!
//! Replays the embedding geometry on a candidate image and reads one
//! lattice phase per payload bit and colour channel. Window `j` of the
//! decoder input is the phase vector of channel `j mod 3`.

use std::f64::consts::TAU;

use image::RgbImage;
use ndarray::Array2;
use tracing::trace;

use crate::error::{Result, WatermarkError};
use crate::plane::{Frame, CHANNELS};
use crate::svd::{Block, BlockGrid, BlockSvdCodec};
use crate::wavelet::{Wavelet, WaveletTransform};
use crate::DEFAULT_STRENGTH;

/// Read the raw phase of every block, per channel, inside `frame`.
pub(crate) fn channel_phases(
    image: &RgbImage,
    frame: &Frame,
    wavelet: Wavelet,
    bit_count: usize,
    codec: &BlockSvdCodec,
) -> Result<[Vec<f64>; CHANNELS]> {
    let (rows, cols) = frame.band_shape();
    let grid = BlockGrid::new(rows, cols, bit_count)?;
    let transform = WaveletTransform::new(wavelet);
    let gain = frame.band_gain();

    let (width, height) = image.dimensions();
    trace!(width, height, edge = frame.edge(), "Projecting image into frame");

    let planes = frame.project(image)?;
    let mut phases: [Vec<f64>; CHANNELS] = Default::default();
    for (plane, out) in planes.iter().zip(phases.iter_mut()) {
        let coeffs = transform.decompose(plane, frame.levels())?;
        let band = coeffs.approximation.mapv(|v| v / gain);
        *out = grid
            .regions()
            .map(|region| codec.read_bit(&Block::read(&band, region)))
            .collect::<Result<Vec<_>>>()?;
    }
    Ok(phases)
}

/// Circular mean of lattice phases, in `[0, 1)`.
///
/// Phases wrap at 1, so 0.02 and 0.98 average to 0.0 rather than 0.5.
pub fn mean_phase(phases: &[f64]) -> f64 {
    let (sin, cos) = phases.iter().fold((0.0, 0.0), |(s, c), &p| {
        let angle = p * TAU;
        (s + angle.sin(), c + angle.cos())
    });
    let turn = sin.atan2(cos) / TAU;
    let phase = turn.rem_euclid(1.0);
    // rem_euclid can round a tiny negative turn up to exactly 1.0
    if phase >= 1.0 {
        0.0
    } else {
        phase
    }
}

/// Extracts decoder input features from images of any size.
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor {
    strength: f64,
    frame: Frame,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self {
            strength: DEFAULT_STRENGTH,
            frame: Frame::default(),
        }
    }
}

impl FeatureExtractor {
    /// `strength` and `frame_edge` must match the embedder's.
    pub fn new(strength: f64, frame_edge: u32) -> Result<Self> {
        BlockSvdCodec::new(strength)?;
        let frame = Frame::new(frame_edge)?;
        Ok(Self { strength, frame })
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Per-channel phase vectors of an image.
    pub fn channel_features(
        &self,
        image: &RgbImage,
        wavelet: Wavelet,
        bit_count: usize,
    ) -> Result<[Vec<f64>; CHANNELS]> {
        let codec = BlockSvdCodec::new(self.strength)?;
        channel_phases(image, &self.frame, wavelet, bit_count, &codec)
    }

    /// One feature per bit: the circular mean of its three channel phases.
    pub fn extract_features(
        &self,
        image: &RgbImage,
        wavelet: Wavelet,
        bit_count: usize,
    ) -> Result<Vec<f64>> {
        let channels = self.channel_features(image, wavelet, bit_count)?;
        Ok((0..bit_count)
            .map(|i| mean_phase(&channels.iter().map(|c| c[i]).collect::<Vec<_>>()))
            .collect())
    }

    /// Decoder input of shape `(sequence_len, bit_count)`.
    pub fn extract_windows(
        &self,
        image: &RgbImage,
        wavelet: Wavelet,
        bit_count: usize,
        sequence_len: usize,
    ) -> Result<Array2<f64>> {
        if sequence_len == 0 {
            return Err(WatermarkError::InvalidInput(
                "sequence length must be at least 1".into(),
            ));
        }
        let channels = self.channel_features(image, wavelet, bit_count)?;
        Ok(Array2::from_shape_fn((sequence_len, bit_count), |(j, i)| {
            channels[j % CHANNELS][i]
        }))
    }
}
