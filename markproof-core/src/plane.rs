//! Channel planes and the working frame shared by both pipelines.
//!
//! Every channel is resampled to a fixed square frame before it is
//! decomposed, so block positions are tied to relative image area rather
//! than to pixel counts. Embedding computes its change inside the frame
//! and maps that change back to the image's own resolution; extraction
//! resamples whatever it is given into the same frame.

use image::RgbImage;
use ndarray::Array2;

use crate::error::{Result, WatermarkError};
use crate::resample::resample;
use crate::{APPROX_EDGE_TARGET, DEFAULT_FRAME_EDGE};

/// Number of colour channels carried by every image at the pipeline boundary.
pub const CHANNELS: usize = 3;

/// Accepted frame edges, in pixels.
pub const MIN_FRAME_EDGE: u32 = 16;
pub const MAX_FRAME_EDGE: u32 = 4096;

/// Square working frame and its decomposition depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    edge: u32,
    levels: usize,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            edge: DEFAULT_FRAME_EDGE,
            levels: decomposition_levels(DEFAULT_FRAME_EDGE),
        }
    }
}

impl Frame {
    /// Frame of `edge x edge` pixels.
    ///
    /// The edge must lie in `[MIN_FRAME_EDGE, MAX_FRAME_EDGE]` and be a
    /// multiple of `2^levels` so the approximation band tiles it exactly.
    pub fn new(edge: u32) -> Result<Self> {
        if !(MIN_FRAME_EDGE..=MAX_FRAME_EDGE).contains(&edge) {
            return Err(WatermarkError::InvalidInput(format!(
                "frame edge must be between {} and {} pixels, got {}",
                MIN_FRAME_EDGE, MAX_FRAME_EDGE, edge
            )));
        }
        let levels = decomposition_levels(edge);
        let unit = 1u32 << levels;
        if edge % unit != 0 {
            return Err(WatermarkError::InvalidInput(format!(
                "frame edge {} is not a multiple of {}",
                edge, unit
            )));
        }
        Ok(Self { edge, levels })
    }

    pub fn edge(&self) -> u32 {
        self.edge
    }

    /// Wavelet decomposition depth.
    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Shape of the approximation band as (rows, cols).
    pub fn band_shape(&self) -> (usize, usize) {
        let side = (self.edge >> self.levels) as usize;
        (side, side)
    }

    /// Factor that maps approximation coefficients to pixel-unit means.
    pub fn band_gain(&self) -> f64 {
        (1u64 << self.levels) as f64
    }

    /// Resample every channel of `image` into the frame.
    pub fn project(&self, image: &RgbImage) -> Result<[Array2<f64>; CHANNELS]> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(WatermarkError::InvalidImage(format!(
                "image has no pixels ({}x{})",
                width, height
            )));
        }
        let side = self.edge as usize;
        Ok(split_channels(image).map(|plane| resample(&plane, side, side)))
    }

    /// Map per-channel frame changes back onto `image` at its own size,
    /// rounding and clamping the result to 8 bits.
    pub fn apply(&self, image: &RgbImage, deltas: &[Array2<f64>; CHANNELS]) -> RgbImage {
        let (width, height) = image.dimensions();
        let (rows, cols) = (height as usize, width as usize);
        let mut planes = split_channels(image);
        for (plane, delta) in planes.iter_mut().zip(deltas) {
            *plane += &resample(delta, rows, cols);
        }
        merge_channels(&planes)
    }
}

/// Smallest depth `>= 1` whose approximation band edge is at most
/// [`APPROX_EDGE_TARGET`].
pub fn decomposition_levels(edge: u32) -> usize {
    let mut levels = 1;
    while levels < 31 && (edge >> levels) > APPROX_EDGE_TARGET {
        levels += 1;
    }
    levels
}

/// Copy each channel of `image` into a floating-point plane.
pub fn split_channels(image: &RgbImage) -> [Array2<f64>; CHANNELS] {
    let (width, height) = image.dimensions();
    let shape = (height as usize, width as usize);
    std::array::from_fn(|channel| {
        Array2::from_shape_fn(shape, |(y, x)| {
            f64::from(image.get_pixel(x as u32, y as u32)[channel])
        })
    })
}

/// Assemble planes of equal shape into an image, rounding and clamping to 8 bits.
pub fn merge_channels(planes: &[Array2<f64>; CHANNELS]) -> RgbImage {
    let (rows, cols) = planes[0].dim();
    RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
        image::Rgb(std::array::from_fn(|channel| {
            planes[channel][[y as usize, x as usize]]
                .round()
                .clamp(0.0, 255.0) as u8
        }))
    })
}
