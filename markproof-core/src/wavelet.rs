//! Two-dimensional discrete wavelet transform.
//!
//! Orthogonal filter banks applied separably (rows, then columns) with
//! periodic extension, so `reconstruct(decompose(x)) == x` up to float
//! rounding. Planes with an odd number of rows or columns are padded by
//! replicating the last row/column; the padding is dropped again on
//! reconstruction.
//!
//! # Usage
//!
//! ```
//! use markproof_core::wavelet::{Wavelet, WaveletTransform};
//! use ndarray::Array2;
//!
//! let plane = Array2::from_shape_fn((64, 48), |(r, c)| (r * 3 + c) as f64);
//! let transform = WaveletTransform::new(Wavelet::Haar);
//! let coeffs = transform.decompose(&plane, 2).unwrap();
//! assert_eq!(coeffs.approximation.dim(), (16, 12));
//!
//! let restored = transform.reconstruct(&coeffs).unwrap();
//! assert!((restored[[10, 10]] - plane[[10, 10]]).abs() < 1e-9);
//! ```

use std::fmt;
use std::str::FromStr;

use ndarray::{aview1, s, Array2};

use crate::error::{Result, WatermarkError};

const HAAR_LOWPASS: [f64; 2] = [std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2];

/// Daubechies 2 (4 taps): (1+√3, 3+√3, 3-√3, 1-√3) / 4√2.
const DB2_LOWPASS: [f64; 4] = [
    0.482_962_913_144_534_1,
    0.836_516_303_737_807_9,
    0.224_143_868_042_013_4,
    -0.129_409_522_551_260_4,
];

/// Orthogonal wavelet family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Wavelet {
    /// Haar (db1). The default, and the family the decoder artifacts assume.
    #[default]
    Haar,
    /// Daubechies with two vanishing moments.
    Db2,
}

impl Wavelet {
    /// Canonical lowercase name, as accepted by [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            Self::Haar => "haar",
            Self::Db2 => "db2",
        }
    }

    fn lowpass(&self) -> &'static [f64] {
        match self {
            Self::Haar => &HAAR_LOWPASS,
            Self::Db2 => &DB2_LOWPASS,
        }
    }

    /// Quadrature mirror of the lowpass filter: g[k] = (-1)^k h[L-1-k].
    fn highpass_tap(&self, k: usize) -> f64 {
        let lo = self.lowpass();
        let tap = lo[lo.len() - 1 - k];
        if k % 2 == 0 {
            tap
        } else {
            -tap
        }
    }
}

impl fmt::Display for Wavelet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Wavelet {
    type Err = WatermarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "haar" | "db1" => Ok(Self::Haar),
            "db2" => Ok(Self::Db2),
            other => Err(WatermarkError::UnsupportedWavelet(format!(
                "'{}' (supported: haar, db2)",
                other
            ))),
        }
    }
}

/// Detail sub-bands produced by one decomposition level.
#[derive(Debug, Clone)]
pub struct DetailBands {
    /// Lowpass along rows, highpass along columns.
    pub horizontal: Array2<f64>,
    /// Highpass along rows, lowpass along columns.
    pub vertical: Array2<f64>,
    pub diagonal: Array2<f64>,
    /// Shape of the plane this level was computed from, before padding.
    source_shape: (usize, usize),
}

impl DetailBands {
    pub fn source_shape(&self) -> (usize, usize) {
        self.source_shape
    }
}

/// Multi-level decomposition of one plane.
#[derive(Debug, Clone)]
pub struct WaveletCoefficients {
    /// Approximation band of the coarsest level. May be modified in place
    /// before reconstruction as long as its shape is preserved.
    pub approximation: Array2<f64>,
    /// Detail bands, finest level first.
    details: Vec<DetailBands>,
    wavelet: Wavelet,
}

impl WaveletCoefficients {
    pub fn wavelet(&self) -> Wavelet {
        self.wavelet
    }

    pub fn levels(&self) -> usize {
        self.details.len()
    }

    pub fn details(&self) -> &[DetailBands] {
        &self.details
    }
}

/// Forward/inverse 2-D transform for a fixed wavelet family.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaveletTransform {
    wavelet: Wavelet,
}

impl WaveletTransform {
    pub fn new(wavelet: Wavelet) -> Self {
        Self { wavelet }
    }

    pub fn wavelet(&self) -> Wavelet {
        self.wavelet
    }

    /// Decompose `plane` into `levels` levels of sub-bands.
    pub fn decompose(&self, plane: &Array2<f64>, levels: usize) -> Result<WaveletCoefficients> {
        if levels == 0 {
            return Err(WatermarkError::InvalidInput(
                "wavelet decomposition needs at least one level".into(),
            ));
        }
        if plane.iter().any(|v| !v.is_finite()) {
            return Err(WatermarkError::Processing(
                "plane contains non-finite samples".into(),
            ));
        }

        let mut approximation = plane.clone();
        let mut details = Vec::with_capacity(levels);

        for level in 0..levels {
            let (rows, cols) = approximation.dim();
            if rows < 2 || cols < 2 {
                return Err(WatermarkError::InvalidInput(format!(
                    "plane of {}x{} cannot be decomposed to level {}",
                    plane.nrows(),
                    plane.ncols(),
                    level + 1
                )));
            }
            let (next, bands) = self.forward_level(&approximation);
            details.push(bands);
            approximation = next;
        }

        Ok(WaveletCoefficients {
            approximation,
            details,
            wavelet: self.wavelet,
        })
    }

    /// Invert [`decompose`](Self::decompose), returning a plane of the original shape.
    pub fn reconstruct(&self, coeffs: &WaveletCoefficients) -> Result<Array2<f64>> {
        if coeffs.wavelet != self.wavelet {
            return Err(WatermarkError::InvalidInput(format!(
                "coefficients were produced by {} but transform uses {}",
                coeffs.wavelet, self.wavelet
            )));
        }
        let coarsest = coeffs.details.last().ok_or_else(|| {
            WatermarkError::InvalidInput("coefficients contain no decomposition levels".into())
        })?;
        if coeffs.approximation.dim() != coarsest.horizontal.dim() {
            return Err(WatermarkError::InvalidInput(format!(
                "approximation band is {:?}, expected {:?}",
                coeffs.approximation.dim(),
                coarsest.horizontal.dim()
            )));
        }

        let mut plane = coeffs.approximation.clone();
        for bands in coeffs.details.iter().rev() {
            plane = self.inverse_level(&plane, bands);
        }
        Ok(plane)
    }

    fn forward_level(&self, plane: &Array2<f64>) -> (Array2<f64>, DetailBands) {
        let source_shape = plane.dim();
        let padded = pad_even(plane);
        let (rows, cols) = padded.dim();

        let mut row_low = Array2::zeros((rows, cols / 2));
        let mut row_high = Array2::zeros((rows, cols / 2));
        for (i, row) in padded.rows().into_iter().enumerate() {
            let (low, high) = self.analyze(&row.to_vec());
            row_low.row_mut(i).assign(&aview1(&low));
            row_high.row_mut(i).assign(&aview1(&high));
        }

        let (approximation, horizontal) = self.analyze_columns(&row_low);
        let (vertical, diagonal) = self.analyze_columns(&row_high);

        (
            approximation,
            DetailBands {
                horizontal,
                vertical,
                diagonal,
                source_shape,
            },
        )
    }

    fn inverse_level(&self, approximation: &Array2<f64>, bands: &DetailBands) -> Array2<f64> {
        let row_low = self.synthesize_columns(approximation, &bands.horizontal);
        let row_high = self.synthesize_columns(&bands.vertical, &bands.diagonal);
        let (rows, half_cols) = row_low.dim();

        let mut plane = Array2::zeros((rows, half_cols * 2));
        for i in 0..rows {
            let restored = self.synthesize(&row_low.row(i).to_vec(), &row_high.row(i).to_vec());
            plane.row_mut(i).assign(&aview1(&restored));
        }

        let (orig_rows, orig_cols) = bands.source_shape;
        plane.slice(s![..orig_rows, ..orig_cols]).to_owned()
    }

    fn analyze_columns(&self, band: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        let (rows, cols) = band.dim();
        let mut low = Array2::zeros((rows / 2, cols));
        let mut high = Array2::zeros((rows / 2, cols));
        for (j, column) in band.columns().into_iter().enumerate() {
            let (lo, hi) = self.analyze(&column.to_vec());
            low.column_mut(j).assign(&aview1(&lo));
            high.column_mut(j).assign(&aview1(&hi));
        }
        (low, high)
    }

    fn synthesize_columns(&self, low: &Array2<f64>, high: &Array2<f64>) -> Array2<f64> {
        let (half_rows, cols) = low.dim();
        let mut band = Array2::zeros((half_rows * 2, cols));
        for j in 0..cols {
            let restored = self.synthesize(&low.column(j).to_vec(), &high.column(j).to_vec());
            band.column_mut(j).assign(&aview1(&restored));
        }
        band
    }

    /// One level of 1-D analysis on an even-length signal.
    fn analyze(&self, signal: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let n = signal.len();
        let lowpass = self.wavelet.lowpass();
        let mut approx = vec![0.0; n / 2];
        let mut detail = vec![0.0; n / 2];

        for i in 0..n / 2 {
            for (k, &lo) in lowpass.iter().enumerate() {
                let sample = signal[(2 * i + k) % n];
                approx[i] += lo * sample;
                detail[i] += self.wavelet.highpass_tap(k) * sample;
            }
        }

        (approx, detail)
    }

    /// Transpose of [`analyze`](Self::analyze), which is its inverse for orthogonal filters.
    fn synthesize(&self, approx: &[f64], detail: &[f64]) -> Vec<f64> {
        let n = approx.len() * 2;
        let lowpass = self.wavelet.lowpass();
        let mut signal = vec![0.0; n];

        for i in 0..approx.len() {
            for (k, &lo) in lowpass.iter().enumerate() {
                signal[(2 * i + k) % n] += lo * approx[i] + self.wavelet.highpass_tap(k) * detail[i];
            }
        }

        signal
    }
}

fn pad_even(plane: &Array2<f64>) -> Array2<f64> {
    let (rows, cols) = plane.dim();
    if rows % 2 == 0 && cols % 2 == 0 {
        return plane.clone();
    }
    Array2::from_shape_fn((rows + rows % 2, cols + cols % 2), |(r, c)| {
        plane[[r.min(rows - 1), c.min(cols - 1)]]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(rows: usize, cols: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(r, c)| ((r * 31 + c * 17) % 256) as f64)
    }

    fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_wavelet_from_str() {
        assert_eq!("haar".parse::<Wavelet>().unwrap(), Wavelet::Haar);
        assert_eq!("HAAR".parse::<Wavelet>().unwrap(), Wavelet::Haar);
        assert_eq!("db1".parse::<Wavelet>().unwrap(), Wavelet::Haar);
        assert_eq!(" db2 ".parse::<Wavelet>().unwrap(), Wavelet::Db2);
    }

    #[test]
    fn test_wavelet_unsupported() {
        let err = "sym4".parse::<Wavelet>().unwrap_err();
        assert!(matches!(err, WatermarkError::UnsupportedWavelet(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_filters_are_orthonormal() {
        for wavelet in [Wavelet::Haar, Wavelet::Db2] {
            let lo = wavelet.lowpass();
            let energy: f64 = lo.iter().map(|h| h * h).sum();
            let dc: f64 = lo.iter().sum();
            let cross: f64 = (0..lo.len()).map(|k| lo[k] * wavelet.highpass_tap(k)).sum();
            assert!((energy - 1.0).abs() < 1e-12, "{} energy {}", wavelet, energy);
            assert!((dc - std::f64::consts::SQRT_2).abs() < 1e-12);
            assert!(cross.abs() < 1e-12);
        }
    }

    #[test]
    fn test_haar_1d_values() {
        let transform = WaveletTransform::new(Wavelet::Haar);
        let (low, high) = transform.analyze(&[1.0, 2.0, 3.0, 4.0]);
        let sqrt2 = std::f64::consts::SQRT_2;
        assert!((low[0] - 3.0 / sqrt2).abs() < 1e-12);
        assert!((high[0] + 1.0 / sqrt2).abs() < 1e-12);
        assert!((low[1] - 7.0 / sqrt2).abs() < 1e-12);
    }

    #[test]
    fn test_roundtrip_even_dimensions() {
        for wavelet in [Wavelet::Haar, Wavelet::Db2] {
            let transform = WaveletTransform::new(wavelet);
            let plane = ramp(64, 32);
            let coeffs = transform.decompose(&plane, 3).unwrap();
            let restored = transform.reconstruct(&coeffs).unwrap();
            assert_eq!(restored.dim(), plane.dim());
            assert!(max_abs_diff(&plane, &restored) < 1e-9, "{} round trip", wavelet);
        }
    }

    #[test]
    fn test_roundtrip_odd_dimensions() {
        for wavelet in [Wavelet::Haar, Wavelet::Db2] {
            let transform = WaveletTransform::new(wavelet);
            let plane = ramp(37, 23);
            let coeffs = transform.decompose(&plane, 2).unwrap();
            // 37 -> 19 -> 10, 23 -> 12 -> 6
            assert_eq!(coeffs.approximation.dim(), (10, 6));
            assert_eq!(coeffs.details()[0].source_shape(), (37, 23));
            let restored = transform.reconstruct(&coeffs).unwrap();
            assert_eq!(restored.dim(), (37, 23));
            assert!(max_abs_diff(&plane, &restored) < 1e-9);
        }
    }

    #[test]
    fn test_constant_plane_has_no_detail() {
        let transform = WaveletTransform::new(Wavelet::Db2);
        let plane = Array2::from_elem((16, 16), 100.0);
        let coeffs = transform.decompose(&plane, 2).unwrap();

        // DC gain is 2 per level in 2-D
        assert!(coeffs.approximation.iter().all(|v| (v - 400.0).abs() < 1e-9));
        for bands in coeffs.details() {
            assert!(bands.horizontal.iter().all(|v| v.abs() < 1e-9));
            assert!(bands.vertical.iter().all(|v| v.abs() < 1e-9));
            assert!(bands.diagonal.iter().all(|v| v.abs() < 1e-9));
        }
    }

    #[test]
    fn test_modified_approximation_reconstructs() {
        let transform = WaveletTransform::new(Wavelet::Haar);
        let plane = ramp(8, 8);
        let mut coeffs = transform.decompose(&plane, 1).unwrap();
        coeffs.approximation[[0, 0]] += 2.0;

        let restored = transform.reconstruct(&coeffs).unwrap();
        // A Haar approximation change of 2 spreads as +1 over its 2x2 support
        for (r, c) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
            assert!((restored[[r, c]] - plane[[r, c]] - 1.0).abs() < 1e-9);
        }
        assert!((restored[[2, 2]] - plane[[2, 2]]).abs() < 1e-9);
    }

    #[test]
    fn test_decompose_rejects_zero_levels() {
        let transform = WaveletTransform::default();
        assert!(transform.decompose(&ramp(8, 8), 0).is_err());
    }

    #[test]
    fn test_decompose_rejects_too_many_levels() {
        let transform = WaveletTransform::default();
        assert!(transform.decompose(&ramp(4, 4), 3).is_err());
    }

    #[test]
    fn test_decompose_rejects_non_finite() {
        let transform = WaveletTransform::default();
        let mut plane = ramp(4, 4);
        plane[[1, 1]] = f64::NAN;
        assert!(matches!(
            transform.decompose(&plane, 1),
            Err(WatermarkError::Processing(_))
        ));
    }

    #[test]
    fn test_reconstruct_rejects_wrong_family() {
        let coeffs = WaveletTransform::new(Wavelet::Haar)
            .decompose(&ramp(8, 8), 1)
            .unwrap();
        assert!(WaveletTransform::new(Wavelet::Db2).reconstruct(&coeffs).is_err());
    }

    #[test]
    fn test_reconstruct_rejects_reshaped_approximation() {
        let transform = WaveletTransform::default();
        let mut coeffs = transform.decompose(&ramp(8, 8), 1).unwrap();
        coeffs.approximation = Array2::zeros((3, 3));
        assert!(transform.reconstruct(&coeffs).is_err());
    }
}
