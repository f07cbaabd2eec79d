//! Separable triangle-filter resampling of floating-point planes.
//!
//! Uses the same sampling geometry as `image::imageops::resize` with
//! `FilterType::Triangle` (pixel centres at `+0.5`, kernel widened by the
//! shrink ratio, weights normalised per output sample), but keeps full
//! precision and signed values. Embedding relies on that for the pixel
//! delta it maps back to native resolution.

use ndarray::Array2;

/// Tent kernel of half-width 1.
fn triangle_kernel(x: f64) -> f64 {
    let x = x.abs();
    if x < 1.0 {
        1.0 - x
    } else {
        0.0
    }
}

/// Contributing input range and normalised weights for one output sample.
#[derive(Debug, Clone)]
struct Taps {
    start: usize,
    weights: Vec<f64>,
}

/// Taps for resampling a line of `len` samples to `new_len` samples.
fn line_taps(len: usize, new_len: usize) -> Vec<Taps> {
    let ratio = len as f64 / new_len as f64;
    let sratio = ratio.max(1.0);
    let support = sratio;

    (0..new_len)
        .map(|out| {
            let centre = (out as f64 + 0.5) * ratio;
            let left = ((centre - support).floor().max(0.0) as usize).min(len - 1);
            let right = ((centre + support).ceil() as usize).clamp(left + 1, len);

            let centre = centre - 0.5;
            let mut weights: Vec<f64> = (left..right)
                .map(|i| triangle_kernel((i as f64 - centre) / sratio))
                .collect();
            let sum: f64 = weights.iter().sum();
            if sum > 0.0 {
                weights.iter_mut().for_each(|w| *w /= sum);
            } else {
                weights.iter_mut().for_each(|w| *w = 0.0);
                weights[0] = 1.0;
            }

            Taps {
                start: left,
                weights,
            }
        })
        .collect()
}

/// Resample `plane` to `rows x cols`, vertical pass first.
///
/// Output values are convex combinations of input values, so the result
/// never leaves the input's range. Returns a copy when the shape already
/// matches. Both target sides must be non-zero, as must the input's.
pub fn resample(plane: &Array2<f64>, rows: usize, cols: usize) -> Array2<f64> {
    let (src_rows, src_cols) = plane.dim();
    if (src_rows, src_cols) == (rows, cols) {
        return plane.clone();
    }

    let vertical = line_taps(src_rows, rows);
    let mut tall = Array2::zeros((rows, src_cols));
    for (r, taps) in vertical.iter().enumerate() {
        for (k, &w) in taps.weights.iter().enumerate() {
            let src = plane.row(taps.start + k);
            tall.row_mut(r).scaled_add(w, &src);
        }
    }

    let horizontal = line_taps(src_cols, cols);
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let taps = &horizontal[c];
        taps.weights
            .iter()
            .enumerate()
            .map(|(k, &w)| w * tall[[r, taps.start + k]])
            .sum()
    })
}
