//! Per-feature standardisation fitted offline.
//!
//! Artifact format (JSON):
//!
//! ```json
//! { "mean": [0.5, 0.5, ...], "scale": [0.25, 0.25, ...] }
//! ```

use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WatermarkError};

/// Immutable `(x - mean) / scale` normaliser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

#[derive(Deserialize)]
struct ScalerArtifact {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Scaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        if mean.is_empty() {
            return Err(WatermarkError::InvalidInput("scaler has no features".into()));
        }
        if mean.len() != scale.len() {
            return Err(WatermarkError::InvalidInput(format!(
                "scaler has {} means but {} scales",
                mean.len(),
                scale.len()
            )));
        }
        if mean.iter().chain(&scale).any(|v| !v.is_finite()) {
            return Err(WatermarkError::InvalidInput(
                "scaler contains non-finite values".into(),
            ));
        }
        if let Some(index) = scale.iter().position(|&s| s == 0.0) {
            return Err(WatermarkError::InvalidInput(format!(
                "scaler feature {} has zero scale",
                index
            )));
        }
        Ok(Self { mean, scale })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let artifact: ScalerArtifact = serde_json::from_str(json)
            .map_err(|e| WatermarkError::InvalidInput(format!("malformed scaler JSON: {}", e)))?;
        Self::new(artifact.mean, artifact.scale)
    }

    /// Load a scaler artifact. Any failure is a `FatalLoad`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let fatal = |reason: String| WatermarkError::FatalLoad {
            artifact: "scaler",
            path: path.to_path_buf(),
            reason,
        };
        let json = std::fs::read_to_string(path).map_err(|e| fatal(e.to_string()))?;
        Self::from_json_str(&json).map_err(|e| fatal(e.to_string()))
    }

    /// Feature dimensionality.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn normalize(&self, features: &[f64]) -> Result<Vec<f64>> {
        self.check_dim(features.len())?;
        Ok(features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect())
    }

    /// Normalise every row of a `(windows, features)` matrix.
    pub fn normalize_rows(&self, rows: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_dim(rows.ncols())?;
        Ok(Array2::from_shape_fn(rows.dim(), |(r, c)| {
            (rows[[r, c]] - self.mean[c]) / self.scale[c]
        }))
    }

    fn check_dim(&self, len: usize) -> Result<()> {
        if len != self.dim() {
            return Err(WatermarkError::InvalidInput(format!(
                "feature vector has {} values, scaler expects {}",
                len,
                self.dim()
            )));
        }
        Ok(())
    }
}
