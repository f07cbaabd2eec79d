//! Learned bit decoder.
//!
//! The decoder is consumed through [`BitDecoderModel`]; any backend that maps
//! a `(sequence_len, bit_count)` matrix of normalised features to per-bit
//! probabilities can stand in for it. [`DenseDecoder`] is the production
//! backend: a feed-forward network loaded from a JSON artifact.
//!
//! # Artifact format
//!
//! ```json
//! {
//!   "input_shape": [5, 128],
//!   "layers": [
//!     { "weights": [[...], ...], "bias": [...], "activation": "relu" },
//!     { "weights": [[...], ...], "bias": [...], "activation": "sigmoid" }
//!   ]
//! }
//! ```
//!
//! The input matrix is flattened window-major before the first layer.
//! `weights` is stored `inputs x outputs`. The last layer must be a sigmoid
//! with `bit_count` outputs.

use std::path::Path;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WatermarkError};

/// Capability of mapping a feature sequence to per-bit probabilities.
pub trait BitDecoderModel: Send + Sync {
    /// Number of feature windows the model expects.
    fn sequence_len(&self) -> usize;

    /// Number of bits the model predicts.
    fn bit_count(&self) -> usize;

    /// Per-bit probabilities in `[0, 1]` for a `(sequence_len, bit_count)` input.
    fn predict(&self, sequence: &Array2<f64>) -> Result<Vec<f64>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
    Linear,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Self::Relu => x.max(0.0),
            Self::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Self::Tanh => x.tanh(),
            Self::Linear => x,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    pub activation: Activation,
}

/// Serialized form of a [`DenseDecoder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// `[sequence_len, bit_count]`
    pub input_shape: [usize; 2],
    pub layers: Vec<DenseLayer>,
}

#[derive(Debug, Clone)]
struct CompiledLayer {
    weights: Array2<f64>,
    bias: Array1<f64>,
    activation: Activation,
}

/// Feed-forward decoder network. Immutable after construction.
#[derive(Debug, Clone)]
pub struct DenseDecoder {
    sequence_len: usize,
    bit_count: usize,
    layers: Vec<CompiledLayer>,
}

impl DenseDecoder {
    /// Build a decoder from an artifact, checking every shape.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        let [sequence_len, bit_count] = artifact.input_shape;
        if sequence_len == 0 || bit_count == 0 {
            return Err(invalid("input shape must be non-empty"));
        }
        let Some(last) = artifact.layers.last() else {
            return Err(invalid("model has no layers"));
        };
        if last.activation != Activation::Sigmoid {
            return Err(invalid("output layer must use a sigmoid activation"));
        }

        let mut inputs = sequence_len * bit_count;
        let mut layers = Vec::with_capacity(artifact.layers.len());
        for (index, layer) in artifact.layers.into_iter().enumerate() {
            let outputs = layer.bias.len();
            if layer.weights.len() != inputs {
                return Err(invalid(format!(
                    "layer {} has {} weight rows, expected {}",
                    index,
                    layer.weights.len(),
                    inputs
                )));
            }
            if let Some(row) = layer.weights.iter().position(|r| r.len() != outputs) {
                return Err(invalid(format!(
                    "layer {} weight row {} does not match its {} biases",
                    index, row, outputs
                )));
            }

            let flat: Vec<f64> = layer.weights.into_iter().flatten().collect();
            if flat.iter().chain(&layer.bias).any(|v| !v.is_finite()) {
                return Err(invalid(format!("layer {} has non-finite parameters", index)));
            }
            let weights = Array2::from_shape_vec((inputs, outputs), flat)
                .map_err(|e| invalid(format!("layer {}: {}", index, e)))?;

            layers.push(CompiledLayer {
                weights,
                bias: Array1::from(layer.bias),
                activation: layer.activation,
            });
            inputs = outputs;
        }

        if inputs != bit_count {
            return Err(invalid(format!(
                "model outputs {} values for {} bits",
                inputs, bit_count
            )));
        }

        Ok(Self {
            sequence_len,
            bit_count,
            layers,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let artifact: ModelArtifact = serde_json::from_str(json)
            .map_err(|e| invalid(format!("malformed model JSON: {}", e)))?;
        Self::from_artifact(artifact)
    }

    /// Load a model artifact. Any failure is a `FatalLoad`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let fatal = |reason: String| WatermarkError::FatalLoad {
            artifact: "model",
            path: path.to_path_buf(),
            reason,
        };
        let json = std::fs::read_to_string(path).map_err(|e| fatal(e.to_string()))?;
        Self::from_json_str(&json).map_err(|e| fatal(e.to_string()))
    }
}

impl BitDecoderModel for DenseDecoder {
    fn sequence_len(&self) -> usize {
        self.sequence_len
    }

    fn bit_count(&self) -> usize {
        self.bit_count
    }

    fn predict(&self, sequence: &Array2<f64>) -> Result<Vec<f64>> {
        if sequence.dim() != (self.sequence_len, self.bit_count) {
            return Err(invalid(format!(
                "model expects a {}x{} input, got {}x{}",
                self.sequence_len,
                self.bit_count,
                sequence.nrows(),
                sequence.ncols()
            )));
        }

        let mut x: Array1<f64> = sequence.iter().copied().collect();
        for layer in &self.layers {
            x = x.dot(&layer.weights) + &layer.bias;
            let activation = layer.activation;
            x.mapv_inplace(|v| activation.apply(v));
        }
        Ok(x.to_vec())
    }
}

fn invalid(reason: impl Into<String>) -> WatermarkError {
    WatermarkError::InvalidInput(reason.into())
}
