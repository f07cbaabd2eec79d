//! Decoder service: feature extraction, normalisation, inference, thresholding.
//!
//! A `DecoderService` owns the model and scaler. It is built once (usually
//! by [`DecoderService::load`] at process start) and then shared by
//! reference; every per-call setting is an argument to the decode methods.

use std::fmt;
use std::path::Path;

use image::RgbImage;
use tracing::{debug, info};

use crate::aggregate::SequenceAggregator;
use crate::error::{Result, WatermarkError};
use crate::features::FeatureExtractor;
use crate::image_io::load_rgb;
use crate::model::{BitDecoderModel, DenseDecoder};
use crate::scaler::Scaler;
use crate::wavelet::Wavelet;

pub struct DecoderService {
    model: Box<dyn BitDecoderModel>,
    scaler: Scaler,
    extractor: FeatureExtractor,
    aggregator: SequenceAggregator,
}

impl fmt::Debug for DecoderService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderService")
            .field("sequence_len", &self.model.sequence_len())
            .field("bit_count", &self.model.bit_count())
            .field("extractor", &self.extractor)
            .finish()
    }
}

impl DecoderService {
    /// Assemble a service from already-loaded parts.
    ///
    /// The scaler must have one entry per model output bit.
    pub fn new(
        model: Box<dyn BitDecoderModel>,
        scaler: Scaler,
        extractor: FeatureExtractor,
    ) -> Result<Self> {
        if model.sequence_len() == 0 || model.bit_count() == 0 {
            return Err(WatermarkError::InvalidInput(
                "model declares an empty input shape".into(),
            ));
        }
        if scaler.dim() != model.bit_count() {
            return Err(WatermarkError::InvalidInput(format!(
                "scaler has {} features but model decodes {} bits",
                scaler.dim(),
                model.bit_count()
            )));
        }
        Ok(Self {
            model,
            scaler,
            extractor,
            aggregator: SequenceAggregator::default(),
        })
    }

    /// Load the model and scaler artifacts with the default extractor.
    pub fn load(model_path: impl AsRef<Path>, scaler_path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(model_path, scaler_path, FeatureExtractor::default())
    }

    /// Load both artifacts. Every failure, including a shape mismatch
    /// between them, is a `FatalLoad`.
    pub fn load_with(
        model_path: impl AsRef<Path>,
        scaler_path: impl AsRef<Path>,
        extractor: FeatureExtractor,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let scaler_path = scaler_path.as_ref();

        let model = DenseDecoder::load(model_path)?;
        let scaler = Scaler::from_json_file(scaler_path)?;
        let service = Self::new(Box::new(model), scaler, extractor).map_err(|e| {
            WatermarkError::FatalLoad {
                artifact: "scaler",
                path: scaler_path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        info!(
            model = %model_path.display(),
            scaler = %scaler_path.display(),
            sequence_len = service.sequence_len(),
            bit_count = service.bit_count(),
            "Decoder loaded"
        );
        Ok(service)
    }

    pub fn bit_count(&self) -> usize {
        self.model.bit_count()
    }

    pub fn sequence_len(&self) -> usize {
        self.model.sequence_len()
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Per-bit probabilities for one image.
    pub fn decode_probabilities(&self, image: &RgbImage, wavelet: Wavelet) -> Result<Vec<f64>> {
        let windows = self.extractor.extract_windows(
            image,
            wavelet,
            self.bit_count(),
            self.sequence_len(),
        )?;
        let normalized = self.scaler.normalize_rows(&windows)?;
        let probabilities = self.model.predict(&normalized)?;

        if probabilities.len() != self.bit_count() {
            return Err(WatermarkError::Processing(format!(
                "model returned {} probabilities for {} bits",
                probabilities.len(),
                self.bit_count()
            )));
        }
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(WatermarkError::Processing(
                "model returned non-finite probabilities".into(),
            ));
        }
        Ok(probabilities)
    }

    /// Decode the payload of one image.
    pub fn decode(&self, image: &RgbImage, wavelet: Wavelet) -> Result<Vec<u8>> {
        let probabilities = self.decode_probabilities(image, wavelet)?;
        let bits = self.aggregator.to_bits(&probabilities);
        debug!(bits = bits.len(), %wavelet, "Decoded watermark");
        Ok(bits)
    }

    /// Decode several copies of the same content, averaging their
    /// probabilities before thresholding.
    pub fn decode_many(&self, images: &[RgbImage], wavelet: Wavelet) -> Result<Vec<u8>> {
        let runs = images
            .iter()
            .map(|image| self.decode_probabilities(image, wavelet))
            .collect::<Result<Vec<_>>>()?;
        self.aggregator.decide_runs(&runs)
    }

    /// Decode straight from encoded image bytes.
    pub fn decode_bytes(&self, bytes: &[u8], wavelet: Wavelet) -> Result<Vec<u8>> {
        let image = load_rgb(bytes)?;
        self.decode(&image, wavelet)
    }
}
