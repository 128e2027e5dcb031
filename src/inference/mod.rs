//! Single-clip prediction with a trained artifact.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::audio::{decoder, AudioNormalizer};
use crate::features::FeatureExtractor;
use crate::training::{argmax, softmax, ArtifactError, EmotionModel, TrainedArtifact};
use crate::types::Emotion;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("could not decode audio: {0}")]
    Decode(String),
    #[error("model evaluation failed: {0}")]
    Model(String),
}

/// Predicted label plus the full distribution, keyed in canonical order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    #[serde(rename = "prediction")]
    pub label: Emotion,
    pub probabilities: BTreeMap<Emotion, f32>,
}

/// Stateless across calls; share it behind an `Arc` between request tasks.
pub struct InferenceService {
    normalizer: AudioNormalizer,
    extractor: FeatureExtractor,
    model: Box<dyn EmotionModel>,
}

impl InferenceService {
    pub fn new(
        model: Box<dyn EmotionModel>,
        normalizer: AudioNormalizer,
        extractor: FeatureExtractor,
    ) -> Self {
        Self {
            normalizer,
            extractor,
            model,
        }
    }

    /// Rebuild the deployed pipeline from an artifact whose label order was
    /// already verified.
    pub fn from_artifact(artifact: TrainedArtifact) -> Self {
        let normalizer =
            AudioNormalizer::for_training(&artifact.audio).with_loudness(artifact.loudness);
        let extractor = FeatureExtractor::new(&artifact.spectral, artifact.audio.sample_rate);
        Self::new(Box::new(artifact.model), normalizer, extractor)
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        TrainedArtifact::load(path).map(Self::from_artifact)
    }

    pub fn normalizer(&self) -> &AudioNormalizer {
        &self.normalizer
    }

    pub fn predict(&self, bytes: Vec<u8>) -> Result<Prediction, InferenceError> {
        self.predict_upload(bytes, None)
    }

    /// Like [`predict`](Self::predict), with the upload's file extension as a
    /// container hint for the decoder.
    pub fn predict_upload(
        &self,
        bytes: Vec<u8>,
        extension: Option<&str>,
    ) -> Result<Prediction, InferenceError> {
        let decoded = decoder::decode_bytes(bytes, extension)
            .map_err(|err| InferenceError::Decode(format!("{:#}", err)))?;
        let audio = self
            .normalizer
            .normalize(decoded)
            .map_err(|err| InferenceError::Decode(format!("{:#}", err)))?;
        self.predict_samples(&audio.samples)
    }

    /// Predict from a waveform already at the service's rate and length.
    pub fn predict_samples(&self, samples: &[f32]) -> Result<Prediction, InferenceError> {
        let features = self.extractor.extract(samples, self.model.feature_type());
        let logits = self
            .model
            .logits(&features)
            .map_err(|err| InferenceError::Model(format!("{:#}", err)))?;
        if logits.len() != Emotion::COUNT {
            return Err(InferenceError::Model(format!(
                "expected {} logits, got {}",
                Emotion::COUNT,
                logits.len()
            )));
        }

        let probs = softmax(&logits);
        let best = argmax(&probs);
        let label = Emotion::from_index(best)
            .ok_or_else(|| InferenceError::Model(format!("no label for index {}", best)))?;
        let probabilities = Emotion::ALL.iter().copied().zip(probs.iter().copied()).collect();
        debug!(%label, "prediction");
        Ok(Prediction {
            label,
            probabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AudioConfig, SpectralConfig};
    use crate::features::{FeatureTensor, FeatureType};
    use anyhow::Result;
    use ndarray::{array, Array1};

    struct FixedModel(Array1<f32>);

    impl EmotionModel for FixedModel {
        fn feature_type(&self) -> FeatureType {
            FeatureType::Mfcc
        }

        fn logits(&self, _features: &FeatureTensor) -> Result<Array1<f32>> {
            Ok(self.0.clone())
        }
    }

    fn service(logits: Array1<f32>) -> InferenceService {
        let audio = AudioConfig::default();
        InferenceService::new(
            Box::new(FixedModel(logits)),
            AudioNormalizer::for_inference(&audio),
            FeatureExtractor::new(&SpectralConfig::default(), audio.sample_rate),
        )
    }

    #[test]
    fn prediction_is_argmax_of_distribution() {
        let service = service(array![0.0, 0.0, 0.0, 0.0, 3.0, 0.0, 1.0, 0.0]);
        let prediction = service.predict_samples(&vec![0.0; 16_000]).unwrap();
        assert_eq!(prediction.label, Emotion::Happy);
        assert_eq!(prediction.probabilities.len(), Emotion::COUNT);
        let total: f32 = prediction.probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn wrong_logit_count_is_a_model_error() {
        let service = service(array![1.0, 2.0]);
        assert!(matches!(
            service.predict_samples(&[0.0; 1_000]),
            Err(InferenceError::Model(_))
        ));
    }

    #[test]
    fn garbage_upload_is_a_decode_error() {
        let service = service(Array1::zeros(Emotion::COUNT));
        assert!(matches!(
            service.predict(b"definitely not audio".to_vec()),
            Err(InferenceError::Decode(_))
        ));
        assert!(matches!(
            service.predict(Vec::new()),
            Err(InferenceError::Decode(_))
        ));
    }

    #[test]
    fn extension_hint_is_used_for_uploads() {
        let service = service(Array1::zeros(Emotion::COUNT));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..8_000 {
                writer.write_sample(((i % 40) as i16 - 20) * 500).unwrap();
            }
            writer.finalize().unwrap();
        }
        let bytes = cursor.into_inner();

        let hinted = service.predict_upload(bytes.clone(), Some("wav")).unwrap();
        let probed = service.predict(bytes).unwrap();
        assert_eq!(hinted, probed);
        assert!(matches!(
            service.predict_upload(b"not a wav".to_vec(), Some("wav")),
            Err(InferenceError::Decode(_))
        ));
    }

    #[test]
    fn serializes_with_prediction_key() {
        let service = service(array![5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let prediction = service.predict_samples(&[0.0; 1_000]).unwrap();
        let json = serde_json::to_value(&prediction).unwrap();
        assert_eq!(json["prediction"], "angry");
        assert_eq!(json["probabilities"].as_object().unwrap().len(), 8);
    }
}
