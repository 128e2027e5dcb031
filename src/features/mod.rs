//! Feature extraction: raw waveform, MFCC or log-mel matrices.

mod augment;
mod mel;
mod mfcc;
mod stft;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use ndarray::{Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::SpectralConfig;

pub use augment::SpecAugment;

/// Representation a model consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    /// The normalized waveform, unchanged.
    Raw,
    /// `n_mfcc x frames` cepstral coefficients.
    Mfcc,
    /// `n_mels x frames` mel power in dB.
    #[serde(alias = "log_mel")]
    LogMel,
}

impl FeatureType {
    pub fn name(self) -> &'static str {
        match self {
            FeatureType::Raw => "raw",
            FeatureType::Mfcc => "mfcc",
            FeatureType::LogMel => "logmel",
        }
    }
}

impl Display for FeatureType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(FeatureType::Raw),
            "mfcc" => Ok(FeatureType::Mfcc),
            "logmel" | "log_mel" | "log-mel" => Ok(FeatureType::LogMel),
            other => Err(format!("unknown feature type '{}'", other)),
        }
    }
}

/// Model-ready features for one clip.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureTensor {
    Waveform(Array1<f32>),
    /// Rows are coefficients or mel bins, columns are time frames.
    Matrix(Array2<f32>),
}

impl FeatureTensor {
    pub fn shape(&self) -> Vec<usize> {
        match self {
            FeatureTensor::Waveform(w) => vec![w.len()],
            FeatureTensor::Matrix(m) => vec![m.nrows(), m.ncols()],
        }
    }

    pub fn as_matrix(&self) -> Option<&Array2<f32>> {
        match self {
            FeatureTensor::Matrix(m) => Some(m),
            FeatureTensor::Waveform(_) => None,
        }
    }

    pub fn as_waveform(&self) -> Option<&Array1<f32>> {
        match self {
            FeatureTensor::Waveform(w) => Some(w),
            FeatureTensor::Matrix(_) => None,
        }
    }
}

/// Converts normalized waveforms into feature tensors. Holds precomputed
/// window, FFT plan, filterbank and DCT basis; safe to share across threads.
#[derive(Debug)]
pub struct FeatureExtractor {
    spectral: SpectralConfig,
    stft: stft::Stft,
    filterbank: Array2<f32>,
    dct: Array2<f32>,
}

impl FeatureExtractor {
    pub fn new(spectral: &SpectralConfig, sample_rate: u32) -> Self {
        Self {
            spectral: spectral.clone(),
            stft: stft::Stft::new(spectral.n_fft, spectral.hop_length),
            filterbank: mel::mel_filterbank(spectral.n_mels, spectral.n_fft, sample_rate),
            dct: mfcc::dct_matrix(spectral.n_mfcc, spectral.n_mels),
        }
    }

    pub fn spec_augment(&self) -> SpecAugment {
        SpecAugment::new(self.spectral.freq_mask_param, self.spectral.time_mask_param)
    }

    /// Shape of the tensor produced for a clip of `samples` length.
    pub fn output_shape(&self, feature_type: FeatureType, samples: usize) -> Vec<usize> {
        let frames = self.stft.frame_count(samples);
        match feature_type {
            FeatureType::Raw => vec![samples],
            FeatureType::Mfcc => vec![self.spectral.n_mfcc, frames],
            FeatureType::LogMel => vec![self.spectral.n_mels, frames],
        }
    }

    pub fn extract(&self, samples: &[f32], feature_type: FeatureType) -> FeatureTensor {
        match feature_type {
            FeatureType::Raw => FeatureTensor::Waveform(Array1::from(samples.to_vec())),
            FeatureType::Mfcc => FeatureTensor::Matrix(self.mfcc(samples)),
            FeatureType::LogMel => FeatureTensor::Matrix(self.log_mel(samples)),
        }
    }

    /// Training-time extraction with SpecAugment masking. Only the log-mel
    /// path is augmented; other feature types come back unmasked.
    pub fn extract_augmented<R: Rng + ?Sized>(
        &self,
        samples: &[f32],
        feature_type: FeatureType,
        rng: &mut R,
    ) -> FeatureTensor {
        match feature_type {
            FeatureType::LogMel => {
                let mut spec = self.log_mel(samples);
                self.spec_augment().apply(&mut spec, rng);
                FeatureTensor::Matrix(spec)
            }
            other => self.extract(samples, other),
        }
    }

    fn mel_power(&self, samples: &[f32]) -> Array2<f32> {
        self.filterbank.dot(&self.stft.power(samples))
    }

    fn log_mel(&self, samples: &[f32]) -> Array2<f32> {
        mel::power_to_db(&self.mel_power(samples))
    }

    fn mfcc(&self, samples: &[f32]) -> Array2<f32> {
        let mut db = mel::power_to_db(&self.mel_power(samples));
        mel::clamp_dynamic_range(&mut db, self.spectral.top_db);
        self.dct.dot(&db)
    }
}
