use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::decoder;
use super::resample;
use crate::config::AudioConfig;
use crate::types::{DecodedAudio, NormalizedAudio};

/// RMS loudness target applied by the inference-time normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoudnessTarget {
    pub target_db: f32,
    pub silence_floor: f32,
}

/// Turns decoded audio into a mono, fixed-rate, fixed-length waveform.
///
/// Steps run in order: resample, mono collapse, optional loudness scaling,
/// trim or zero-pad. The training variant never scales loudness.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioNormalizer {
    sample_rate: u32,
    target_len: usize,
    loudness: Option<LoudnessTarget>,
}

impl AudioNormalizer {
    pub fn for_training(audio: &AudioConfig) -> Self {
        Self {
            sample_rate: audio.sample_rate,
            target_len: audio.clip_samples(),
            loudness: None,
        }
    }

    pub fn for_inference(audio: &AudioConfig) -> Self {
        Self::for_training(audio).with_loudness(Some(LoudnessTarget {
            target_db: audio.loudness_target_db,
            silence_floor: audio.silence_rms_floor,
        }))
    }

    pub fn with_loudness(mut self, loudness: Option<LoudnessTarget>) -> Self {
        self.loudness = loudness;
        self
    }

    pub fn with_target_len(mut self, target_len: usize) -> Self {
        self.target_len = target_len;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn target_len(&self) -> usize {
        self.target_len
    }

    pub fn loudness(&self) -> Option<LoudnessTarget> {
        self.loudness
    }

    pub fn normalize_path(&self, path: &Path) -> Result<NormalizedAudio> {
        let decoded = decoder::decode_audio(path)?;
        self.normalize(decoded)
            .with_context(|| format!("Failed to normalize {}", path.display()))
    }

    pub fn normalize_bytes(&self, bytes: Vec<u8>) -> Result<NormalizedAudio> {
        let decoded = decoder::decode_bytes(bytes, None)?;
        self.normalize(decoded)
    }

    pub fn normalize(&self, decoded: DecodedAudio) -> Result<NormalizedAudio> {
        let channels = if decoded.sample_rate != self.sample_rate {
            resample::sinc_resample(&decoded.channels, decoded.sample_rate, self.sample_rate)
                .with_context(|| {
                    format!(
                        "failed to resample audio from {} Hz to {} Hz",
                        decoded.sample_rate, self.sample_rate
                    )
                })?
        } else {
            decoded.channels
        };

        let mut samples = to_mono(channels);
        if let Some(target) = self.loudness {
            normalize_loudness(&mut samples, target);
        }
        fit_length(&mut samples, self.target_len);

        Ok(NormalizedAudio {
            samples,
            sample_rate: self.sample_rate,
        })
    }
}

/// Average channels frame by frame. A single channel is returned as is.
pub fn to_mono(mut channels: Vec<Vec<f32>>) -> Vec<f32> {
    match channels.len() {
        0 => Vec::new(),
        1 => channels.pop().unwrap_or_default(),
        count => {
            let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
            (0..frames)
                .map(|i| channels.iter().map(|c| c[i]).sum::<f32>() / count as f32)
                .collect()
        }
    }
}

/// Truncate to the first `len` samples or zero-pad at the end.
pub fn fit_length(samples: &mut Vec<f32>, len: usize) {
    samples.resize(len, 0.0);
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// Scale to the target RMS loudness and hard-clip to [-1, 1]. Near-silent
/// input is left untouched.
pub fn normalize_loudness(samples: &mut [f32], target: LoudnessTarget) {
    let current = rms(samples);
    if current < target.silence_floor {
        return;
    }
    let gain = 10f32.powf(target.target_db / 20.0) / current;
    for sample in samples.iter_mut() {
        *sample = (*sample * gain).clamp(-1.0, 1.0);
    }
}
