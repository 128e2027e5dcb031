use std::path::{Path, PathBuf};

use anyhow::{anyhow, ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::features::FeatureType;
use crate::training::{OptimizerKind, SchedulerKind};

/// Immutable pipeline configuration, built once at process start and passed
/// by reference to every component.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub audio: AudioConfig,
    pub spectral: SpectralConfig,
    pub training: TrainingConfig,
    pub corpora: CorpusRoots,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub clip_seconds: f64,
    /// Inference-only loudness target in dBFS.
    pub loudness_target_db: f32,
    /// Below this RMS a clip is treated as silence and left unscaled.
    pub silence_rms_floor: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            clip_seconds: 4.0,
            loudness_target_db: -25.0,
            silence_rms_floor: 1e-6,
        }
    }
}

impl AudioConfig {
    /// Fixed clip length in samples (64000 for 4 s at 16 kHz).
    pub fn clip_samples(&self) -> usize {
        (self.sample_rate as f64 * self.clip_seconds).round() as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpectralConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    pub n_mfcc: usize,
    pub freq_mask_param: usize,
    pub time_mask_param: usize,
    pub top_db: f32,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            n_fft: 512,
            hop_length: 160,
            n_mels: 40,
            n_mfcc: 13,
            freq_mask_param: 8,
            time_mask_param: 8,
            top_db: 80.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub weight_decay: f32,
    pub seed: u64,
    pub val_fraction: f64,
    pub test_fraction: f64,
    pub hidden_dim: usize,
    pub optimizer: OptimizerKind,
    pub scheduler: SchedulerKind,
    pub class_weighted: bool,
    pub feature_type: FeatureType,
    pub augment: bool,
    pub checkpoint_path: PathBuf,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            epochs: 30,
            learning_rate: 1e-3,
            weight_decay: 1e-5,
            seed: 42,
            val_fraction: 0.1,
            test_fraction: 0.1,
            hidden_dim: 64,
            optimizer: OptimizerKind::Adam,
            scheduler: SchedulerKind::None,
            class_weighted: false,
            feature_type: FeatureType::Mfcc,
            augment: false,
            checkpoint_path: PathBuf::from("best_model.json"),
        }
    }
}

/// Optional root directory per supported corpus.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorpusRoots {
    pub ravdess: Option<PathBuf>,
    pub cremad: Option<PathBuf>,
    pub tess: Option<PathBuf>,
    pub savee: Option<PathBuf>,
    pub emotions: Option<PathBuf>,
}

impl PipelineConfig {
    /// Load a TOML file; missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_override(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let audio = &self.audio;
        ensure!(audio.sample_rate > 0, "sample_rate must be positive");
        ensure!(audio.clip_seconds > 0.0, "clip_seconds must be positive");
        ensure!(
            audio.silence_rms_floor > 0.0,
            "silence_rms_floor must be positive"
        );

        let spectral = &self.spectral;
        ensure!(spectral.n_fft > 0, "n_fft must be positive");
        ensure!(spectral.hop_length > 0, "hop_length must be positive");
        ensure!(
            spectral.hop_length <= spectral.n_fft,
            "hop_length ({}) must not exceed n_fft ({})",
            spectral.hop_length,
            spectral.n_fft
        );
        ensure!(spectral.n_mels > 0, "n_mels must be positive");
        ensure!(
            spectral.n_mfcc > 0 && spectral.n_mfcc <= spectral.n_mels,
            "n_mfcc must be in 1..={} (got {})",
            spectral.n_mels,
            spectral.n_mfcc
        );

        let training = &self.training;
        ensure!(training.batch_size > 0, "batch_size must be positive");
        ensure!(training.learning_rate > 0.0, "learning_rate must be positive");
        ensure!(training.weight_decay >= 0.0, "weight_decay must be non-negative");
        ensure!(training.hidden_dim > 0, "hidden_dim must be positive");
        for (name, value) in [
            ("val_fraction", training.val_fraction),
            ("test_fraction", training.test_fraction),
        ] {
            ensure!(
                (0.0..1.0).contains(&value),
                "{} must be in [0, 1) (got {})",
                name,
                value
            );
        }
        ensure!(
            training.val_fraction + training.test_fraction < 1.0,
            "val_fraction + test_fraction must leave room for training data"
        );
        Ok(())
    }

    pub fn with_corpus_root(mut self, name: &str, root: PathBuf) -> Result<Self> {
        let root = canonicalize_dir(&root)?;
        let slot = match name.trim().to_ascii_lowercase().as_str() {
            "ravdess" => &mut self.corpora.ravdess,
            "cremad" | "crema-d" => &mut self.corpora.cremad,
            "tess" => &mut self.corpora.tess,
            "savee" => &mut self.corpora.savee,
            "emotions" => &mut self.corpora.emotions,
            other => return Err(anyhow!("unknown corpus '{}'", other)),
        };
        *slot = Some(root);
        Ok(self)
    }
}

fn canonicalize_dir(path: &Path) -> Result<PathBuf> {
    let canonical = path
        .canonicalize()
        .with_context(|| format!("failed to resolve corpus directory at {:?}", path))?;
    if canonical.is_dir() {
        Ok(canonical)
    } else {
        Err(anyhow!("corpus path {:?} is not a directory", canonical))
    }
}
