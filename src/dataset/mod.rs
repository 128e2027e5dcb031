//! Dataset aggregation: one logical index over several corpora, with lazy
//! per-access normalization and feature extraction.

pub mod split;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{info, warn};

use crate::audio::AudioNormalizer;
use crate::config::PipelineConfig;
use crate::corpus::Corpus;
use crate::features::{FeatureExtractor, FeatureTensor, FeatureType};
use crate::types::{Emotion, Sample};

pub use split::{stratified_split, Split};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset is empty: no usable samples across {corpora} corpora")]
    Empty { corpora: usize },
    #[error("sample index {index} out of range for dataset of {len} samples")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("failed to load audio {path:?}: {message}")]
    Audio { path: PathBuf, message: String },
}

/// Ordered samples of all corpora plus their class histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetIndex {
    samples: Vec<Sample>,
    counts: [usize; Emotion::COUNT],
}

impl DatasetIndex {
    /// Scan every corpus (in parallel) and concatenate in corpus order.
    /// Fails when no corpus yields a usable sample.
    pub fn build(corpora: &[Corpus]) -> Result<Self, DatasetError> {
        let scanned: Vec<Vec<Sample>> = corpora.par_iter().map(Corpus::scan).collect();
        let samples: Vec<Sample> = scanned.into_iter().flatten().collect();
        if samples.is_empty() {
            return Err(DatasetError::Empty {
                corpora: corpora.len(),
            });
        }
        let index = Self::from_samples(samples)?;
        info!(
            corpora = corpora.len(),
            samples = index.len(),
            "dataset index built"
        );
        Ok(index)
    }

    pub fn from_samples(samples: Vec<Sample>) -> Result<Self, DatasetError> {
        if samples.is_empty() {
            return Err(DatasetError::Empty { corpora: 0 });
        }
        let mut counts = [0usize; Emotion::COUNT];
        for sample in &samples {
            counts[sample.label.index()] += 1;
        }
        Ok(Self { samples, counts })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample(&self, index: usize) -> Result<&Sample, DatasetError> {
        self.samples
            .get(index)
            .ok_or(DatasetError::IndexOutOfRange {
                index,
                len: self.samples.len(),
            })
    }

    pub fn class_counts(&self) -> [usize; Emotion::COUNT] {
        self.counts
    }

    /// Label index of every sample, in index order.
    pub fn label_indices(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.label.index()).collect()
    }

    /// Inverse class frequency; an absent class counts as one sample.
    pub fn class_weights(&self) -> Vec<f32> {
        inverse_frequency(&self.counts)
    }
}

pub fn inverse_frequency(counts: &[usize]) -> Vec<f32> {
    counts.iter().map(|&c| 1.0 / c.max(1) as f32).collect()
}

/// Training view over a [`DatasetIndex`]. `get` decodes, normalizes and
/// extracts on every call; nothing is cached and nothing is mutated except
/// the augmentation draw counter, so it is safe to call from many threads.
#[derive(Debug)]
pub struct EmotionDataset {
    index: DatasetIndex,
    normalizer: AudioNormalizer,
    extractor: FeatureExtractor,
    feature_type: FeatureType,
    augment: bool,
    seed: u64,
    draws: AtomicU64,
}

impl EmotionDataset {
    pub fn new(index: DatasetIndex, config: &PipelineConfig) -> Self {
        Self {
            index,
            normalizer: AudioNormalizer::for_training(&config.audio),
            extractor: FeatureExtractor::new(&config.spectral, config.audio.sample_rate),
            feature_type: config.training.feature_type,
            augment: config.training.augment,
            seed: config.training.seed,
            draws: AtomicU64::new(0),
        }
    }

    pub fn with_feature_type(mut self, feature_type: FeatureType) -> Self {
        self.feature_type = feature_type;
        self
    }

    pub fn with_augment(mut self, augment: bool) -> Self {
        self.augment = augment;
        self
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &DatasetIndex {
        &self.index
    }

    /// Whether `get` and augmented batches apply SpecAugment masking.
    pub fn augments(&self) -> bool {
        self.augment
    }

    pub fn feature_type(&self) -> FeatureType {
        self.feature_type
    }

    pub fn normalizer(&self) -> &AudioNormalizer {
        &self.normalizer
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn class_weights(&self) -> Vec<f32> {
        self.index.class_weights()
    }

    /// Features and label index of one sample, augmented when enabled.
    pub fn get(&self, index: usize) -> Result<(FeatureTensor, usize), DatasetError> {
        let draw = self.draws.fetch_add(1, Ordering::Relaxed);
        self.load(index, self.augment.then_some(draw))
    }

    /// Features without augmentation, for evaluation.
    pub fn get_clean(&self, index: usize) -> Result<(FeatureTensor, usize), DatasetError> {
        self.load(index, None)
    }

    /// Load many samples in parallel. Unreadable files are logged and left
    /// out; the returned triples are `(index, features, label)` in input
    /// order.
    pub fn load_batch(
        &self,
        indices: &[usize],
        augment: bool,
    ) -> Vec<(usize, FeatureTensor, usize)> {
        let base = self.draws.fetch_add(indices.len() as u64, Ordering::Relaxed);
        indices
            .par_iter()
            .enumerate()
            .filter_map(|(offset, &index)| {
                let draw = (augment && self.augment).then_some(base + offset as u64);
                match self.load(index, draw) {
                    Ok((features, label)) => Some((index, features, label)),
                    Err(err) => {
                        warn!(index, error = %err, "skipping unreadable sample");
                        None
                    }
                }
            })
            .collect()
    }

    fn load(
        &self,
        index: usize,
        augment_draw: Option<u64>,
    ) -> Result<(FeatureTensor, usize), DatasetError> {
        let sample = self.index.sample(index)?;
        let audio = self
            .normalizer
            .normalize_path(&sample.path)
            .map_err(|err| DatasetError::Audio {
                path: sample.path.clone(),
                message: format!("{:#}", err),
            })?;
        let features = match augment_draw {
            Some(draw) => {
                let mut rng = StdRng::seed_from_u64(mix_seed(self.seed, draw));
                self.extractor
                    .extract_augmented(&audio.samples, self.feature_type, &mut rng)
            }
            None => self.extractor.extract(&audio.samples, self.feature_type),
        };
        Ok((features, sample.label.index()))
    }
}

fn mix_seed(seed: u64, draw: u64) -> u64 {
    seed ^ draw.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}
