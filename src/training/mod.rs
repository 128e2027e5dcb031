//! Training loop, baseline model and the persisted model artifact.

pub mod checkpoint;
pub mod metrics;
pub mod model;
pub mod optimizer;
pub mod scheduler;

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{ensure, Context, Result};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audio::AudioNormalizer;
use crate::config::PipelineConfig;
use crate::corpus::corpora_from_roots;
use crate::dataset::{stratified_split, DatasetError, DatasetIndex, EmotionDataset};
use crate::features::{FeatureTensor, FeatureType};
use crate::types::Emotion;

pub use checkpoint::{ArtifactError, TrainedArtifact};
pub use metrics::ClassificationMetrics;
pub use model::{argmax, pool_features, softmax, FeedForward};
pub use optimizer::Optimizer;
pub use scheduler::LrScheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Adam,
    AdamW,
}

impl Display for OptimizerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OptimizerKind::Adam => "adam",
            OptimizerKind::AdamW => "adamw",
        })
    }
}

impl FromStr for OptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adam" => Ok(OptimizerKind::Adam),
            "adamw" => Ok(OptimizerKind::AdamW),
            other => Err(format!("unknown optimizer '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    None,
    Plateau,
    Linear,
}

impl Display for SchedulerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SchedulerKind::None => "none",
            SchedulerKind::Plateau => "plateau",
            SchedulerKind::Linear => "linear",
        })
    }
}

impl FromStr for SchedulerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(SchedulerKind::None),
            "plateau" => Ok(SchedulerKind::Plateau),
            "linear" => Ok(SchedulerKind::Linear),
            other => Err(format!("unknown scheduler '{}'", other)),
        }
    }
}

/// A classifier over the eight canonical emotions.
pub trait EmotionModel: Send + Sync {
    /// Feature representation the model was trained on.
    fn feature_type(&self) -> FeatureType;

    /// Unnormalized scores in canonical label order.
    fn logits(&self, features: &FeatureTensor) -> Result<Array1<f32>>;
}

pub trait TrainableModel: EmotionModel {
    /// One optimizer step on a batch of pooled inputs; returns the batch loss.
    fn train_batch(
        &mut self,
        inputs: &Array2<f32>,
        labels: &[usize],
        class_weights: &[f32],
        optimizer: &mut Optimizer,
    ) -> Result<f32>;
}

#[derive(Debug, Clone, Serialize)]
pub struct EpochSummary {
    pub epoch: usize,
    pub loss: f32,
    pub learning_rate: f32,
    pub validation: ClassificationMetrics,
    pub improved: bool,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub epochs: Vec<EpochSummary>,
    pub best_epoch: usize,
    pub best_f1: f32,
    pub test: Option<ClassificationMetrics>,
    pub checkpoint: PathBuf,
    pub artifact: TrainedArtifact,
}

/// Pooled feature rows for a set of samples that loaded successfully.
struct PooledBatch {
    indices: Vec<usize>,
    inputs: Array2<f32>,
    labels: Vec<usize>,
}

impl PooledBatch {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn rows(&self, positions: &[usize]) -> (Array2<f32>, Vec<usize>) {
        (
            self.inputs.select(Axis(0), positions),
            positions.iter().map(|&p| self.labels[p]).collect(),
        )
    }
}

/// Scan every configured corpus and train on the result. An empty aggregate
/// stops here, before any model or optimizer state exists.
pub fn train(config: &PipelineConfig) -> Result<TrainingReport> {
    let corpora = corpora_from_roots(&config.corpora);
    let index = DatasetIndex::build(&corpora)?;
    let dataset = EmotionDataset::new(index, config);
    Trainer::new(config).run(&dataset)
}

pub struct Trainer<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Trainer<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, dataset: &EmotionDataset) -> Result<TrainingReport> {
        let settings = &self.config.training;
        ensure!(!dataset.is_empty(), DatasetError::Empty { corpora: 0 });
        ensure!(settings.batch_size > 0, "batch_size must be positive");

        let labels = dataset.index().label_indices();
        let split = stratified_split(
            &labels,
            settings.val_fraction,
            settings.test_fraction,
            settings.seed,
        );
        info!(
            train = split.train.len(),
            val = split.val.len(),
            test = split.test.len(),
            feature = %dataset.feature_type(),
            "dataset split"
        );

        let train_set = pooled_batch(dataset, &split.train, false)?;
        ensure!(!train_set.is_empty(), "no training sample could be loaded");
        let eval_set = if split.val.is_empty() {
            warn!("validation split is empty; selecting checkpoints on the training split");
            None
        } else {
            Some(pooled_batch(dataset, &split.val, false)?)
        };
        let eval_set = eval_set.as_ref().unwrap_or(&train_set);

        let mut model = FeedForward::new(
            dataset.feature_type(),
            train_set.inputs.ncols(),
            settings.hidden_dim,
            settings.seed,
        )?;
        model.fit_standardizer(&train_set.inputs)?;

        let class_weights = if settings.class_weighted {
            dataset.class_weights()
        } else {
            vec![1.0; Emotion::COUNT]
        };
        let mut scheduler = LrScheduler::new(settings.scheduler);
        let mut optimizer = Optimizer::new(
            settings.optimizer,
            scheduler.initial_rate(settings.learning_rate),
            settings.weight_decay,
        );

        let normalizer = AudioNormalizer::for_inference(&self.config.audio);
        let checkpoint = settings.checkpoint_path.clone();
        let mut order_rng = StdRng::seed_from_u64(settings.seed);
        let mut order: Vec<usize> = (0..train_set.len()).collect();
        let mut epochs = Vec::with_capacity(settings.epochs);
        let mut best: Option<TrainedArtifact> = None;

        for epoch in 1..=settings.epochs {
            order.shuffle(&mut order_rng);
            let learning_rate = optimizer.learning_rate();
            let mut loss_sum = 0.0f32;
            let mut seen = 0usize;

            for positions in order.chunks(settings.batch_size) {
                let (inputs, batch_labels) = if dataset.augments() {
                    let indices: Vec<usize> =
                        positions.iter().map(|&p| train_set.indices[p]).collect();
                    let batch = pooled_batch(dataset, &indices, true)?;
                    (batch.inputs, batch.labels)
                } else {
                    train_set.rows(positions)
                };
                if batch_labels.is_empty() {
                    continue;
                }
                let loss =
                    model.train_batch(&inputs, &batch_labels, &class_weights, &mut optimizer)?;
                loss_sum += loss * batch_labels.len() as f32;
                seen += batch_labels.len();
            }

            let loss = loss_sum / seen.max(1) as f32;
            let validation = evaluate(&model, eval_set)?;
            let best_f1 = best.as_ref().map_or(f32::NEG_INFINITY, |a| a.validation_f1);
            let improved = validation.f1 > best_f1;
            info!(
                epoch,
                loss,
                learning_rate,
                accuracy = validation.accuracy,
                precision = validation.precision,
                recall = validation.recall,
                f1 = validation.f1,
                "epoch finished"
            );

            if improved {
                let artifact = TrainedArtifact {
                    labels: Emotion::ALL.to_vec(),
                    feature_type: dataset.feature_type(),
                    audio: self.config.audio.clone(),
                    spectral: self.config.spectral.clone(),
                    loudness: normalizer.loudness(),
                    epoch,
                    validation_f1: validation.f1,
                    model: model.clone(),
                };
                artifact
                    .save(&checkpoint)
                    .with_context(|| format!("failed to write checkpoint {}", checkpoint.display()))?;
                info!(epoch, f1 = validation.f1, path = %checkpoint.display(), "saved new best model");
                best = Some(artifact);
            }

            let next = scheduler.step(settings.learning_rate, optimizer.learning_rate(), loss);
            if next != optimizer.learning_rate() {
                info!(epoch, learning_rate = next, "learning rate adjusted");
            }
            optimizer.set_learning_rate(next);

            epochs.push(EpochSummary {
                epoch,
                loss,
                learning_rate,
                validation,
                improved,
            });
        }

        let artifact = best.context("training ran zero epochs; no checkpoint was written")?;
        let test = if split.test.is_empty() {
            None
        } else {
            let test_set = pooled_batch(dataset, &split.test, false)?;
            let metrics = evaluate(&artifact.model, &test_set)?;
            info!(
                accuracy = metrics.accuracy,
                f1 = metrics.f1,
                support = metrics.support,
                "test split evaluated with best model"
            );
            Some(metrics)
        };

        Ok(TrainingReport {
            epochs,
            best_epoch: artifact.epoch,
            best_f1: artifact.validation_f1,
            test,
            checkpoint,
            artifact,
        })
    }
}

fn pooled_batch(dataset: &EmotionDataset, indices: &[usize], augment: bool) -> Result<PooledBatch> {
    let loaded = dataset.load_batch(indices, augment);
    let mut kept = Vec::with_capacity(loaded.len());
    let mut labels = Vec::with_capacity(loaded.len());
    let mut rows: Vec<Array1<f32>> = Vec::with_capacity(loaded.len());
    for (index, features, label) in loaded {
        rows.push(pool_features(&features)?);
        kept.push(index);
        labels.push(label);
    }

    let dim = rows.first().map_or(0, |r| r.len());
    let mut inputs = Array2::<f32>::zeros((rows.len(), dim));
    for (mut target, row) in inputs.rows_mut().into_iter().zip(&rows) {
        ensure!(row.len() == dim, "pooled feature rows differ in length");
        target.assign(row);
    }
    Ok(PooledBatch {
        indices: kept,
        inputs,
        labels,
    })
}

fn evaluate(model: &FeedForward, set: &PooledBatch) -> Result<ClassificationMetrics> {
    if set.is_empty() {
        return Ok(ClassificationMetrics::compute(&[], &[], Emotion::COUNT));
    }
    let logits = model.logits_batch(&set.inputs)?;
    let predictions: Vec<usize> = logits.rows().into_iter().map(|row| argmax(&row)).collect();
    Ok(ClassificationMetrics::compute(
        &set.labels,
        &predictions,
        Emotion::COUNT,
    ))
}
