use anyhow::{bail, ensure, Context, Result};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::optimizer::Optimizer;
use super::{EmotionModel, TrainableModel};
use crate::features::{FeatureTensor, FeatureType};
use crate::types::Emotion;

const STD_FLOOR: f32 = 1e-5;

/// Collapse a `(rows, frames)` feature matrix to its per-row mean.
pub fn pool_features(features: &FeatureTensor) -> Result<Array1<f32>> {
    match features {
        FeatureTensor::Matrix(matrix) => matrix
            .mean_axis(Axis(1))
            .context("feature matrix has no frames"),
        FeatureTensor::Waveform(_) => {
            bail!("the feedforward baseline needs mfcc or logmel features, got a raw waveform")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Dense {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl Dense {
    fn new<R: Rng>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (inputs.max(1) as f32).sqrt();
        Self {
            weight: Array2::from_shape_fn((inputs, outputs), |_| rng.random_range(-bound..bound)),
            bias: Array1::from_shape_fn(outputs, |_| rng.random_range(-bound..bound)),
        }
    }

    fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        input.dot(&self.weight) + &self.bias
    }
}

/// Input standardization fitted on the training split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Standardizer {
    mean: Array1<f32>,
    std: Array1<f32>,
}

impl Standardizer {
    fn identity(dim: usize) -> Self {
        Self {
            mean: Array1::zeros(dim),
            std: Array1::ones(dim),
        }
    }

    fn apply(&self, inputs: &Array2<f32>) -> Array2<f32> {
        (inputs - &self.mean) / &self.std
    }
}

/// Two hidden ReLU layers over time-pooled spectral frames, eight logits out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedForward {
    feature_type: FeatureType,
    input_dim: usize,
    hidden_dim: usize,
    standardizer: Standardizer,
    layers: [Dense; 3],
}

struct Activations {
    input: Array2<f32>,
    hidden1: Array2<f32>,
    hidden2: Array2<f32>,
    logits: Array2<f32>,
}

impl FeedForward {
    pub fn new(
        feature_type: FeatureType,
        input_dim: usize,
        hidden_dim: usize,
        seed: u64,
    ) -> Result<Self> {
        ensure!(
            feature_type != FeatureType::Raw,
            "the feedforward baseline needs mfcc or logmel features"
        );
        ensure!(input_dim > 0 && hidden_dim > 0, "layer sizes must be positive");
        let mut rng = StdRng::seed_from_u64(seed);
        Ok(Self {
            feature_type,
            input_dim,
            hidden_dim,
            standardizer: Standardizer::identity(input_dim),
            layers: [
                Dense::new(input_dim, hidden_dim, &mut rng),
                Dense::new(hidden_dim, hidden_dim, &mut rng),
                Dense::new(hidden_dim, Emotion::COUNT, &mut rng),
            ],
        })
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    /// Fit per-feature mean and deviation on pooled training inputs.
    pub fn fit_standardizer(&mut self, inputs: &Array2<f32>) -> Result<()> {
        ensure!(
            inputs.ncols() == self.input_dim,
            "expected {} input features, got {}",
            self.input_dim,
            inputs.ncols()
        );
        let mean = inputs
            .mean_axis(Axis(0))
            .context("cannot fit standardizer on zero rows")?;
        let std = inputs.std_axis(Axis(0), 0.0).mapv(|s| s.max(STD_FLOOR));
        self.standardizer = Standardizer { mean, std };
        Ok(())
    }

    pub fn logits_batch(&self, inputs: &Array2<f32>) -> Result<Array2<f32>> {
        Ok(self.forward(inputs)?.logits)
    }

    fn forward(&self, inputs: &Array2<f32>) -> Result<Activations> {
        ensure!(
            inputs.ncols() == self.input_dim,
            "expected {} input features, got {}",
            self.input_dim,
            inputs.ncols()
        );
        let input = self.standardizer.apply(inputs);
        let hidden1 = self.layers[0].forward(&input).mapv(relu);
        let hidden2 = self.layers[1].forward(&hidden1).mapv(relu);
        let logits = self.layers[2].forward(&hidden2);
        Ok(Activations {
            input,
            hidden1,
            hidden2,
            logits,
        })
    }
}

impl EmotionModel for FeedForward {
    fn feature_type(&self) -> FeatureType {
        self.feature_type
    }

    fn logits(&self, features: &FeatureTensor) -> Result<Array1<f32>> {
        let pooled = pool_features(features)?;
        let input = pooled.insert_axis(Axis(0));
        let logits = self.logits_batch(&input)?;
        Ok(logits.row(0).to_owned())
    }
}

impl TrainableModel for FeedForward {
    fn train_batch(
        &mut self,
        inputs: &Array2<f32>,
        labels: &[usize],
        class_weights: &[f32],
        optimizer: &mut Optimizer,
    ) -> Result<f32> {
        ensure!(
            inputs.nrows() == labels.len() && !labels.is_empty(),
            "batch has {} rows but {} labels",
            inputs.nrows(),
            labels.len()
        );
        let acts = self.forward(inputs)?;
        let (loss, grad_logits) = weighted_cross_entropy(&acts.logits, labels, class_weights)?;

        let grad_w3 = acts.hidden2.t().dot(&grad_logits);
        let grad_b3 = grad_logits.sum_axis(Axis(0));
        let grad_h2 = grad_logits.dot(&self.layers[2].weight.t()) * acts.hidden2.mapv(relu_grad);

        let grad_w2 = acts.hidden1.t().dot(&grad_h2);
        let grad_b2 = grad_h2.sum_axis(Axis(0));
        let grad_h1 = grad_h2.dot(&self.layers[1].weight.t()) * acts.hidden1.mapv(relu_grad);

        let grad_w1 = acts.input.t().dot(&grad_h1);
        let grad_b1 = grad_h1.sum_axis(Axis(0));

        optimizer.begin_step();
        let grads = [(grad_w1, grad_b1), (grad_w2, grad_b2), (grad_w3, grad_b3)];
        for (i, (layer, (grad_w, grad_b))) in self.layers.iter_mut().zip(grads.iter()).enumerate() {
            optimizer.update(2 * i, &mut layer.weight, grad_w);
            optimizer.update(2 * i + 1, &mut layer.bias, grad_b);
        }
        Ok(loss)
    }
}

/// Class-weighted mean cross-entropy and its gradient with respect to the
/// logits. The mean is normalized by the summed weights of the batch.
pub fn weighted_cross_entropy(
    logits: &Array2<f32>,
    labels: &[usize],
    class_weights: &[f32],
) -> Result<(f32, Array2<f32>)> {
    let mut grad = Array2::<f32>::zeros(logits.raw_dim());
    let mut total_loss = 0.0f32;
    let mut total_weight = 0.0f32;

    for (row, &label) in labels.iter().enumerate() {
        ensure!(label < logits.ncols(), "label index {} out of range", label);
        let weight = class_weights.get(label).copied().unwrap_or(1.0);
        let probs = softmax(&logits.row(row).to_owned());
        total_loss -= weight * probs[label].max(f32::MIN_POSITIVE).ln();
        total_weight += weight;
        let mut grad_row = grad.row_mut(row);
        grad_row.assign(&(probs * weight));
        grad_row[label] -= weight;
    }

    ensure!(total_weight > 0.0, "batch carries zero total class weight");
    grad /= total_weight;
    Ok((total_loss / total_weight, grad))
}

/// Numerically stable softmax.
pub fn softmax(logits: &Array1<f32>) -> Array1<f32> {
    let max = logits.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
    let exp = logits.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    exp / sum
}

/// Index of the largest value; the first one wins ties.
pub fn argmax<S: Data<Elem = f32>>(values: &ArrayBase<S, Ix1>) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

fn relu(x: f32) -> f32 {
    x.max(0.0)
}

fn relu_grad(activation: f32) -> f32 {
    if activation > 0.0 {
        1.0
    } else {
        0.0
    }
}
