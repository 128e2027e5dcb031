use ndarray::{Array, ArrayD, Dimension, IxDyn, Zip};

use super::OptimizerKind;

const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const EPSILON: f32 = 1e-8;

#[derive(Debug, Clone)]
struct Moments {
    first: ArrayD<f32>,
    second: ArrayD<f32>,
}

/// Adam with either coupled L2 weight decay (`Adam`) or decoupled decay
/// (`AdamW`). Parameters are addressed by a stable slot number so the
/// moment estimates survive across steps.
#[derive(Debug, Clone)]
pub struct Optimizer {
    kind: OptimizerKind,
    learning_rate: f32,
    weight_decay: f32,
    step: i32,
    moments: Vec<Option<Moments>>,
}

impl Optimizer {
    pub fn new(kind: OptimizerKind, learning_rate: f32, weight_decay: f32) -> Self {
        Self {
            kind,
            learning_rate,
            weight_decay,
            step: 0,
            moments: Vec::new(),
        }
    }

    pub fn kind(&self) -> OptimizerKind {
        self.kind
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }

    /// Advance the shared step counter; call once per batch before `update`.
    pub fn begin_step(&mut self) {
        self.step += 1;
    }

    pub fn update<D: Dimension>(
        &mut self,
        slot: usize,
        param: &mut Array<f32, D>,
        grad: &Array<f32, D>,
    ) {
        if self.moments.len() <= slot {
            self.moments.resize_with(slot + 1, || None);
        }
        let shape = IxDyn(param.shape());
        let state = self.moments[slot].get_or_insert_with(|| Moments {
            first: ArrayD::zeros(shape.clone()),
            second: ArrayD::zeros(shape),
        });

        let step = self.step.max(1);
        let bias1 = 1.0 - BETA1.powi(step);
        let bias2 = 1.0 - BETA2.powi(step);
        let lr = self.learning_rate;
        let decay = self.weight_decay;
        let decoupled = self.kind == OptimizerKind::AdamW;

        let mut param = param.view_mut().into_dyn();
        let grad = grad.view().into_dyn();
        Zip::from(&mut param)
            .and(&grad)
            .and(&mut state.first)
            .and(&mut state.second)
            .for_each(|p, &g, m, v| {
                let g = if decoupled { g } else { g + decay * *p };
                *m = BETA1 * *m + (1.0 - BETA1) * g;
                *v = BETA2 * *v + (1.0 - BETA2) * g * g;
                let m_hat = *m / bias1;
                let v_hat = *v / bias2;
                if decoupled {
                    *p -= lr * decay * *p;
                }
                *p -= lr * m_hat / (v_hat.sqrt() + EPSILON);
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn first_step_moves_by_learning_rate() {
        let mut optimizer = Optimizer::new(OptimizerKind::Adam, 0.1, 0.0);
        let mut param = array![1.0f32, -1.0];
        optimizer.begin_step();
        optimizer.update(0, &mut param, &array![0.5f32, -2.0]);
        assert_abs_diff_eq!(param[0], 0.9, epsilon = 1e-5);
        assert_abs_diff_eq!(param[1], -0.9, epsilon = 1e-5);
    }

    #[test]
    fn minimizes_a_quadratic() {
        let mut optimizer = Optimizer::new(OptimizerKind::AdamW, 0.05, 1e-4);
        let mut param = array![[3.0f32, -2.0]];
        for _ in 0..500 {
            let grad = param.mapv(|x| 2.0 * x);
            optimizer.begin_step();
            optimizer.update(0, &mut param, &grad);
        }
        assert!(param.iter().all(|x| x.abs() < 0.1));
    }

    #[test]
    fn decoupled_decay_shrinks_without_gradient() {
        let mut optimizer = Optimizer::new(OptimizerKind::AdamW, 0.1, 0.5);
        let mut param = array![2.0f32];
        optimizer.begin_step();
        optimizer.update(0, &mut param, &array![0.0f32]);
        assert_abs_diff_eq!(param[0], 1.9, epsilon = 1e-5);
    }
}
