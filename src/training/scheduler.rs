use super::SchedulerKind;

const PLATEAU_FACTOR: f32 = 0.1;
const PLATEAU_PATIENCE: usize = 3;
const PLATEAU_THRESHOLD: f32 = 1e-4;
const LINEAR_START_FACTOR: f32 = 1.0 / 3.0;
const LINEAR_TOTAL_EPOCHS: usize = 5;

/// Per-epoch learning-rate policy.
#[derive(Debug, Clone, PartialEq)]
pub enum LrScheduler {
    Constant,
    /// Multiply by `factor` once the epoch loss has failed to improve for
    /// more than `patience` epochs in a row.
    Plateau {
        factor: f32,
        patience: usize,
        best: f32,
        bad_epochs: usize,
    },
    /// Ramp from `start_factor * base` to `base` over `total` epochs.
    Linear {
        start_factor: f32,
        total: usize,
        epoch: usize,
    },
}

impl LrScheduler {
    pub fn new(kind: SchedulerKind) -> Self {
        match kind {
            SchedulerKind::None => LrScheduler::Constant,
            SchedulerKind::Plateau => LrScheduler::Plateau {
                factor: PLATEAU_FACTOR,
                patience: PLATEAU_PATIENCE,
                best: f32::INFINITY,
                bad_epochs: 0,
            },
            SchedulerKind::Linear => LrScheduler::Linear {
                start_factor: LINEAR_START_FACTOR,
                total: LINEAR_TOTAL_EPOCHS,
                epoch: 0,
            },
        }
    }

    /// Learning rate for the first epoch.
    pub fn initial_rate(&self, base: f32) -> f32 {
        match self {
            LrScheduler::Linear { start_factor, .. } => base * start_factor,
            _ => base,
        }
    }

    /// Learning rate for the next epoch, given the one just used and the
    /// finished epoch's mean loss.
    pub fn step(&mut self, base: f32, current: f32, epoch_loss: f32) -> f32 {
        match self {
            LrScheduler::Constant => current,
            LrScheduler::Plateau {
                factor,
                patience,
                best,
                bad_epochs,
            } => {
                if epoch_loss < *best * (1.0 - PLATEAU_THRESHOLD) {
                    *best = epoch_loss;
                    *bad_epochs = 0;
                    return current;
                }
                *bad_epochs += 1;
                if *bad_epochs > *patience {
                    *bad_epochs = 0;
                    current * *factor
                } else {
                    current
                }
            }
            LrScheduler::Linear {
                start_factor,
                total,
                epoch,
            } => {
                *epoch += 1;
                let progress = (*epoch).min(*total) as f32 / (*total).max(1) as f32;
                base * (*start_factor + (1.0 - *start_factor) * progress)
            }
        }
    }
}
