use ndarray::{s, Array2, Axis};
use rand::Rng;

/// SpecAugment-style masking: one frequency band of up to
/// `freq_mask_param` rows and one time band of up to `time_mask_param`
/// columns are zeroed, each drawn independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecAugment {
    pub freq_mask_param: usize,
    pub time_mask_param: usize,
}

impl SpecAugment {
    pub fn new(freq_mask_param: usize, time_mask_param: usize) -> Self {
        Self {
            freq_mask_param,
            time_mask_param,
        }
    }

    /// Apply to a `(bins, frames)` matrix in place.
    pub fn apply<R: Rng + ?Sized>(&self, spec: &mut Array2<f32>, rng: &mut R) {
        mask_band(spec, Axis(0), self.freq_mask_param, rng);
        mask_band(spec, Axis(1), self.time_mask_param, rng);
    }
}

fn mask_band<R: Rng + ?Sized>(spec: &mut Array2<f32>, axis: Axis, max_width: usize, rng: &mut R) {
    let size = spec.len_of(axis);
    if size == 0 || max_width == 0 {
        return;
    }
    let width = rng.random_range(0..=max_width.min(size));
    let start = rng.random_range(0..=size - width);
    match axis {
        Axis(0) => spec.slice_mut(s![start..start + width, ..]).fill(0.0),
        _ => spec.slice_mut(s![.., start..start + width]).fill(0.0),
    }
}
