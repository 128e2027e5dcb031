use std::f32::consts::PI;

use ndarray::Array2;

/// Orthonormal DCT-II basis, shape `(n_mfcc, n_mels)`.
pub(crate) fn dct_matrix(n_mfcc: usize, n_mels: usize) -> Array2<f32> {
    let scale = (2.0 / n_mels as f32).sqrt();
    Array2::from_shape_fn((n_mfcc, n_mels), |(k, n)| {
        let basis = (PI / n_mels as f32 * (n as f32 + 0.5) * k as f32).cos() * scale;
        if k == 0 {
            basis / 2f32.sqrt()
        } else {
            basis
        }
    })
}
