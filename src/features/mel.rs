use ndarray::Array2;

const DB_AMIN: f32 = 1e-10;

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular HTK mel filterbank, shape `(n_mels, n_freqs)`, spanning
/// `0..sample_rate / 2` without area normalization.
pub(crate) fn mel_filterbank(n_mels: usize, n_fft: usize, sample_rate: u32) -> Array2<f32> {
    let n_freqs = n_fft / 2 + 1;
    let nyquist = (sample_rate / 2) as f32;
    let bin_freqs: Vec<f32> = (0..n_freqs)
        .map(|k| nyquist * k as f32 / (n_freqs - 1).max(1) as f32)
        .collect();

    let mel_max = hz_to_mel(nyquist);
    let edges: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f32 / (n_mels + 1) as f32))
        .collect();

    let mut bank = Array2::zeros((n_mels, n_freqs));
    for m in 0..n_mels {
        let (lower, center, upper) = (edges[m], edges[m + 1], edges[m + 2]);
        for (k, &freq) in bin_freqs.iter().enumerate() {
            let rising = (freq - lower) / (center - lower);
            let falling = (upper - freq) / (upper - center);
            bank[[m, k]] = rising.min(falling).max(0.0);
        }
    }
    bank
}

/// `10 * log10(max(x, 1e-10))` applied element-wise.
pub(crate) fn power_to_db(power: &Array2<f32>) -> Array2<f32> {
    power.mapv(|v| 10.0 * v.max(DB_AMIN).log10())
}

/// Clamp a dB matrix to at most `top_db` below its peak.
pub(crate) fn clamp_dynamic_range(db: &mut Array2<f32>, top_db: f32) {
    let peak = db.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if peak.is_finite() {
        let floor = peak - top_db;
        db.mapv_inplace(|v| v.max(floor));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mel_scale_round_trips() {
        for hz in [0.0, 440.0, 1_000.0, 8_000.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 0.05);
        }
    }

    #[test]
    fn filterbank_triangles_peak_below_one() {
        let bank = mel_filterbank(40, 512, 16_000);
        assert_eq!(bank.dim(), (40, 257));
        for row in bank.rows() {
            let peak = row.iter().copied().fold(0.0f32, f32::max);
            assert!(peak > 0.0 && peak <= 1.0 + 1e-6);
        }
        assert!(bank.iter().all(|&w| w >= 0.0));
    }

    #[test]
    fn db_conversion_floors_zero() {
        let db = power_to_db(&Array2::from_elem((1, 2), 0.0));
        assert!(db.iter().all(|&v| (v + 100.0).abs() < 1e-4));
    }

    #[test]
    fn dynamic_range_is_clamped() {
        let mut db = Array2::from_shape_vec((1, 3), vec![0.0, -50.0, -120.0]).unwrap();
        clamp_dynamic_range(&mut db, 80.0);
        assert_eq!(db.row(0).to_vec(), vec![0.0, -50.0, -80.0]);
    }
}
