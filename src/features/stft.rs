use std::f32::consts::PI;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use ndarray::Array2;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Short-time Fourier analysis without centering: frame `t` covers samples
/// `[t * hop, t * hop + n_fft)`.
pub(crate) struct Stft {
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl Debug for Stft {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stft")
            .field("n_fft", &self.n_fft)
            .field("hop", &self.hop)
            .finish()
    }
}

impl Stft {
    pub fn new(n_fft: usize, hop: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self {
            n_fft,
            hop,
            window: hann_window(n_fft),
            fft: planner.plan_fft_forward(n_fft),
        }
    }

    pub fn n_freqs(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn frame_count(&self, len: usize) -> usize {
        if len <= self.n_fft {
            1
        } else {
            (len - self.n_fft) / self.hop + 1
        }
    }

    /// Power spectrogram `|X|^2`, shape `(n_freqs, frames)`.
    pub fn power(&self, samples: &[f32]) -> Array2<f32> {
        let frames = self.frame_count(samples.len());
        let n_freqs = self.n_freqs();
        let mut spectrogram = Array2::zeros((n_freqs, frames));
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.n_fft];

        for t in 0..frames {
            let start = t * self.hop;
            for (i, slot) in buffer.iter_mut().enumerate() {
                let sample = samples.get(start + i).copied().unwrap_or(0.0);
                *slot = Complex::new(sample * self.window[i], 0.0);
            }
            self.fft.process(&mut buffer);
            for (k, bin) in buffer.iter().take(n_freqs).enumerate() {
                spectrogram[[k, t]] = bin.norm_sqr();
            }
        }
        spectrogram
    }
}

/// Periodic Hann window.
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f32 / size as f32).cos())
        .collect()
}
