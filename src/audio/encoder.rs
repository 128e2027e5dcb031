use crate::config::AudioConfig;
use crate::types::NormalizedAudio;
use anyhow::{ensure, Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;

/// Write a normalized clip as 16-bit mono PCM at its own sample rate.
///
/// The clip must already have the pipeline's rate and fixed length; anything
/// else means it did not come out of [`AudioNormalizer`](super::AudioNormalizer).
pub fn write_clip<P: AsRef<Path>>(
    audio: &NormalizedAudio,
    config: &AudioConfig,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    ensure!(
        audio.sample_rate == config.sample_rate,
        "clip is at {} Hz, expected {} Hz",
        audio.sample_rate,
        config.sample_rate
    );
    ensure!(
        audio.samples.len() == config.clip_samples(),
        "clip has {} samples, expected {}",
        audio.samples.len(),
        config.clip_samples()
    );

    let spec = WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;
    for &sample in &audio.samples {
        writer
            .write_sample(to_pcm16(sample))
            .context("Failed to write audio sample")?;
    }
    writer.finalize().context("Failed to finalize WAV file")
}

fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}
