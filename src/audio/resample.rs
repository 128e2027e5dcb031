use anyhow::{ensure, Context, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

const SINC_LEN: usize = 128;
const CUTOFF: f32 = 0.99;
const OVERSAMPLING: usize = 256;

/// Band-limited (windowed sinc) resampling of planar channels from
/// `source_rate` to `target_rate`.
///
/// Output length per channel is `ceil(frames * target_rate / source_rate)`.
/// Output frame `k` sits at input time `k / target_rate`, so events keep
/// their position in seconds.
pub fn sinc_resample(
    channels: &[Vec<f32>],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<Vec<f32>>> {
    ensure!(source_rate > 0, "source sample rate must be positive");
    ensure!(target_rate > 0, "target sample rate must be positive");
    let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
    if channels.is_empty() || frames == 0 || source_rate == target_rate {
        return Ok(channels.to_vec());
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let expected = resampled_len(frames, source_rate, target_rate);
    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: CUTOFF,
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: OVERSAMPLING,
        window: WindowFunction::Hann,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, frames, channels.len())
        .context("creating resampler")?;

    let input: Vec<&[f32]> = channels.iter().map(|c| &c[..frames]).collect();
    let mut output = resampler.process(&input, None).context("resampling")?;
    // Flush the filter tail until the last input frame has come out
    while output.first().map(Vec::len).unwrap_or(0) < expected {
        let tail = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .context("flushing resampler")?;
        if tail.first().map(Vec::is_empty).unwrap_or(true) {
            break;
        }
        for (channel, rest) in output.iter_mut().zip(tail) {
            channel.extend(rest);
        }
    }

    Ok(output
        .into_iter()
        .map(|mut channel| {
            channel.resize(expected, 0.0);
            channel
        })
        .collect())
}

pub fn resampled_len(frames: usize, source_rate: u32, target_rate: u32) -> usize {
    let numerator = frames as u64 * target_rate as u64;
    numerator.div_ceil(source_rate as u64) as usize
}
