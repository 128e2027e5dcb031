use crate::types::DecodedAudio;
use anyhow::{ensure, Context, Result};
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decode an audio file to planar f32 channels at its native rate
pub fn decode_audio<P: AsRef<Path>>(path: P) -> Result<DecodedAudio> {
    let path = path.as_ref();

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    // Create hint from file extension
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    decode_source(Box::new(file), hint)
        .with_context(|| format!("Failed to decode audio file: {}", path.display()))
}

/// Decode an in-memory upload. The container is detected by probing.
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio> {
    ensure!(!bytes.is_empty(), "Audio payload is empty");
    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }
    decode_source(Box::new(Cursor::new(bytes)), hint)
}

fn decode_source(source: Box<dyn MediaSource>, hint: Hint) -> Result<DecodedAudio> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probe_result = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("Failed to probe audio format")?;

    let mut format = probe_result.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio tracks found in file")?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .context("Sample rate not specified in audio file")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create decoder")?;

    let mut channels: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                // End of stream
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(err) => return Err(err).context("Failed to read packet"),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => append_planar(decoded, &mut channels),
            // A damaged packet loses a few milliseconds, not the clip
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(err) => return Err(err).context("Failed to decode audio packet"),
        }
    }

    ensure!(
        channels.iter().any(|c| !c.is_empty()),
        "Audio stream contains no samples"
    );

    Ok(DecodedAudio {
        channels,
        sample_rate,
    })
}

/// Convert any sample format to f32 in [-1.0, 1.0] and split by channel
fn append_planar(decoded: AudioBufferRef, channels: &mut Vec<Vec<f32>>) {
    let spec = *decoded.spec();
    let channel_count = spec.channels.count().max(1);
    if channels.len() < channel_count {
        let frames = channels.first().map(Vec::len).unwrap_or(0);
        channels.resize(channel_count, vec![0.0; frames]);
    }

    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
    buffer.copy_interleaved_ref(decoded);

    for frame in buffer.samples().chunks(channel_count) {
        for (ch, &sample) in frame.iter().enumerate() {
            channels[ch].push(sample);
        }
    }
}
