//! Core types for the speech emotion recognition pipeline

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical emotion vocabulary shared by every corpus and every model.
///
/// The declaration order is the label-index order used for training targets
/// and for the logits of persisted models. Do not reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Calm,
    Disgust,
    Fearful,
    Happy,
    Neutral,
    Sad,
    Surprised,
}

impl Emotion {
    pub const COUNT: usize = 8;

    pub const ALL: [Emotion; Emotion::COUNT] = [
        Emotion::Angry,
        Emotion::Calm,
        Emotion::Disgust,
        Emotion::Fearful,
        Emotion::Happy,
        Emotion::Neutral,
        Emotion::Sad,
        Emotion::Surprised,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Calm => "calm",
            Emotion::Disgust => "disgust",
            Emotion::Fearful => "fearful",
            Emotion::Happy => "happy",
            Emotion::Neutral => "neutral",
            Emotion::Sad => "sad",
            Emotion::Surprised => "surprised",
        }
    }

    /// Position of this label in the canonical vocabulary.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Parse a canonical label, ignoring case and surrounding whitespace.
    pub fn from_label(label: &str) -> Option<Self> {
        let needle = label.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|e| e.as_str() == needle)
    }
}

impl Display for Emotion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::from_label(s).ok_or_else(|| format!("unknown emotion label '{}'", s))
    }
}

/// One labelled recording. The label is canonical by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub path: PathBuf,
    pub label: Emotion,
}

impl Sample {
    pub fn new(path: impl Into<PathBuf>, label: Emotion) -> Self {
        Self {
            path: path.into(),
            label,
        }
    }
}

/// Decoded audio before normalization: planar channels at the native rate.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// One sample vector per channel, values in [-1.0, 1.0]
    pub channels: Vec<Vec<f32>>,
    /// Native sample rate in Hz (e.g., 44100)
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            channels: vec![samples],
            sample_rate,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.channels.iter().map(Vec::len).min().unwrap_or(0)
    }
}

/// Mono, fixed-rate, fixed-length waveform ready for feature extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl NormalizedAudio {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
