//! Label harmonization: maps each corpus's native emotion tokens onto the
//! canonical [`Emotion`] vocabulary.

use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Emotion;

/// Supported source corpora.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusKind {
    Ravdess,
    CremaD,
    Tess,
    Savee,
    Emotions,
}

impl CorpusKind {
    pub const ALL: [CorpusKind; 5] = [
        CorpusKind::Ravdess,
        CorpusKind::CremaD,
        CorpusKind::Tess,
        CorpusKind::Savee,
        CorpusKind::Emotions,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CorpusKind::Ravdess => "ravdess",
            CorpusKind::CremaD => "cremad",
            CorpusKind::Tess => "tess",
            CorpusKind::Savee => "savee",
            CorpusKind::Emotions => "emotions",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match normalize_token(name).as_str() {
            "ravdess" => Some(CorpusKind::Ravdess),
            "cremad" | "crema-d" => Some(CorpusKind::CremaD),
            "tess" => Some(CorpusKind::Tess),
            "savee" => Some(CorpusKind::Savee),
            "emotions" => Some(CorpusKind::Emotions),
            _ => None,
        }
    }
}

impl Display for CorpusKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("numeric emotion code {0} is outside 1..=8")]
    UnknownNumericCode(u32),
    #[error("malformed filename '{name}': {reason}")]
    MalformedFilename { name: String, reason: String },
}

/// Ordered native-token table for one corpus. Tokens are stored lower-cased
/// and trimmed; lookups normalize the probe the same way.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    entries: Vec<(String, Emotion)>,
}

impl LabelMap {
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, Emotion)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(token, emotion)| (normalize_token(token), emotion))
                .collect(),
        }
    }

    /// Map whose tokens are the canonical label names themselves.
    pub fn identity() -> Self {
        Self::new(Emotion::ALL.iter().map(|e| (e.as_str(), *e)))
    }

    pub fn lookup(&self, token: &str) -> Option<Emotion> {
        let needle = normalize_token(token);
        self.entries
            .iter()
            .find(|(key, _)| *key == needle)
            .map(|(_, emotion)| *emotion)
    }

    /// First entry (in table order) whose token is a prefix of `token`.
    pub fn match_prefix(&self, token: &str) -> Option<Emotion> {
        let needle = normalize_token(token);
        if needle.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(key, _)| needle.starts_with(key.as_str()))
            .map(|(_, emotion)| *emotion)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Built-in table for a corpus.
    pub fn for_corpus(kind: CorpusKind) -> &'static LabelMap {
        static RAVDESS: OnceLock<LabelMap> = OnceLock::new();
        static CREMAD: OnceLock<LabelMap> = OnceLock::new();
        static TESS: OnceLock<LabelMap> = OnceLock::new();
        static SAVEE: OnceLock<LabelMap> = OnceLock::new();
        static EMOTIONS: OnceLock<LabelMap> = OnceLock::new();
        match kind {
            CorpusKind::Ravdess => RAVDESS.get_or_init(ravdess_map),
            CorpusKind::CremaD => CREMAD.get_or_init(cremad_map),
            CorpusKind::Tess => TESS.get_or_init(tess_map),
            CorpusKind::Savee => SAVEE.get_or_init(savee_map),
            CorpusKind::Emotions => EMOTIONS.get_or_init(LabelMap::identity),
        }
    }
}

/// Strict RAVDESS emotion code table. Any value outside 1..=8 means the
/// filename is corrupted.
pub fn numeric_code(code: u32) -> Result<Emotion, LabelError> {
    match code {
        1 => Ok(Emotion::Neutral),
        2 => Ok(Emotion::Calm),
        3 => Ok(Emotion::Happy),
        4 => Ok(Emotion::Sad),
        5 => Ok(Emotion::Angry),
        6 => Ok(Emotion::Fearful),
        7 => Ok(Emotion::Disgust),
        8 => Ok(Emotion::Surprised),
        other => Err(LabelError::UnknownNumericCode(other)),
    }
}

/// Map a corpus-native token to a canonical label. `None` means the sample
/// has no emotional equivalent and must be dropped.
pub fn canonicalize(corpus: CorpusKind, native_token: &str) -> Option<Emotion> {
    match corpus {
        CorpusKind::Ravdess => native_token
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(|code| numeric_code(code).ok()),
        CorpusKind::Savee => LabelMap::for_corpus(corpus).match_prefix(native_token),
        _ => LabelMap::for_corpus(corpus).lookup(native_token),
    }
}

pub(crate) fn normalize_token(token: &str) -> String {
    token.trim().to_lowercase()
}

fn ravdess_map() -> LabelMap {
    LabelMap::new((1..=8u32).filter_map(|code| {
        numeric_code(code)
            .ok()
            .map(|emotion| (RAVDESS_CODES[(code - 1) as usize], emotion))
    }))
}

const RAVDESS_CODES: [&str; 8] = ["01", "02", "03", "04", "05", "06", "07", "08"];

fn cremad_map() -> LabelMap {
    LabelMap::new([
        ("ANG", Emotion::Angry),
        ("DIS", Emotion::Disgust),
        ("FEA", Emotion::Fearful),
        ("HAP", Emotion::Happy),
        ("NEU", Emotion::Neutral),
        ("SAD", Emotion::Sad),
    ])
}

fn tess_map() -> LabelMap {
    LabelMap::new([
        ("angry", Emotion::Angry),
        ("disgust", Emotion::Disgust),
        ("fear", Emotion::Fearful),
        ("fearful", Emotion::Fearful),
        ("happy", Emotion::Happy),
        ("neutral", Emotion::Neutral),
        ("sad", Emotion::Sad),
        ("ps", Emotion::Surprised),
        ("pleasant_surprise", Emotion::Surprised),
        ("pleasant_surprised", Emotion::Surprised),
        ("surprise", Emotion::Surprised),
        ("surprised", Emotion::Surprised),
    ])
}

// Two-letter codes first: prefix matching is first-match-wins.
fn savee_map() -> LabelMap {
    LabelMap::new([
        ("sa", Emotion::Sad),
        ("su", Emotion::Surprised),
        ("a", Emotion::Angry),
        ("d", Emotion::Disgust),
        ("f", Emotion::Fearful),
        ("h", Emotion::Happy),
        ("n", Emotion::Neutral),
    ])
}
