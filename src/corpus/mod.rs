//! Corpus loaders: scan a corpus directory tree into canonical samples.

pub mod rules;

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::CorpusRoots;
use crate::labels::{CorpusKind, LabelMap};
use crate::types::Sample;

pub use rules::{Layout, ParseRule};

/// A named, read-only corpus plus the rule that labels its files.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub kind: CorpusKind,
    pub root: PathBuf,
    pub rule: ParseRule,
}

impl Corpus {
    pub fn new(kind: CorpusKind, root: impl Into<PathBuf>, rule: ParseRule) -> Self {
        Self {
            kind,
            root: root.into(),
            rule,
        }
    }

    /// Corpus with the built-in naming convention for `kind`.
    pub fn preset(kind: CorpusKind, root: impl Into<PathBuf>) -> Self {
        let rule = match kind {
            CorpusKind::Ravdess => ParseRule::NumericCode { field: 2 },
            CorpusKind::CremaD => ParseRule::UnderscoreCode {
                field: 2,
                map: LabelMap::for_corpus(kind).clone(),
            },
            CorpusKind::Savee => ParseRule::LetterCode {
                codes: LabelMap::for_corpus(kind).clone(),
            },
            CorpusKind::Tess => ParseRule::FolderName {
                map: LabelMap::for_corpus(kind).clone(),
                strip_speaker_prefix: true,
            },
            CorpusKind::Emotions => ParseRule::FolderName {
                map: LabelMap::for_corpus(kind).clone(),
                strip_speaker_prefix: false,
            },
        };
        Self::new(kind, root, rule)
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Walk the corpus and label every readable `.wav` file.
    ///
    /// Unrecognized tokens and unreadable entries are skipped; corrupted
    /// numeric codes are logged at error level and skipped. An empty result
    /// is valid.
    pub fn scan(&self) -> Vec<Sample> {
        let mut samples = Vec::new();
        let mut unmapped = 0usize;
        let mut corrupted = 0usize;

        for path in self.audio_files() {
            match self.rule.parse(&path) {
                Ok(Some(label)) => samples.push(Sample::new(path, label)),
                Ok(None) => {
                    unmapped += 1;
                    debug!(
                        corpus = self.name(),
                        path = %path.display(),
                        "no canonical label; skipping"
                    );
                }
                Err(err) => {
                    corrupted += 1;
                    error!(
                        corpus = self.name(),
                        path = %path.display(),
                        error = %err,
                        "corrupted emotion code in filename; dropping file"
                    );
                }
            }
        }

        info!(
            corpus = self.name(),
            root = %self.root.display(),
            samples = samples.len(),
            unmapped,
            corrupted,
            "corpus scan complete"
        );
        samples
    }

    fn audio_files(&self) -> Vec<PathBuf> {
        let (min_depth, max_depth) = match self.rule.layout() {
            Layout::Recursive => (1, usize::MAX),
            Layout::Flat => (1, 1),
            Layout::Subfolders => (2, 2),
        };
        WalkDir::new(&self.root)
            .follow_links(true)
            .min_depth(min_depth)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(corpus = self.name(), error = %err, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_wav(entry.path()))
            .map(|entry| entry.into_path())
            .collect()
    }
}

/// Corpora with a configured root, in canonical aggregation order.
pub fn corpora_from_roots(roots: &CorpusRoots) -> Vec<Corpus> {
    [
        (CorpusKind::Ravdess, &roots.ravdess),
        (CorpusKind::CremaD, &roots.cremad),
        (CorpusKind::Tess, &roots.tess),
        (CorpusKind::Savee, &roots.savee),
        (CorpusKind::Emotions, &roots.emotions),
    ]
    .into_iter()
    .filter_map(|(kind, root)| root.as_ref().map(|r| Corpus::preset(kind, r)))
    .collect()
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}
