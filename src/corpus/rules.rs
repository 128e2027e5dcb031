use std::path::Path;

use crate::labels::{numeric_code, LabelError, LabelMap};
use crate::types::Emotion;

/// How a corpus encodes the emotion of each recording.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseRule {
    /// Integer code at `field` of the hyphen-delimited file stem, mapped
    /// through the strict 1..=8 table.
    NumericCode { field: usize },
    /// Token at `field` of the underscore-delimited file stem.
    UnderscoreCode { field: usize, map: LabelMap },
    /// Leading alphabetic run of the stem (after an optional `speaker_`
    /// prefix), matched by prefix against an ordered code table.
    LetterCode { codes: LabelMap },
    /// Name of the immediate parent folder.
    FolderName {
        map: LabelMap,
        strip_speaker_prefix: bool,
    },
}

/// Where a rule expects audio files relative to the corpus root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Any depth below the root.
    Recursive,
    /// Directly inside the root.
    Flat,
    /// Exactly one folder level below the root.
    Subfolders,
}

impl ParseRule {
    pub fn layout(&self) -> Layout {
        match self {
            ParseRule::NumericCode { .. } => Layout::Recursive,
            ParseRule::UnderscoreCode { .. } | ParseRule::LetterCode { .. } => Layout::Flat,
            ParseRule::FolderName { .. } => Layout::Subfolders,
        }
    }

    /// Resolve the label of one audio file.
    ///
    /// `Ok(None)` marks a file whose token has no canonical equivalent; the
    /// caller drops it quietly. `Err` marks a corrupted filename.
    pub fn parse(&self, path: &Path) -> Result<Option<Emotion>, LabelError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        match self {
            ParseRule::NumericCode { field } => parse_numeric(stem, *field).map(Some),
            ParseRule::UnderscoreCode { field, map } => {
                Ok(stem.split('_').nth(*field).and_then(|token| map.lookup(token)))
            }
            ParseRule::LetterCode { codes } => Ok(codes.match_prefix(letter_code(stem))),
            ParseRule::FolderName {
                map,
                strip_speaker_prefix,
            } => {
                let folder = path
                    .parent()
                    .and_then(|p| p.file_name())
                    .and_then(|s| s.to_str())
                    .unwrap_or_default();
                Ok(map.lookup(folder).or_else(|| {
                    if *strip_speaker_prefix {
                        folder
                            .split_once('_')
                            .and_then(|(_, rest)| map.lookup(rest))
                    } else {
                        None
                    }
                }))
            }
        }
    }
}

fn parse_numeric(stem: &str, field: usize) -> Result<Emotion, LabelError> {
    let token = stem
        .split('-')
        .nth(field)
        .ok_or_else(|| LabelError::MalformedFilename {
            name: stem.to_string(),
            reason: format!("missing hyphen-delimited field {}", field + 1),
        })?;
    let code = token
        .trim()
        .parse::<u32>()
        .map_err(|_| LabelError::MalformedFilename {
            name: stem.to_string(),
            reason: format!("'{}' is not a numeric emotion code", token),
        })?;
    numeric_code(code)
}

/// `DC_a01` -> `a`, `sa03` -> `sa`.
fn letter_code(stem: &str) -> &str {
    let code = stem.split_once('_').map(|(_, rest)| rest).unwrap_or(stem);
    let end = code
        .char_indices()
        .find(|(_, c)| !c.is_alphabetic())
        .map(|(idx, _)| idx)
        .unwrap_or(code.len());
    &code[..end]
}
