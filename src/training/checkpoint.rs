use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::FeedForward;
use crate::audio::LoudnessTarget;
use crate::config::{AudioConfig, SpectralConfig};
use crate::features::FeatureType;
use crate::types::Emotion;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact i/o failed for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("artifact {path:?} is not a valid model document: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("artifact label order {found:?} does not match the canonical order")]
    LabelOrder { found: Vec<String> },
}

/// Everything the server needs to reproduce the training-time pipeline:
/// weights, label order, feature type and the normalization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedArtifact {
    pub labels: Vec<Emotion>,
    pub feature_type: FeatureType,
    pub audio: AudioConfig,
    pub spectral: SpectralConfig,
    /// Loudness step applied at inference; `None` serves the training variant.
    pub loudness: Option<LoudnessTarget>,
    pub epoch: usize,
    pub validation_f1: f32,
    pub model: FeedForward,
}

impl TrainedArtifact {
    /// Write next to the destination and rename into place.
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let json = serde_json::to_vec_pretty(self).map_err(|source| ArtifactError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ArtifactError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let tmp = temp_path(path);
        fs::write(&tmp, json).map_err(|source| ArtifactError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: Self =
            serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Format {
                path: path.to_path_buf(),
                source,
            })?;
        artifact.verify_labels()?;
        Ok(artifact)
    }

    pub fn verify_labels(&self) -> Result<(), ArtifactError> {
        if self.labels.as_slice() == Emotion::ALL.as_slice() {
            Ok(())
        } else {
            Err(ArtifactError::LabelOrder {
                found: self.labels.iter().map(|l| l.to_string()).collect(),
            })
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn artifact() -> TrainedArtifact {
        TrainedArtifact {
            labels: Emotion::ALL.to_vec(),
            feature_type: FeatureType::Mfcc,
            audio: AudioConfig::default(),
            spectral: SpectralConfig::default(),
            loudness: None,
            epoch: 3,
            validation_f1: 0.5,
            model: FeedForward::new(FeatureType::Mfcc, 13, 8, 1).unwrap(),
        }
    }

    #[test]
    fn save_then_load_keeps_everything() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("best_model.json");
        let original = artifact();
        original.save(&path).unwrap();
        assert!(!dir.path().join("nested").join("best_model.json.tmp").exists());

        let loaded = TrainedArtifact::load(&path).unwrap();
        assert_eq!(loaded.labels, Emotion::ALL.to_vec());
        assert_eq!(loaded.epoch, 3);
        assert_eq!(loaded.model.input_dim(), 13);
    }

    #[test]
    fn load_rejects_reordered_labels() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut shuffled = artifact();
        shuffled.labels.swap(0, 1);
        shuffled.save(&path).unwrap();

        let err = TrainedArtifact::load(&path).unwrap_err();
        assert!(matches!(err, ArtifactError::LabelOrder { .. }));
    }

    #[test]
    fn load_reports_missing_and_garbage_files() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(
            TrainedArtifact::load(&missing),
            Err(ArtifactError::Io { .. })
        ));

        let garbage = dir.path().join("garbage.json");
        fs::write(&garbage, b"{ not json").unwrap();
        assert!(matches!(
            TrainedArtifact::load(&garbage),
            Err(ArtifactError::Format { .. })
        ));
    }
}
