mod common;

use std::path::Path;

use common::{sine, wav_bytes, write_wav};
use ser_pipeline::config::PipelineConfig;
use ser_pipeline::dataset::DatasetError;
use ser_pipeline::inference::InferenceService;
use ser_pipeline::training::{self, OptimizerKind, SchedulerKind, TrainedArtifact};
use ser_pipeline::types::Emotion;
use tempfile::tempdir;

fn synthetic_corpus(root: &Path) {
    for i in 0..6 {
        let jitter = i as f32 * 15.0;
        write_wav(
            &root.join(format!("happy/h{}.wav", i)),
            &sine(1_200.0 + jitter, 16_000, 0.5, 0.4),
            16_000,
            1,
        );
        write_wav(
            &root.join(format!("sad/s{}.wav", i)),
            &sine(180.0 + jitter, 16_000, 0.5, 0.4),
            16_000,
            1,
        );
    }
}

fn small_config(root: &Path, checkpoint: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.audio.clip_seconds = 0.5;
    config.corpora.emotions = Some(root.to_path_buf());
    config.training.epochs = 4;
    config.training.batch_size = 4;
    config.training.val_fraction = 0.2;
    config.training.test_fraction = 0.2;
    config.training.hidden_dim = 16;
    config.training.checkpoint_path = checkpoint.to_path_buf();
    config
}

#[test]
fn trains_and_writes_a_loadable_artifact() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("emotions");
    let checkpoint = dir.path().join("out/best_model.json");
    synthetic_corpus(&root);

    let mut config = small_config(&root, &checkpoint);
    config.training.optimizer = OptimizerKind::AdamW;
    config.training.scheduler = SchedulerKind::Linear;
    config.training.class_weighted = true;

    let report = training::train(&config).unwrap();
    assert_eq!(report.epochs.len(), 4);
    assert!(checkpoint.exists());
    assert!(report.test.is_some());

    let best = report
        .epochs
        .iter()
        .map(|e| e.validation.f1)
        .fold(f32::NEG_INFINITY, f32::max);
    assert_eq!(report.best_f1, best);
    assert!(report.epochs[0].improved);
    assert!(report.epochs.iter().all(|e| e.loss.is_finite()));

    let artifact = TrainedArtifact::load(&checkpoint).unwrap();
    assert_eq!(artifact.labels, Emotion::ALL.to_vec());
    assert_eq!(artifact.epoch, report.best_epoch);
    assert!(artifact.loudness.is_some());

    let service = InferenceService::from_artifact(artifact);
    let clip = wav_bytes(&sine(1_200.0, 16_000, 0.5, 0.4), 16_000, 1);
    let prediction = service.predict(clip).unwrap();
    assert_eq!(prediction.probabilities.len(), Emotion::COUNT);
    let total: f32 = prediction.probabilities.values().sum();
    assert!((total - 1.0).abs() < 1e-4);
}

#[test]
fn same_seed_gives_same_training_run() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("emotions");
    synthetic_corpus(&root);

    let first = training::train(&small_config(&root, &dir.path().join("a.json"))).unwrap();
    let second = training::train(&small_config(&root, &dir.path().join("b.json"))).unwrap();
    let losses = |r: &training::TrainingReport| r.epochs.iter().map(|e| e.loss).collect::<Vec<_>>();
    assert_eq!(losses(&first), losses(&second));
    assert_eq!(first.artifact.model, second.artifact.model);
}

#[test]
fn empty_aggregate_aborts_before_training() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("emotions");
    std::fs::create_dir_all(root.join("boredom")).unwrap();
    let checkpoint = dir.path().join("best_model.json");

    let err = training::train(&small_config(&root, &checkpoint)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DatasetError>(),
        Some(DatasetError::Empty { .. })
    ));
    assert!(!checkpoint.exists());
}
