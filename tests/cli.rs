mod common;

use assert_cmd::Command;
use common::{sine, touch, write_wav};
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn scan_prints_counts_per_corpus_and_label() {
    let dir = tempdir().unwrap();
    let savee = dir.path().join("savee");
    for name in ["DC_a01.wav", "DC_a02.wav", "JE_sa01.wav", "JE_q01.wav"] {
        touch(&savee.join(name));
    }

    Command::cargo_bin("ser")
        .unwrap()
        .args(["scan", "--savee"])
        .arg(&savee)
        .assert()
        .success()
        .stdout(predicate::str::contains("savee: 3 samples"))
        .stdout(predicate::str::contains("angry"))
        .stdout(predicate::str::contains("total: 3 samples"));
}

#[test]
fn normalize_writes_a_fixed_length_wav() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.wav");
    let output = dir.path().join("out.wav");
    write_wav(&input, &sine(440.0, 44_100, 1.0, 0.3), 44_100, 2);

    Command::cargo_bin("ser")
        .unwrap()
        .arg("normalize")
        .arg(&input)
        .arg(&output)
        .assert()
        .success();

    let reader = hound::WavReader::open(&output).unwrap();
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().sample_rate, 16_000);
    assert_eq!(reader.duration(), 64_000);
}

#[test]
fn features_reports_shape() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.wav");
    write_wav(&input, &sine(440.0, 16_000, 2.0, 0.3), 16_000, 1);

    Command::cargo_bin("ser")
        .unwrap()
        .args(["features", "--feature-type", "logmel"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("logmel shape: [40, 397]"));
}

#[test]
fn serve_fails_fast_without_a_model() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("ser")
        .unwrap()
        .args(["serve", "--model"])
        .arg(dir.path().join("missing.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load model artifact"));
}

#[test]
fn unknown_feature_type_is_rejected() {
    Command::cargo_bin("ser")
        .unwrap()
        .args(["features", "--feature-type", "cqt", "x.wav"])
        .assert()
        .failure();
}
