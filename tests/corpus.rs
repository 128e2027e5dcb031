mod common;

use std::collections::BTreeMap;
use std::path::Path;

use common::touch;
use ser_pipeline::corpus::{corpora_from_roots, Corpus};
use ser_pipeline::labels::CorpusKind;
use ser_pipeline::types::{Emotion, Sample};
use tempfile::tempdir;

fn labels_by_file(samples: &[Sample]) -> BTreeMap<String, Emotion> {
    samples
        .iter()
        .map(|s| {
            let name = s.path.file_name().unwrap().to_string_lossy().into_owned();
            (name, s.label)
        })
        .collect()
}

fn populate(root: &Path, files: &[&str]) {
    for file in files {
        touch(&root.join(file));
    }
}

#[test]
fn ravdess_numeric_code_resolves_angry() {
    let dir = tempdir().unwrap();
    populate(
        dir.path(),
        &[
            "Actor_12/03-01-05-01-01-01-12.wav",
            "Actor_12/03-01-02-02-01-01-12.wav",
            "Actor_01/03-01-08-01-02-02-01.wav",
        ],
    );

    let samples = Corpus::preset(CorpusKind::Ravdess, dir.path()).scan();
    let labels = labels_by_file(&samples);
    assert_eq!(labels["03-01-05-01-01-01-12.wav"], Emotion::Angry);
    assert_eq!(labels["03-01-02-02-01-01-12.wav"], Emotion::Calm);
    assert_eq!(labels["03-01-08-01-02-02-01.wav"], Emotion::Surprised);
}

#[test]
fn ravdess_out_of_range_code_drops_only_that_file() {
    let dir = tempdir().unwrap();
    populate(
        dir.path(),
        &[
            "Actor_01/03-01-09-01-01-01-01.wav",
            "Actor_01/03-01-00-01-01-01-01.wav",
            "Actor_01/03-01-xx-01-01-01-01.wav",
            "Actor_01/03-01-04-01-01-01-01.wav",
        ],
    );

    let samples = Corpus::preset(CorpusKind::Ravdess, dir.path()).scan();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].label, Emotion::Sad);
}

#[test]
fn savee_letter_code_resolves_after_speaker_prefix() {
    let dir = tempdir().unwrap();
    populate(
        dir.path(),
        &["DC_a01.wav", "JE_sa03.wav", "JK_su12.wav", "KL_n05.wav", "KL_x01.wav"],
    );

    let labels = labels_by_file(&Corpus::preset(CorpusKind::Savee, dir.path()).scan());
    assert_eq!(labels["DC_a01.wav"], Emotion::Angry);
    assert_eq!(labels["JE_sa03.wav"], Emotion::Sad);
    assert_eq!(labels["JK_su12.wav"], Emotion::Surprised);
    assert_eq!(labels["KL_n05.wav"], Emotion::Neutral);
    assert!(!labels.contains_key("KL_x01.wav"));
}

#[test]
fn tess_folder_name_is_case_insensitive() {
    let dir = tempdir().unwrap();
    populate(
        dir.path(),
        &[
            "Happy/OAF_back_happy.wav",
            "HAPPY/YAF_dog_happy.wav",
            "OAF_Pleasant_surprise/OAF_bite_ps.wav",
            "YAF_fear/YAF_chain_fear.wav",
            "boredom/OAF_back_bored.wav",
        ],
    );

    let labels = labels_by_file(&Corpus::preset(CorpusKind::Tess, dir.path()).scan());
    assert_eq!(labels["OAF_back_happy.wav"], Emotion::Happy);
    assert_eq!(labels["YAF_dog_happy.wav"], Emotion::Happy);
    assert_eq!(labels["OAF_bite_ps.wav"], Emotion::Surprised);
    assert_eq!(labels["YAF_chain_fear.wav"], Emotion::Fearful);
    assert!(!labels.contains_key("OAF_back_bored.wav"));
}

#[test]
fn cremad_underscore_code_and_non_wav_files() {
    let dir = tempdir().unwrap();
    populate(
        dir.path(),
        &[
            "1001_DFA_ANG_XX.wav",
            "1001_DFA_HAP_XX.WAV",
            "1001_DFA_NEU_XX.mp3",
            "1001_DFA_BOR_XX.wav",
        ],
    );

    let labels = labels_by_file(&Corpus::preset(CorpusKind::CremaD, dir.path()).scan());
    assert_eq!(labels.len(), 2);
    assert_eq!(labels["1001_DFA_ANG_XX.wav"], Emotion::Angry);
    assert_eq!(labels["1001_DFA_HAP_XX.WAV"], Emotion::Happy);
}

#[test]
fn every_scanned_label_is_in_the_canonical_vocabulary() {
    let dir = tempdir().unwrap();
    let ravdess = dir.path().join("ravdess");
    let cremad = dir.path().join("cremad");
    let tess = dir.path().join("tess");
    let savee = dir.path().join("savee");
    let emotions = dir.path().join("emotions");
    for code in 0..=10 {
        touch(&ravdess.join(format!("Actor_01/03-01-{:02}-01-01-01-01.wav", code)));
    }
    for token in ["ANG", "DIS", "FEA", "HAP", "NEU", "SAD", "CAL", "SUR"] {
        touch(&cremad.join(format!("1002_IEO_{}_HI.wav", token)));
    }
    for folder in ["angry", "disgust", "fear", "happy", "neutral", "ps", "sad", "bored"] {
        touch(&tess.join(folder).join("OAF_word.wav"));
    }
    for code in ["a", "d", "f", "h", "n", "sa", "su", "z"] {
        touch(&savee.join(format!("DC_{}01.wav", code)));
    }
    for folder in Emotion::ALL.iter().map(|e| e.as_str()).chain(["contempt"]) {
        touch(&emotions.join(folder).join("clip.wav"));
    }

    let mut roots = ser_pipeline::config::CorpusRoots::default();
    roots.ravdess = Some(ravdess);
    roots.cremad = Some(cremad);
    roots.tess = Some(tess);
    roots.savee = Some(savee);
    roots.emotions = Some(emotions);

    let corpora = corpora_from_roots(&roots);
    assert_eq!(corpora.len(), 5);
    let mut total = 0;
    for corpus in &corpora {
        for sample in corpus.scan() {
            assert!(Emotion::ALL.contains(&sample.label));
            total += 1;
        }
    }
    // 8 valid RAVDESS codes, 6 CREMA-D, 7 TESS, 7 SAVEE, 8 emotion folders
    assert_eq!(total, 8 + 6 + 7 + 7 + 8);
}

#[test]
fn missing_corpus_root_yields_no_samples() {
    let dir = tempdir().unwrap();
    let corpus = Corpus::preset(CorpusKind::Tess, dir.path().join("absent"));
    assert!(corpus.scan().is_empty());
}
