use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::PipelineConfig;
use crate::features::FeatureType;
use crate::training::{OptimizerKind, SchedulerKind};

/// Speech emotion recognition: corpus scanning, training and serving.
#[derive(Parser, Debug)]
#[command(name = "ser", version, about = "Speech emotion recognition pipeline")]
pub struct Cli {
    /// Optional TOML configuration file; flags override its values.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan the configured corpora and print sample counts per label.
    Scan(ScanArgs),
    /// Normalize one audio file and write it as a 16-bit mono WAV.
    Normalize(NormalizeArgs),
    /// Print the feature shape produced for one audio file.
    Features(FeaturesArgs),
    /// Train the baseline model and write the best checkpoint.
    Train(TrainArgs),
    /// Serve predictions over HTTP from a trained artifact.
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct CorpusArgs {
    /// RAVDESS root (actor subfolders of numeric-coded files).
    #[arg(long, value_name = "DIR")]
    pub ravdess: Option<PathBuf>,
    /// CREMA-D root (flat folder of underscore-coded files).
    #[arg(long, value_name = "DIR")]
    pub cremad: Option<PathBuf>,
    /// TESS root (one subfolder per emotion).
    #[arg(long, value_name = "DIR")]
    pub tess: Option<PathBuf>,
    /// SAVEE root (flat folder of letter-coded files).
    #[arg(long, value_name = "DIR")]
    pub savee: Option<PathBuf>,
    /// Root with one subfolder per canonical emotion name.
    #[arg(long, value_name = "DIR")]
    pub emotions: Option<PathBuf>,
}

impl CorpusArgs {
    pub fn apply(&self, mut config: PipelineConfig) -> Result<PipelineConfig> {
        for (name, root) in [
            ("ravdess", &self.ravdess),
            ("cremad", &self.cremad),
            ("tess", &self.tess),
            ("savee", &self.savee),
            ("emotions", &self.emotions),
        ] {
            if let Some(root) = root {
                config = config.with_corpus_root(name, root.clone())?;
            }
        }
        Ok(config)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub corpora: CorpusArgs,
}

#[derive(Args, Debug, Clone)]
pub struct NormalizeArgs {
    /// Input audio file (any container the decoder supports).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,
    /// Output WAV path.
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,
    /// Apply the inference-time loudness step.
    #[arg(long)]
    pub loudness: bool,
}

#[derive(Args, Debug, Clone)]
pub struct FeaturesArgs {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,
    /// raw, mfcc or logmel.
    #[arg(long = "feature-type", default_value = "mfcc")]
    pub feature_type: FeatureType,
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    #[command(flatten)]
    pub corpora: CorpusArgs,
    #[arg(long)]
    pub epochs: Option<usize>,
    #[arg(long = "batch-size")]
    pub batch_size: Option<usize>,
    #[arg(long = "learning-rate")]
    pub learning_rate: Option<f32>,
    #[arg(long = "weight-decay")]
    pub weight_decay: Option<f32>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// adam or adamw.
    #[arg(long)]
    pub optimizer: Option<OptimizerKind>,
    /// none, plateau or linear.
    #[arg(long)]
    pub scheduler: Option<SchedulerKind>,
    /// mfcc or logmel.
    #[arg(long = "feature-type")]
    pub feature_type: Option<FeatureType>,
    /// Weight the loss by inverse class frequency.
    #[arg(long = "class-weighted")]
    pub class_weighted: bool,
    /// SpecAugment masking on log-mel training inputs.
    #[arg(long)]
    pub augment: bool,
    /// Where the best model is written.
    #[arg(long, value_name = "PATH")]
    pub checkpoint: Option<PathBuf>,
}

impl TrainArgs {
    pub fn apply(&self, config: PipelineConfig) -> Result<PipelineConfig> {
        let mut config = self.corpora.apply(config)?;
        let training = &mut config.training;
        if let Some(epochs) = self.epochs {
            training.epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            training.batch_size = batch_size;
        }
        if let Some(lr) = self.learning_rate {
            training.learning_rate = lr;
        }
        if let Some(wd) = self.weight_decay {
            training.weight_decay = wd;
        }
        if let Some(seed) = self.seed {
            training.seed = seed;
        }
        if let Some(optimizer) = self.optimizer {
            training.optimizer = optimizer;
        }
        if let Some(scheduler) = self.scheduler {
            training.scheduler = scheduler;
        }
        if let Some(feature_type) = self.feature_type {
            training.feature_type = feature_type;
        }
        training.class_weighted |= self.class_weighted;
        training.augment |= self.augment;
        if let Some(checkpoint) = &self.checkpoint {
            training.checkpoint_path = checkpoint.clone();
        }
        ensure!(
            training.feature_type != FeatureType::Raw,
            "training needs mfcc or logmel features"
        );
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Trained artifact to load.
    #[arg(long, value_name = "PATH", default_value = "best_model.json")]
    pub model: PathBuf,
    /// Listen address.
    #[arg(long, default_value = "0.0.0.0:8000")]
    pub addr: SocketAddr,
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use crate::config::PipelineConfig;
    use crate::features::FeatureType;
    use crate::training::{OptimizerKind, SchedulerKind};
    use clap::Parser;

    #[test]
    fn parses_train_overrides() {
        let cli = Cli::parse_from([
            "ser",
            "train",
            "--epochs",
            "3",
            "--optimizer",
            "adamw",
            "--scheduler",
            "plateau",
            "--feature-type",
            "logmel",
            "--class-weighted",
        ]);
        let Command::Train(args) = cli.command else {
            panic!("expected train command");
        };
        let config = args.apply(PipelineConfig::default()).unwrap();
        assert_eq!(config.training.epochs, 3);
        assert_eq!(config.training.optimizer, OptimizerKind::AdamW);
        assert_eq!(config.training.scheduler, SchedulerKind::Plateau);
        assert_eq!(config.training.feature_type, FeatureType::LogMel);
        assert!(config.training.class_weighted);
        assert_eq!(config.training.batch_size, 32);
    }

    #[test]
    fn training_on_raw_waveforms_is_rejected() {
        let cli = Cli::parse_from(["ser", "train", "--feature-type", "raw"]);
        let Command::Train(args) = cli.command else {
            panic!("expected train command");
        };
        assert!(args.apply(PipelineConfig::default()).is_err());
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::parse_from(["ser", "serve"]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve command");
        };
        assert_eq!(args.addr.port(), 8000);
        assert_eq!(args.model.to_str(), Some("best_model.json"));
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["ser", "scan", "--config", "ser.toml"]);
        assert_eq!(cli.config.as_deref().and_then(|p| p.to_str()), Some("ser.toml"));
    }

    #[test]
    fn missing_corpus_root_fails_to_apply() {
        let cli = Cli::parse_from(["ser", "scan", "--tess", "/definitely/not/here"]);
        let Command::Scan(args) = cli.command else {
            panic!("expected scan command");
        };
        assert!(args.corpora.apply(PipelineConfig::default()).is_err());
    }
}
