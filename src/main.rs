use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ser_pipeline::audio::{decoder, encoder, AudioNormalizer};
use ser_pipeline::cli::{Cli, Command, FeaturesArgs, NormalizeArgs, ScanArgs, ServeArgs, TrainArgs};
use ser_pipeline::config::PipelineConfig;
use ser_pipeline::corpus::corpora_from_roots;
use ser_pipeline::features::FeatureExtractor;
use ser_pipeline::inference::InferenceService;
use ser_pipeline::server::run_server;
use ser_pipeline::training;
use ser_pipeline::types::Emotion;

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install log subscriber")?;

    let config = PipelineConfig::from_override(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Command::Scan(args) => scan(config, &args),
        Command::Normalize(args) => normalize(&config, &args),
        Command::Features(args) => features(&config, &args),
        Command::Train(args) => train(config, &args),
        Command::Serve(args) => serve(&args),
    }
}

fn scan(config: PipelineConfig, args: &ScanArgs) -> Result<()> {
    let config = args.corpora.apply(config)?;
    let corpora = corpora_from_roots(&config.corpora);
    if corpora.is_empty() {
        println!("No corpus configured; pass --ravdess, --cremad, --tess, --savee or --emotions");
        return Ok(());
    }

    let mut total = 0usize;
    for corpus in &corpora {
        let samples = corpus.scan();
        let mut counts = [0usize; Emotion::COUNT];
        for sample in &samples {
            counts[sample.label.index()] += 1;
        }
        println!("{}: {} samples", corpus.name(), samples.len());
        for emotion in Emotion::ALL {
            let count = counts[emotion.index()];
            if count > 0 {
                println!("  {:<10} {}", emotion.as_str(), count);
            }
        }
        total += samples.len();
    }
    println!("total: {} samples", total);
    Ok(())
}

fn normalize(config: &PipelineConfig, args: &NormalizeArgs) -> Result<()> {
    let normalizer = if args.loudness {
        AudioNormalizer::for_inference(&config.audio)
    } else {
        AudioNormalizer::for_training(&config.audio)
    };
    let audio = normalizer.normalize_path(&args.input)?;
    encoder::write_clip(&audio, &config.audio, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!(
        "Wrote {} samples at {} Hz to {}",
        audio.samples.len(),
        audio.sample_rate,
        args.output.display()
    );
    Ok(())
}

fn features(config: &PipelineConfig, args: &FeaturesArgs) -> Result<()> {
    let decoded = decoder::decode_audio(&args.input)?;
    println!(
        "Decoded {} channel(s), {} frames at {} Hz",
        decoded.channel_count(),
        decoded.frames(),
        decoded.sample_rate
    );
    let audio = AudioNormalizer::for_training(&config.audio)
        .normalize(decoded)
        .with_context(|| format!("Failed to normalize {}", args.input.display()))?;
    let extractor = FeatureExtractor::new(&config.spectral, config.audio.sample_rate);
    let tensor = extractor.extract(&audio.samples, args.feature_type);
    println!("{} shape: {:?}", args.feature_type, tensor.shape());
    Ok(())
}

fn train(config: PipelineConfig, args: &TrainArgs) -> Result<()> {
    let config = args.apply(config)?;
    let report = training::train(&config)?;
    println!(
        "Best weighted F1 {:.4} at epoch {} -> {}",
        report.best_f1,
        report.best_epoch,
        report.checkpoint.display()
    );
    if let Some(test) = &report.test {
        println!(
            "Test accuracy {:.4}, weighted F1 {:.4} over {} samples",
            test.accuracy, test.f1, test.support
        );
    }
    Ok(())
}

fn serve(args: &ServeArgs) -> Result<()> {
    let service = load_service(&args.model)?;
    info!(model = %args.model.display(), "model loaded");
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(run_server(args.addr, service))
}

fn load_service(path: &Path) -> Result<InferenceService> {
    InferenceService::load(path)
        .with_context(|| format!("Failed to load model artifact {}", path.display()))
}
