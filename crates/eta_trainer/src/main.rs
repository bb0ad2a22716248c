//! ETA duration model trainer CLI
//!
//! With no arguments, trains on `datasets/duraciones.csv` (or the built-in
//! sample) and writes `models/meta.json` and `models/model-eta-v1.onnx`.

use anyhow::{Context, Result};
use clap::Parser;
use eta_trainer::{pipeline, Loss, PipelineConfig, TrainingParams};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "eta-train")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train the order duration model and export it to ONNX", long_about = None)]
struct Args {
    /// Project root holding `datasets/` and `models/` (default: the
    /// workspace this binary was built from)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Dataset CSV (default: <root>/datasets/duraciones.csv)
    #[arg(short, long)]
    dataset: Option<PathBuf>,

    /// Output directory (default: <root>/models)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of boosting iterations
    #[arg(long, default_value = "400")]
    max_iter: usize,

    /// Maximum tree depth
    #[arg(long, default_value = "6")]
    max_depth: usize,

    /// Shrinkage applied to every tree
    #[arg(long, default_value = "0.12")]
    learning_rate: f64,

    /// Minimum samples per leaf
    #[arg(long, default_value = "20")]
    min_samples_leaf: usize,

    /// Loss function
    #[arg(long, value_enum, default_value = "absolute-error")]
    loss: Loss,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        let root = self.root.clone().unwrap_or_else(pipeline::default_root);
        let mut config = PipelineConfig::under_root(root);
        if let Some(dataset) = &self.dataset {
            config.dataset_path = dataset.clone();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        config.params = TrainingParams {
            loss: self.loss,
            max_iter: self.max_iter,
            learning_rate: self.learning_rate,
            max_depth: Some(self.max_depth),
            min_samples_leaf: self.min_samples_leaf,
            ..TrainingParams::default()
        };
        config
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("ETA duration trainer v{}", eta_trainer::VERSION);
    info!("═══════════════════════════════════════════");

    let config = args.pipeline_config();

    let trained = pipeline::train(&config).context("Training failed")?;
    println!("MAE (train): {:.2} sec", trained.train_mae);

    let artifacts = pipeline::export(&config, &trained).context("Export failed")?;
    println!("✅ Meta saved to: {}", artifacts.meta_path.display());
    println!("✅ ONNX saved to: {}", artifacts.onnx_path.display());

    info!("═══════════════════════════════════════════");
    info!("✓ Training completed successfully");
    info!("  ONNX: {} bytes, blake3 {}", artifacts.onnx_bytes, artifacts.onnx_hash);

    Ok(())
}
