//! Load → build features → train → export
//!
//! Paths are resolved against a project root: the dataset is read from
//! `datasets/duraciones.csv` and artifacts land in `models/`. The default
//! root is the workspace holding this crate, whatever the working directory.

use chrono::{SecondsFormat, Utc};
use eta_core::serialization::write_canonical_json_file;
use eta_core::{build_training_set, mean_absolute_error, FeatureMeta, TrainingSet, TreeEnsemble};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::dataset::{Dataset, DatasetSource};
use crate::errors::TrainerError;
use crate::onnx::{export_onnx, write_onnx, ExportInfo};
use crate::trainer::{HistGbdtTrainer, TrainingParams};

pub const DATASET_PATH: &str = "datasets/duraciones.csv";
pub const MODELS_DIR: &str = "models";
pub const META_FILE: &str = "meta.json";
pub const ONNX_FILE: &str = "model-eta-v1.onnx";

/// Workspace root two levels above this crate's manifest
pub fn default_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .nth(2)
        .unwrap_or(manifest_dir)
        .to_path_buf()
}

/// Where to read from, where to write to, and how to train
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub dataset_path: PathBuf,
    pub output_dir: PathBuf,
    pub params: TrainingParams,
}

impl PipelineConfig {
    /// Fixed layout below a project root
    pub fn under_root<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            dataset_path: root.join(DATASET_PATH),
            output_dir: root.join(MODELS_DIR),
            params: TrainingParams::default(),
        }
    }

    pub fn meta_path(&self) -> PathBuf {
        self.output_dir.join(META_FILE)
    }

    pub fn onnx_path(&self) -> PathBuf {
        self.output_dir.join(ONNX_FILE)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::under_root(default_root())
    }
}

/// Output of the training half of the pipeline
#[derive(Debug)]
pub struct TrainedModel {
    pub source: DatasetSource,
    pub training_set: TrainingSet,
    pub model: TreeEnsemble,
    /// MAE measured on the training rows themselves
    pub train_mae: f64,
}

/// Paths and hashes of the written artifacts
#[derive(Debug, Clone)]
pub struct ExportedArtifacts {
    pub meta_path: PathBuf,
    pub onnx_path: PathBuf,
    pub onnx_bytes: usize,
    pub onnx_hash: String,
}

/// Load the dataset, build features and fit the ensemble
pub fn train(config: &PipelineConfig) -> Result<TrainedModel, TrainerError> {
    info!("Loading dataset from: {}", config.dataset_path.display());
    let dataset = Dataset::load_or_sample(&config.dataset_path)?;
    let (high, medium, low) = dataset.priority_counts();
    info!(
        "Loaded {} records from {} (ALTA={}, MEDIA={}, BAJA={})",
        dataset.len(),
        dataset.source,
        high,
        medium,
        low
    );
    if let Some((min, max)) = dataset.price_range() {
        info!("  precio: min={}, max={}", min, max);
    }

    let training_set = build_training_set(&dataset.records);
    if let Some(scale) = &training_set.meta.price_scale {
        info!("Price scale: mean={:.4}, std={:.4}", scale.mean, scale.std);
    }

    let params = &config.params;
    info!("Training configuration:");
    info!("  Loss: {}", params.loss.name());
    info!("  Iterations: {}", params.max_iter);
    info!("  Max depth: {:?}", params.max_depth);
    info!("  Learning rate: {}", params.learning_rate);
    info!("  Min samples per leaf: {}", params.min_samples_leaf);

    let trainer = HistGbdtTrainer::new(params.clone());
    let model = trainer.fit(&training_set.features, &training_set.targets)?;

    let predictions = model.predict(&training_set.features);
    let train_mae = mean_absolute_error(&training_set.targets, &predictions);

    info!("Training complete!");
    info!("  Baseline: {}", model.baseline);
    info!("  Trees: {} ({} leaves)", model.num_trees(), model.total_leaves());
    info!("  Model hash: {}", model.hash_hex()?);

    Ok(TrainedModel {
        source: dataset.source,
        training_set,
        model,
        train_mae,
    })
}

/// Write `meta.json` and the ONNX graph under the output directory.
///
/// Meta is written first; a failure writing the graph leaves it in place.
pub fn export(config: &PipelineConfig, trained: &TrainedModel) -> Result<ExportedArtifacts, TrainerError> {
    std::fs::create_dir_all(&config.output_dir)?;

    let meta_path = config.meta_path();
    info!("Saving meta to: {}", meta_path.display());
    write_meta(&meta_path, &trained.training_set.meta)?;

    let info = ExportInfo {
        loss: config.params.loss.name().to_string(),
        trained_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    };
    let proto = export_onnx(&trained.model, &trained.training_set.meta, &info)?;

    let onnx_path = config.onnx_path();
    info!("Saving ONNX model to: {}", onnx_path.display());
    let bytes = write_onnx(&onnx_path, &proto)?;
    let onnx_hash = hex::encode(blake3::hash(&bytes).as_bytes());

    Ok(ExportedArtifacts {
        meta_path,
        onnx_path,
        onnx_bytes: bytes.len(),
        onnx_hash,
    })
}

/// Run the whole pipeline
pub fn run(config: &PipelineConfig) -> Result<(TrainedModel, ExportedArtifacts), TrainerError> {
    let trained = train(config)?;
    let artifacts = export(config, &trained)?;
    Ok((trained, artifacts))
}

pub fn write_meta<P: AsRef<Path>>(path: P, meta: &FeatureMeta) -> Result<(), TrainerError> {
    write_canonical_json_file(path, meta)?;
    Ok(())
}

pub fn read_meta<P: AsRef<Path>>(path: P) -> Result<FeatureMeta, TrainerError> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
