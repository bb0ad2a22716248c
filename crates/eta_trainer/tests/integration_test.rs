//! End-to-end tests for the training pipeline
//!
//! Every test runs against a temporary project root.

use anyhow::Result;
use eta_core::{features_for_order, Priority, FEATURE_NAMES};
use eta_trainer::onnx::{self, TreeEnsembleAttributes};
use eta_trainer::pipeline::{self, read_meta, PipelineConfig};
use eta_trainer::{DatasetSource, TrainingParams};
use std::io::Write;
use std::path::Path;

fn write_dataset(root: &Path, lines: &[&str]) -> Result<()> {
    let dir = root.join("datasets");
    std::fs::create_dir_all(&dir)?;
    let mut file = std::fs::File::create(dir.join("duraciones.csv"))?;
    for line in lines {
        writeln!(file, "{}", line)?;
    }
    Ok(())
}

#[test]
fn test_sample_run_writes_both_artifacts() -> Result<()> {
    let root = tempfile::tempdir()?;
    let config = PipelineConfig::under_root(root.path());

    let (trained, artifacts) = pipeline::run(&config)?;

    assert_eq!(trained.source, DatasetSource::Sample);
    assert_eq!(trained.train_mae, 500.0);
    assert!(artifacts.meta_path.exists());
    assert!(artifacts.onnx_path.exists());
    assert_eq!(artifacts.onnx_hash.len(), 64);

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&artifacts.meta_path)?)?;
    let names = raw["names"].as_array().expect("names array");
    assert_eq!(names.len(), 7);
    for (name, expected) in names.iter().zip(FEATURE_NAMES) {
        assert_eq!(name.as_str(), Some(expected));
    }
    assert!(raw["precioScale"]["mean"].is_f64());
    assert!(raw["precioScale"]["std"].is_f64());

    let proto = onnx::read_onnx(&artifacts.onnx_path)?;
    let graph = proto.graph.as_ref().expect("graph");
    assert_eq!(graph.input.len(), 1);
    assert_eq!(graph.input[0].name, "input");
    assert_eq!(onnx::value_dims(&graph.input[0]), vec![None, Some(7)]);
    assert_eq!(proto.opset_import[0].version, 12);

    Ok(())
}

#[test]
fn test_meta_scale_matches_sample_statistics() -> Result<()> {
    let root = tempfile::tempdir()?;
    let config = PipelineConfig::under_root(root.path());
    let (_, artifacts) = pipeline::run(&config)?;

    let meta = read_meta(&artifacts.meta_path)?;
    let scale = meta.price_scale.expect("scale");

    let prices = [200.0, 400.0, 300.0, 250.0, 450.0, 350.0, 280.0, 420.0, 380.0];
    let mean: f64 = prices.iter().sum::<f64>() / 9.0;
    let std = (prices.iter().map(|p: &f64| (p - mean).powi(2)).sum::<f64>() / 9.0).sqrt();

    assert!((scale.mean - mean).abs() < 1e-9);
    assert!((scale.std - std).abs() < 1e-9);
    assert_ne!(scale.std, 1.0);
    Ok(())
}

#[test]
fn test_meta_reproduces_training_rows() -> Result<()> {
    let root = tempfile::tempdir()?;
    let config = PipelineConfig::under_root(root.path());
    let (trained, artifacts) = pipeline::run(&config)?;

    let meta = read_meta(&artifacts.meta_path)?;
    let sample = eta_trainer::Dataset::sample();
    for (i, record) in sample.records.iter().enumerate() {
        let row = features_for_order(record.priority, Some(record.price), &meta);
        assert_eq!(row.as_slice(), trained.training_set.features.row(i));
    }
    Ok(())
}

#[test]
fn test_csv_dataset_is_used_when_present() -> Result<()> {
    let root = tempfile::tempdir()?;
    write_dataset(
        root.path(),
        &[
            "prioridad,precio,duracion_sec",
            "ALTA,100,600",
            "MEDIA,200,1200",
            "BAJA,300,1800",
            "ALTA,150,900",
        ],
    )?;

    let mut config = PipelineConfig::under_root(root.path());
    config.params = TrainingParams {
        max_iter: 10,
        ..TrainingParams::default()
    };
    let (trained, _) = pipeline::run(&config)?;

    assert!(matches!(trained.source, DatasetSource::Csv(_)));
    assert_eq!(trained.training_set.len(), 4);
    assert_eq!(trained.model.num_trees(), 10);
    // Even count: median of 600, 900, 1200, 1800
    assert_eq!(trained.model.baseline, 1050.0);
    Ok(())
}

#[test]
fn test_constant_prices_use_unit_std() -> Result<()> {
    let root = tempfile::tempdir()?;
    write_dataset(
        root.path(),
        &[
            "prioridad,precio,duracion_sec",
            "ALTA,250,600",
            "MEDIA,250,1200",
            "BAJA,250,1800",
        ],
    )?;

    let config = PipelineConfig::under_root(root.path());
    let (trained, artifacts) = pipeline::run(&config)?;

    let meta = read_meta(&artifacts.meta_path)?;
    assert_eq!(meta.price_scale.map(|s| s.std), Some(1.0));
    assert!(trained.training_set.features.column(3).all(|v| v == 0.0));
    Ok(())
}

#[test]
fn test_malformed_csv_aborts_before_writing() -> Result<()> {
    let root = tempfile::tempdir()?;
    write_dataset(root.path(), &["prioridad,precio,duracion_sec", "ALTA,abc,600"])?;

    let config = PipelineConfig::under_root(root.path());
    assert!(pipeline::run(&config).is_err());
    assert!(!config.meta_path().exists());
    assert!(!config.onnx_path().exists());
    Ok(())
}

#[test]
fn test_empty_csv_is_rejected() -> Result<()> {
    let root = tempfile::tempdir()?;
    write_dataset(root.path(), &["prioridad,precio,duracion_sec"])?;

    let config = PipelineConfig::under_root(root.path());
    let err = pipeline::run(&config).unwrap_err();
    assert!(matches!(err, eta_trainer::TrainerError::EmptyDataset));
    Ok(())
}

#[test]
fn test_exported_graph_matches_native_predictions() -> Result<()> {
    let root = tempfile::tempdir()?;
    let mut config = PipelineConfig::under_root(root.path());
    config.params = TrainingParams {
        min_samples_leaf: 1,
        max_iter: 50,
        ..TrainingParams::default()
    };
    let (trained, artifacts) = pipeline::run(&config)?;
    assert!(trained.model.trees.iter().any(|t| t.nodes.len() > 1));

    let proto = onnx::read_onnx(&artifacts.onnx_path)?;
    let graph = proto.graph.expect("graph");
    let ensemble = &graph.node[0];
    assert_eq!(ensemble.op_type, "TreeEnsembleRegressor");

    let attrs = TreeEnsembleAttributes::from_model(&trained.model);
    let node_count = ensemble
        .attribute
        .iter()
        .find(|a| a.name == "nodes_nodeids")
        .map(|a| a.ints.len());
    assert_eq!(node_count, Some(attrs.nodes_nodeids.len()));

    for row in trained.training_set.features.rows() {
        let native = trained.model.predict_row(row);
        let graph_value = attrs.evaluate(row);
        assert!(
            (f64::from(graph_value) - native).abs() < 0.05,
            "graph {} native {}",
            graph_value,
            native
        );
    }

    // ALTA orders are the fast ones in the sample
    let sample = eta_trainer::Dataset::sample();
    let mean_prediction = |priority: Priority| {
        let preds: Vec<f64> = sample
            .records
            .iter()
            .zip(trained.training_set.features.rows())
            .filter(|(r, _)| r.priority == priority)
            .map(|(_, row)| trained.model.predict_row(row))
            .collect();
        preds.iter().sum::<f64>() / preds.len() as f64
    };
    assert!(mean_prediction(Priority::High) < mean_prediction(Priority::Low));
    Ok(())
}
