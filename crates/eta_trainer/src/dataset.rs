//! Duration dataset loading
//!
//! Reads `prioridad,precio,duracion_sec` CSV exports. When no export exists
//! a fixed 9-row sample is used so the pipeline can run end to end.

use eta_core::{DurationRecord, Priority};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::TrainerError;

/// Sample rows as `(prioridad, precio, duracion_sec)`
const SAMPLE_ROWS: [(Priority, f64, f64); 9] = [
    (Priority::High, 200.0, 1800.0),
    (Priority::Medium, 400.0, 3200.0),
    (Priority::Low, 300.0, 3000.0),
    (Priority::High, 250.0, 2000.0),
    (Priority::Medium, 450.0, 3600.0),
    (Priority::Low, 350.0, 3400.0),
    (Priority::High, 280.0, 2200.0),
    (Priority::Medium, 420.0, 3300.0),
    (Priority::Low, 380.0, 3100.0),
];

#[derive(Debug, Deserialize)]
struct CsvRow {
    prioridad: String,
    precio: f64,
    duracion_sec: f64,
}

/// Where the records came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatasetSource {
    Csv(PathBuf),
    Sample,
}

impl fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetSource::Csv(path) => write!(f, "{}", path.display()),
            DatasetSource::Sample => f.write_str("built-in sample"),
        }
    }
}

/// Raw duration records in file order
#[derive(Clone, Debug)]
pub struct Dataset {
    pub records: Vec<DurationRecord>,
    pub source: DatasetSource,
}

impl Dataset {
    /// Load `path` if it exists, otherwise fall back to the built-in sample
    pub fn load_or_sample<P: AsRef<Path>>(path: P) -> Result<Self, TrainerError> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_csv(path)
        } else {
            tracing::info!(
                "No dataset at {}, using built-in sample",
                path.display()
            );
            Ok(Self::sample())
        }
    }

    /// Load a headered CSV with `prioridad`, `precio` and `duracion_sec`
    /// columns. Extra columns are ignored.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, TrainerError> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut records = Vec::new();
        for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
            let row = row?;
            if !row.precio.is_finite() || !row.duracion_sec.is_finite() {
                return Err(TrainerError::Dataset(format!(
                    "{}: non-finite value on data row {}",
                    path.display(),
                    line + 1
                )));
            }
            let priority = match row.prioridad.parse::<Priority>() {
                Ok(p) => p,
                Err(err) => {
                    tracing::warn!("{}, encoding as {}", err, Priority::Low);
                    Priority::from_label_lossy(&row.prioridad)
                }
            };
            records.push(DurationRecord::new(priority, row.precio, row.duracion_sec));
        }

        Ok(Self {
            records,
            source: DatasetSource::Csv(path.to_path_buf()),
        })
    }

    /// Fixed 9-row table covering all three priorities
    pub fn sample() -> Self {
        let records = SAMPLE_ROWS
            .iter()
            .map(|&(priority, price, duration)| DurationRecord::new(priority, price, duration))
            .collect();

        Self {
            records,
            source: DatasetSource::Sample,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record counts as `(ALTA, MEDIA, BAJA)`
    pub fn priority_counts(&self) -> (usize, usize, usize) {
        self.records
            .iter()
            .fold((0, 0, 0), |(h, m, l), r| match r.priority {
                Priority::High => (h + 1, m, l),
                Priority::Medium => (h, m + 1, l),
                Priority::Low => (h, m, l + 1),
            })
    }

    /// Minimum and maximum price, `None` when empty
    pub fn price_range(&self) -> Option<(f64, f64)> {
        self.records.iter().map(|r| r.price).fold(None, |acc, p| match acc {
            None => Some((p, p)),
            Some((lo, hi)) => Some((lo.min(p), hi.max(p))),
        })
    }
}
