//! Feature construction for the duration model
//!
//! Turns raw `(priority, price, duration)` records into the fixed 7-column
//! `f32` matrix consumed by the trainer and by the exported graph, together
//! with the price normalization descriptor persisted in `meta.json`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Feature names in column order. `meta.json` and every feature row follow it.
pub const FEATURE_NAMES: [&str; 7] = [
    "bias",
    "prio_ALTA",
    "prio_MEDIA",
    "precio",
    "precio2",
    "prio_ALTA_x_precio",
    "prio_MEDIA_x_precio",
];

/// Number of model input columns
pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

/// Column layout of models trained before the polynomial expansion
pub const LEGACY_FEATURE_NAMES: [&str; 4] = ["bias", "prio_ALTA", "prio_MEDIA", "precio"];

/// Order priority. `Low` is the baseline category and has no indicator column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    #[serde(rename = "ALTA")]
    High,
    #[serde(rename = "MEDIA")]
    Medium,
    #[serde(rename = "BAJA")]
    Low,
}

impl Priority {
    /// Label used in datasets and metadata
    pub fn label(&self) -> &'static str {
        match self {
            Priority::High => "ALTA",
            Priority::Medium => "MEDIA",
            Priority::Low => "BAJA",
        }
    }

    /// Map a dataset label onto a priority.
    ///
    /// Labels match exactly. Anything that is neither ALTA nor MEDIA lands on
    /// the baseline, which is what an equality-based one-hot encoding
    /// produces for unknown labels.
    pub fn from_label_lossy(label: &str) -> Self {
        label.parse().unwrap_or(Priority::Low)
    }

    fn indicators(&self) -> (f64, f64) {
        match self {
            Priority::High => (1.0, 0.0),
            Priority::Medium => (0.0, 1.0),
            Priority::Low => (0.0, 0.0),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returned when a priority label is not one of ALTA, MEDIA or BAJA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPriority(pub String);

impl fmt::Display for UnknownPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown priority label '{}'", self.0)
    }
}

impl std::error::Error for UnknownPriority {}

impl FromStr for Priority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALTA" => Ok(Priority::High),
            "MEDIA" => Ok(Priority::Medium),
            "BAJA" => Ok(Priority::Low),
            _ => Err(UnknownPriority(s.to_string())),
        }
    }
}

/// One observed order with its measured duration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationRecord {
    pub priority: Priority,
    pub price: f64,
    pub duration_seconds: f64,
}

impl DurationRecord {
    pub fn new(priority: Priority, price: f64, duration_seconds: f64) -> Self {
        Self {
            priority,
            price,
            duration_seconds,
        }
    }
}

/// Z-score parameters for the price column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceScale {
    pub mean: f64,
    pub std: f64,
}

impl PriceScale {
    /// Fit mean and population standard deviation over `prices`.
    ///
    /// Constant columns, and any standard deviation of exactly zero, use
    /// 1.0 so every price normalizes to exactly 0 instead of NaN. An empty column yields
    /// `{mean: 0, std: 1}`.
    pub fn fit(prices: &[f64]) -> Self {
        if prices.is_empty() {
            return Self { mean: 0.0, std: 1.0 };
        }

        // A constant column gets its value back exactly; a summed mean can
        // drift by an ulp and leave a tiny non-zero spread
        let first = prices[0];
        if prices.iter().all(|&p| p == first) {
            return Self { mean: first, std: 1.0 };
        }

        let n = prices.len() as f64;
        let mean = prices.iter().sum::<f64>() / n;
        let variance = prices.iter().map(|p| (p - mean) * (p - mean)).sum::<f64>() / n;
        let std = variance.sqrt();

        Self {
            mean,
            std: if std == 0.0 { 1.0 } else { std },
        }
    }

    pub fn normalize(&self, price: f64) -> f64 {
        (price - self.mean) / self.std
    }
}

/// Sidecar descriptor written next to the exported model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMeta {
    /// Feature names in model input order
    pub names: Vec<String>,

    /// Price normalization, absent for models trained on raw prices
    #[serde(rename = "precioScale", default)]
    pub price_scale: Option<PriceScale>,
}

impl FeatureMeta {
    pub fn new(price_scale: PriceScale) -> Self {
        Self {
            names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            price_scale: Some(price_scale),
        }
    }

    /// Names to build inference rows with; falls back to the legacy layout
    pub fn effective_names(&self) -> Vec<&str> {
        if self.names.is_empty() {
            LEGACY_FEATURE_NAMES.to_vec()
        } else {
            self.names.iter().map(String::as_str).collect()
        }
    }
}

/// Dense row-major `f32` matrix with a fixed column count
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    data: Vec<f32>,
    n_cols: usize,
}

impl FeatureMatrix {
    pub fn with_capacity(n_rows: usize, n_cols: usize) -> Self {
        Self {
            data: Vec::with_capacity(n_rows * n_cols),
            n_cols,
        }
    }

    /// Build from a flat buffer; `None` if the length is not a multiple of `n_cols`
    pub fn from_flat(data: Vec<f32>, n_cols: usize) -> Option<Self> {
        if n_cols == 0 || data.len() % n_cols != 0 {
            return None;
        }
        Some(Self { data, n_cols })
    }

    /// Append one row. Panics if the row width differs from the matrix width.
    pub fn push_row(&mut self, row: &[f32]) {
        assert_eq!(row.len(), self.n_cols, "row width mismatch");
        self.data.extend_from_slice(row);
    }

    pub fn n_rows(&self) -> usize {
        self.data.len() / self.n_cols
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn row(&self, idx: usize) -> &[f32] {
        let start = idx * self.n_cols;
        &self.data[start..start + self.n_cols]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.n_cols)
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = f32> + '_ {
        self.data.iter().skip(col).step_by(self.n_cols).copied()
    }
}

/// Everything the trainer and exporter need from a dataset
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub features: FeatureMatrix,
    pub targets: Vec<f32>,
    pub meta: FeatureMeta,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Expand one record into the 7 model columns using a fitted scale
pub fn feature_row(priority: Priority, price: f64, scale: &PriceScale) -> [f32; FEATURE_COUNT] {
    let (is_high, is_medium) = priority.indicators();
    let norm = scale.normalize(price);

    [
        1.0,
        is_high as f32,
        is_medium as f32,
        norm as f32,
        (norm * norm) as f32,
        (is_high * norm) as f32,
        (is_medium * norm) as f32,
    ]
}

/// Build the training matrix, targets and metadata from raw records.
///
/// The price scale is fitted once over all records. Targets are the raw
/// durations cast to `f32`.
pub fn build_training_set(records: &[DurationRecord]) -> TrainingSet {
    let prices: Vec<f64> = records.iter().map(|r| r.price).collect();
    let scale = PriceScale::fit(&prices);

    let mut features = FeatureMatrix::with_capacity(records.len(), FEATURE_COUNT);
    let mut targets = Vec::with_capacity(records.len());

    for record in records {
        features.push_row(&feature_row(record.priority, record.price, &scale));
        targets.push(record.duration_seconds as f32);
    }

    tracing::debug!(
        rows = records.len(),
        mean = scale.mean,
        std = scale.std,
        "built feature matrix"
    );

    TrainingSet {
        features,
        targets,
        meta: FeatureMeta::new(scale),
    }
}

/// Build an inference row for a single order following `meta.names`.
///
/// Works for both the 7-column layout and the legacy 4-column one. Names the
/// builder does not know map to 0. A missing or non-finite price counts as 0,
/// and without a stored scale the raw price is used.
pub fn features_for_order(priority: Priority, price: Option<f64>, meta: &FeatureMeta) -> Vec<f32> {
    let price = price.filter(|p| p.is_finite()).unwrap_or(0.0);
    let (is_high, is_medium) = priority.indicators();
    let norm = match &meta.price_scale {
        Some(scale) => scale.normalize(price),
        None => price,
    };

    meta.effective_names()
        .into_iter()
        .map(|name| {
            let value = match name {
                "bias" => 1.0,
                "prio_ALTA" => is_high,
                "prio_MEDIA" => is_medium,
                "precio" => norm,
                "precio2" => norm * norm,
                "prio_ALTA_x_precio" => is_high * norm,
                "prio_MEDIA_x_precio" => is_medium * norm,
                _ => 0.0,
            };
            value as f32
        })
        .collect()
}
