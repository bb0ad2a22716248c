//! Feature binning for histogram-based tree growing
//!
//! Every feature column is mapped onto at most `max_bins` ordinal bins.
//! Bin `b` holds the values `x` with `threshold[b-1] < x <= threshold[b]`,
//! so a split "bin <= b" is the same decision as "x <= threshold[b]" on the
//! raw `f32` value.

use eta_core::FeatureMatrix;

/// Upper bound on bins per feature; bin indices are stored as `u8`
pub const MAX_BINS_LIMIT: usize = 255;

/// Per-feature bin thresholds fitted on a training matrix
#[derive(Clone, Debug, PartialEq)]
pub struct BinMapper {
    thresholds: Vec<Vec<f32>>,
}

impl BinMapper {
    /// Fit thresholds for every column of `features`.
    ///
    /// Columns with at most `max_bins` distinct values get one threshold
    /// between each pair of consecutive values. Wider columns use
    /// `max_bins - 1` midpoint quantiles.
    pub fn fit(features: &FeatureMatrix, max_bins: usize) -> Self {
        let max_bins = max_bins.clamp(2, MAX_BINS_LIMIT);
        let thresholds = (0..features.n_cols())
            .map(|col| {
                let values: Vec<f32> = features.column(col).collect();
                find_thresholds(&values, max_bins)
            })
            .collect();

        Self { thresholds }
    }

    pub fn n_features(&self) -> usize {
        self.thresholds.len()
    }

    pub fn n_bins(&self, feature: usize) -> usize {
        self.thresholds[feature].len() + 1
    }

    /// Raw-value threshold of the split that sends bins `0..=bin` left
    pub fn threshold(&self, feature: usize, bin: usize) -> f32 {
        self.thresholds[feature][bin]
    }

    pub fn bin_of(&self, feature: usize, value: f32) -> u8 {
        self.thresholds[feature].partition_point(|&t| t < value) as u8
    }

    /// Bin every value, stored column-major
    pub fn transform(&self, features: &FeatureMatrix) -> BinnedMatrix {
        let columns = (0..features.n_cols())
            .map(|col| features.column(col).map(|v| self.bin_of(col, v)).collect())
            .collect();

        BinnedMatrix {
            columns,
            n_rows: features.n_rows(),
        }
    }
}

/// Column-major bin indices
#[derive(Clone, Debug)]
pub struct BinnedMatrix {
    columns: Vec<Vec<u8>>,
    n_rows: usize,
}

impl BinnedMatrix {
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, feature: usize) -> &[u8] {
        &self.columns[feature]
    }

    pub fn get(&self, row: usize, feature: usize) -> u8 {
        self.columns[feature][row]
    }
}

fn find_thresholds(values: &[f32], max_bins: usize) -> Vec<f32> {
    let mut sorted: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut distinct = sorted.clone();
    // -0.0 and 0.0 compare equal and must share a bin
    distinct.dedup_by(|a, b| a == b);

    if distinct.len() <= max_bins {
        return distinct
            .windows(2)
            .map(|pair| midpoint(pair[0], pair[1]))
            .collect();
    }

    let mut thresholds: Vec<f32> = (1..max_bins)
        .map(|k| percentile_midpoint(&sorted, 100.0 * k as f64 / max_bins as f64))
        .collect();
    thresholds.dedup();
    thresholds
}

/// Midpoint of two consecutive distinct values, kept strictly below `hi`
fn midpoint(lo: f32, hi: f32) -> f32 {
    let mid = ((f64::from(lo) + f64::from(hi)) / 2.0) as f32;
    if mid >= hi {
        lo
    } else {
        mid
    }
}

/// Percentile using the mean of the two nearest ranks
fn percentile_midpoint(sorted: &[f32], q: f64) -> f32 {
    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = sorted[pos.floor() as usize];
    let hi = sorted[pos.ceil() as usize];
    ((f64::from(lo) + f64::from(hi)) / 2.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_column(values: &[f32]) -> FeatureMatrix {
        FeatureMatrix::from_flat(values.to_vec(), 1).unwrap()
    }

    #[test]
    fn test_few_distinct_values_use_midpoints() {
        let m = single_column(&[0.0, 1.0, 1.0, 0.0, 3.0]);
        let mapper = BinMapper::fit(&m, 255);

        assert_eq!(mapper.n_bins(0), 3);
        assert_eq!(mapper.threshold(0, 0), 0.5);
        assert_eq!(mapper.threshold(0, 1), 2.0);

        let binned = mapper.transform(&m);
        assert_eq!(binned.column(0), &[0, 1, 1, 0, 2]);
    }

    #[test]
    fn test_constant_column_has_single_bin() {
        let mapper = BinMapper::fit(&single_column(&[1.0, 1.0, 1.0]), 255);
        assert_eq!(mapper.n_bins(0), 1);
        assert_eq!(mapper.bin_of(0, 1.0), 0);
        assert_eq!(mapper.bin_of(0, 100.0), 0);
    }

    #[test]
    fn test_signed_zero_shares_a_bin() {
        let mapper = BinMapper::fit(&single_column(&[-0.0, 0.0, 1.0]), 255);
        assert_eq!(mapper.n_bins(0), 2);
        assert_eq!(mapper.bin_of(0, -0.0), mapper.bin_of(0, 0.0));
    }

    #[test]
    fn test_bins_agree_with_raw_threshold_comparison() {
        let values: Vec<f32> = (0..40).map(|i| (i as f32 * 0.37).sin() * 10.0).collect();
        let m = single_column(&values);
        let mapper = BinMapper::fit(&m, 255);

        for &v in &values {
            for b in 0..mapper.n_bins(0) - 1 {
                let left_by_bin = mapper.bin_of(0, v) as usize <= b;
                let left_by_value = v <= mapper.threshold(0, b);
                assert_eq!(left_by_bin, left_by_value, "value {} bin {}", v, b);
            }
        }
    }

    #[test]
    fn test_adjacent_floats_are_separated() {
        let lo = 1.0f32;
        let hi = f32::from_bits(lo.to_bits() + 1);
        let mapper = BinMapper::fit(&single_column(&[lo, hi]), 255);

        assert_eq!(mapper.n_bins(0), 2);
        assert_ne!(mapper.bin_of(0, lo), mapper.bin_of(0, hi));
    }

    #[test]
    fn test_many_distinct_values_are_quantized() {
        let values: Vec<f32> = (0..1000).map(|i| i as f32).collect();
        let mapper = BinMapper::fit(&single_column(&values), 16);

        assert_eq!(mapper.n_bins(0), 16);
        let binned = mapper.transform(&single_column(&values));
        assert_eq!(binned.get(0, 0), 0);
        assert_eq!(binned.get(999, 0), 15);
    }
}
