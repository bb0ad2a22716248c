//! Histogram tree grower
//!
//! Grows one regression tree best-first: the open leaf with the largest
//! split gain is always split next, until no leaf can be split, the depth
//! limit is hit, or the leaf budget is exhausted. Split search scans per-bin
//! gradient/hessian histograms built from the binned matrix.

use crate::binning::{BinMapper, BinnedMatrix};

/// Structural limits for a single tree
#[derive(Clone, Debug)]
pub struct GrowerParams {
    /// Nodes at this depth (root = 0) become leaves
    pub max_depth: Option<usize>,
    pub max_leaf_nodes: Option<usize>,
    pub min_samples_leaf: usize,
    pub l2_regularization: f64,
    pub min_gain_to_split: f64,
    pub min_hessian_to_split: f64,
}

impl Default for GrowerParams {
    fn default() -> Self {
        Self {
            max_depth: Some(6),
            max_leaf_nodes: Some(31),
            min_samples_leaf: 20,
            l2_regularization: 0.0,
            min_gain_to_split: 0.0,
            min_hessian_to_split: 1e-3,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct BinStats {
    sum_gradients: f64,
    sum_hessians: f64,
    count: usize,
}

impl BinStats {
    fn add(&mut self, other: &BinStats) {
        self.sum_gradients += other.sum_gradients;
        self.sum_hessians += other.sum_hessians;
        self.count += other.count;
    }

    fn minus(&self, other: &BinStats) -> BinStats {
        BinStats {
            sum_gradients: self.sum_gradients - other.sum_gradients,
            sum_hessians: self.sum_hessians - other.sum_hessians,
            count: self.count - other.count,
        }
    }
}

/// Chosen split of a node
#[derive(Clone, Debug, PartialEq)]
pub struct SplitInfo {
    pub feature: usize,
    /// Bins `0..=bin` go left
    pub bin: usize,
    pub threshold: f32,
    pub gain: f64,
}

/// A node of a grown tree. Nodes are stored in creation order, so children
/// always follow their parent.
#[derive(Clone, Debug)]
pub struct GrownNode {
    pub depth: usize,
    pub samples: Vec<usize>,
    pub sum_gradients: f64,
    pub sum_hessians: f64,
    /// `Some` once the node has been split
    pub split: Option<SplitInfo>,
    pub left: usize,
    pub right: usize,
}

impl GrownNode {
    pub fn is_leaf(&self) -> bool {
        self.split.is_none()
    }
}

/// Grows a single tree on fixed gradients and hessians
pub struct TreeGrower<'a> {
    binned: &'a BinnedMatrix,
    mapper: &'a BinMapper,
    gradients: &'a [f64],
    hessians: &'a [f64],
    params: GrowerParams,
}

impl<'a> TreeGrower<'a> {
    pub fn new(
        binned: &'a BinnedMatrix,
        mapper: &'a BinMapper,
        gradients: &'a [f64],
        hessians: &'a [f64],
        params: GrowerParams,
    ) -> Self {
        assert_eq!(binned.n_rows(), gradients.len());
        assert_eq!(binned.n_rows(), hessians.len());

        Self {
            binned,
            mapper,
            gradients,
            hessians,
            params,
        }
    }

    /// Grow the tree and return its nodes (index 0 is the root)
    pub fn grow(&self) -> Vec<GrownNode> {
        let root_samples: Vec<usize> = (0..self.binned.n_rows()).collect();
        let mut nodes = vec![self.new_node(root_samples, 0)];

        // Open leaves with their best pending split
        let mut open: Vec<(usize, SplitInfo)> = Vec::new();
        if let Some(split) = self.candidate_split(&nodes[0]) {
            open.push((0, split));
        }

        let mut n_leaves = 1usize;

        while !open.is_empty() {
            if self
                .params
                .max_leaf_nodes
                .is_some_and(|max| n_leaves >= max)
            {
                break;
            }

            // Largest gain first; ties keep the earliest node
            let mut best = 0;
            for (pos, (_, split)) in open.iter().enumerate() {
                if split.gain > open[best].1.gain {
                    best = pos;
                }
            }
            let (node_idx, split) = open.remove(best);

            let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = nodes[node_idx]
                .samples
                .iter()
                .partition(|&&i| self.binned.get(i, split.feature) as usize <= split.bin);

            let depth = nodes[node_idx].depth + 1;
            let left_idx = nodes.len();
            nodes.push(self.new_node(left_samples, depth));
            let right_idx = nodes.len();
            nodes.push(self.new_node(right_samples, depth));

            tracing::trace!(
                node = node_idx,
                feature = split.feature,
                threshold = split.threshold,
                gain = split.gain,
                "split node"
            );

            let parent = &mut nodes[node_idx];
            parent.split = Some(split);
            parent.left = left_idx;
            parent.right = right_idx;
            n_leaves += 1;

            for child in [left_idx, right_idx] {
                if let Some(split) = self.candidate_split(&nodes[child]) {
                    open.push((child, split));
                }
            }
        }

        nodes
    }

    fn new_node(&self, samples: Vec<usize>, depth: usize) -> GrownNode {
        let (sum_gradients, sum_hessians) = samples.iter().fold((0.0, 0.0), |(g, h), &i| {
            (g + self.gradients[i], h + self.hessians[i])
        });

        GrownNode {
            depth,
            samples,
            sum_gradients,
            sum_hessians,
            split: None,
            left: 0,
            right: 0,
        }
    }

    /// Best split of a node, or `None` if it must stay a leaf
    fn candidate_split(&self, node: &GrownNode) -> Option<SplitInfo> {
        if self.params.max_depth.is_some_and(|max| node.depth >= max) {
            return None;
        }
        if node.samples.len() < 2 * self.params.min_samples_leaf {
            return None;
        }
        if node.sum_hessians < self.params.min_hessian_to_split {
            return None;
        }

        self.find_best_split(node)
    }

    fn find_best_split(&self, node: &GrownNode) -> Option<SplitInfo> {
        let total = BinStats {
            sum_gradients: node.sum_gradients,
            sum_hessians: node.sum_hessians,
            count: node.samples.len(),
        };
        let parent_score = self.score(&total);

        let mut best: Option<SplitInfo> = None;

        for feature in 0..self.binned.n_features() {
            let n_bins = self.mapper.n_bins(feature);
            if n_bins < 2 {
                continue;
            }

            let histogram = self.build_histogram(node, feature, n_bins);
            let mut left = BinStats::default();

            for bin in 0..n_bins - 1 {
                left.add(&histogram[bin]);
                let right = total.minus(&left);

                if left.count < self.params.min_samples_leaf {
                    continue;
                }
                if right.count < self.params.min_samples_leaf {
                    break;
                }
                if left.sum_hessians < self.params.min_hessian_to_split
                    || right.sum_hessians < self.params.min_hessian_to_split
                {
                    continue;
                }

                let gain = self.score(&left) + self.score(&right) - parent_score;
                if gain <= self.params.min_gain_to_split {
                    continue;
                }

                if best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitInfo {
                        feature,
                        bin,
                        threshold: self.mapper.threshold(feature, bin),
                        gain,
                    });
                }
            }
        }

        best
    }

    fn build_histogram(&self, node: &GrownNode, feature: usize, n_bins: usize) -> Vec<BinStats> {
        let column = self.binned.column(feature);
        let mut histogram = vec![BinStats::default(); n_bins];

        for &i in &node.samples {
            let stats = &mut histogram[column[i] as usize];
            stats.sum_gradients += self.gradients[i];
            stats.sum_hessians += self.hessians[i];
            stats.count += 1;
        }

        histogram
    }

    /// `G² / (H + l2)`, the loss reduction of a node taking its optimal value
    fn score(&self, stats: &BinStats) -> f64 {
        let denom = stats.sum_hessians + self.params.l2_regularization;
        if denom <= 0.0 {
            0.0
        } else {
            stats.sum_gradients * stats.sum_gradients / denom
        }
    }
}
