use ndarray::ArrayView2;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Growth limits for a single tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Maximum depth (root has depth 0). `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    /// Nodes with fewer samples become leaves.
    pub min_samples_split: usize,
    /// Minimum number of samples on each side of a split.
    pub min_samples_leaf: usize,
    /// Non-constant features examined per node. `None` means
    /// `ceil(sqrt(n_features))`.
    pub max_features: Option<usize>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

impl TreeConfig {
    pub fn features_per_node(&self, n_features: usize) -> usize {
        self.max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().ceil() as usize)
            .clamp(1, n_features.max(1))
    }
}

/// A node in a classification tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Internal split node. Samples with `features[feature] <= threshold`
    /// go left.
    Split {
        feature: u32,
        threshold: f32,
        left: u32,
        right: u32,
    },
    /// Leaf node holding a class index.
    Leaf { class: u32 },
}

/// A binary classification tree. Node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

/// Training data shared by every node of one tree.
pub struct TrainingSet<'a> {
    pub features: ArrayView2<'a, f32>,
    /// Class index per row of `features`.
    pub classes: &'a [u32],
    pub num_classes: usize,
}

struct BestSplit {
    feature: usize,
    threshold: f32,
    impurity: f64,
}

impl DecisionTree {
    pub fn new(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    /// Grow a tree on the given rows of `data`. Rows may repeat (bootstrap
    /// samples).
    pub fn fit(
        data: &TrainingSet<'_>,
        rows: &[usize],
        config: &TreeConfig,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let mut rows = rows.to_vec();
        tree.grow(data, &mut rows, 0, config, rng);
        tree
    }

    /// Traverse the tree and return the predicted class index.
    pub fn predict(&self, features: &[f32]) -> u32 {
        let mut node_idx = 0usize;

        loop {
            match &self.nodes[node_idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node_idx = if features[*feature as usize] <= *threshold {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
                TreeNode::Leaf { class } => return *class,
            }
        }
    }

    /// Check that every path from the root ends in a leaf, reads only
    /// features below `num_features` and yields classes below `num_classes`.
    pub fn validate(&self, num_features: usize, num_classes: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::InvalidModel("tree has no nodes".into()));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if feature as usize >= num_features {
                        return Err(Error::InvalidModel(format!(
                            "node {idx} splits on feature {feature}, input has {num_features}"
                        )));
                    }
                    // Children are stored after their parent.
                    for child in [left as usize, right as usize] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(Error::InvalidModel(format!(
                                "node {idx} points to node {child} of {}",
                                self.nodes.len()
                            )));
                        }
                    }
                }
                TreeNode::Leaf { class } => {
                    if class as usize >= num_classes {
                        return Err(Error::InvalidModel(format!(
                            "leaf {idx} predicts class {class} of {num_classes}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        self.depth_from(0)
    }

    fn depth_from(&self, node_idx: usize) -> usize {
        match &self.nodes[node_idx] {
            TreeNode::Split { left, right, .. } => {
                1 + self
                    .depth_from(*left as usize)
                    .max(self.depth_from(*right as usize))
            }
            TreeNode::Leaf { .. } => 1,
        }
    }

    /// Grow the subtree for `rows` and return the index of its root.
    fn grow(
        &mut self,
        data: &TrainingSet<'_>,
        rows: &mut [usize],
        depth: usize,
        config: &TreeConfig,
        rng: &mut ChaCha8Rng,
    ) -> u32 {
        let node_idx = self.nodes.len() as u32;
        let counts = class_counts(data, rows);
        let majority = argmax(&counts);
        let impurity = gini(&counts, rows.len());

        let depth_reached = config.max_depth.is_some_and(|max| depth >= max);
        if depth_reached || rows.len() < config.min_samples_split || impurity <= 0.0 {
            self.nodes.push(TreeNode::Leaf { class: majority });
            return node_idx;
        }

        let Some(best) = find_best_split(data, rows, config, rng) else {
            self.nodes.push(TreeNode::Leaf { class: majority });
            return node_idx;
        };

        // Reserve the slot; children are appended after it.
        self.nodes.push(TreeNode::Leaf { class: majority });

        let split_at = partition(rows, |row| data.features[[row, best.feature]] <= best.threshold);
        let (left_rows, right_rows) = rows.split_at_mut(split_at);
        let left = self.grow(data, left_rows, depth + 1, config, rng);
        let right = self.grow(data, right_rows, depth + 1, config, rng);

        log::trace!(
            "node {}: feature {} <= {} (gini {:.4} -> {:.4})",
            node_idx,
            best.feature,
            best.threshold,
            impurity,
            best.impurity
        );
        self.nodes[node_idx as usize] = TreeNode::Split {
            feature: best.feature as u32,
            threshold: best.threshold,
            left,
            right,
        };
        node_idx
    }
}

/// Search a random subset of features for the split with the lowest weighted
/// gini impurity. Constant features are skipped without counting towards the
/// subset size.
fn find_best_split(
    data: &TrainingSet<'_>,
    rows: &[usize],
    config: &TreeConfig,
    rng: &mut ChaCha8Rng,
) -> Option<BestSplit> {
    let n_features = data.features.ncols();
    let budget = config.features_per_node(n_features);

    let mut candidates: Vec<usize> = (0..n_features).collect();
    candidates.shuffle(rng);

    let n = rows.len();
    let total = class_counts(data, rows);
    let mut best: Option<BestSplit> = None;
    let mut examined = 0;
    let mut column: Vec<(f32, u32)> = Vec::with_capacity(n);

    for feature in candidates {
        if examined == budget {
            break;
        }

        column.clear();
        column.extend(
            rows.iter()
                .map(|&row| (data.features[[row, feature]], data.classes[row])),
        );
        column.sort_by(|a, b| a.0.total_cmp(&b.0));
        if column[0].0 == column[n - 1].0 {
            continue;
        }
        examined += 1;

        let mut left = vec![0usize; data.num_classes];
        for i in 0..n - 1 {
            left[column[i].1 as usize] += 1;
            let (value, next) = (column[i].0, column[i + 1].0);
            if value == next {
                continue;
            }
            let n_left = i + 1;
            let n_right = n - n_left;
            if n_left < config.min_samples_leaf || n_right < config.min_samples_leaf {
                continue;
            }

            let right: Vec<usize> = total.iter().zip(&left).map(|(t, l)| t - l).collect();
            let weighted = (n_left as f64 * gini(&left, n_left)
                + n_right as f64 * gini(&right, n_right))
                / n as f64;

            if best.as_ref().map_or(true, |b| weighted < b.impurity) {
                let mut threshold = value + (next - value) / 2.0;
                // Midpoints of adjacent floats can round up to `next`.
                if threshold >= next {
                    threshold = value;
                }
                best = Some(BestSplit {
                    feature,
                    threshold,
                    impurity: weighted,
                });
            }
        }
    }

    best
}

fn class_counts(data: &TrainingSet<'_>, rows: &[usize]) -> Vec<usize> {
    let mut counts = vec![0usize; data.num_classes];
    for &row in rows {
        counts[data.classes[row] as usize] += 1;
    }
    counts
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

/// Index of the largest count; ties resolve to the lowest index.
pub(crate) fn argmax(counts: &[usize]) -> u32 {
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    best as u32
}

/// Reorder `rows` so that rows matching `pred` come first. Returns their
/// count.
fn partition<F: Fn(usize) -> bool>(rows: &mut [usize], pred: F) -> usize {
    let mut split = 0;
    for i in 0..rows.len() {
        if pred(rows[i]) {
            rows.swap(i, split);
            split += 1;
        }
    }
    split
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use rand::SeedableRng;

    fn fit(features: &Array2<f32>, classes: &[u32], config: &TreeConfig) -> DecisionTree {
        let data = TrainingSet {
            features: features.view(),
            classes,
            num_classes: 1 + *classes.iter().max().unwrap() as usize,
        };
        let rows: Vec<usize> = (0..classes.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        DecisionTree::fit(&data, &rows, config, &mut rng)
    }

    #[test]
    fn simple_tree_traversal() {
        //        [0: split]
        //       /          \
        //   [1: leaf]   [2: leaf]
        let tree = DecisionTree::new(vec![
            TreeNode::Split {
                feature: 1,
                threshold: 0.5,
                left: 1,
                right: 2,
            },
            TreeNode::Leaf { class: 3 },
            TreeNode::Leaf { class: 7 },
        ]);

        assert_eq!(tree.predict(&[9.0, 0.5]), 3);
        assert_eq!(tree.predict(&[9.0, 0.6]), 7);
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn learns_threshold_on_informative_feature() {
        // Column 0 is constant, column 1 separates the classes.
        let features = array![[1.0, 0.1], [1.0, 0.2], [1.0, 0.3], [1.0, 0.8], [1.0, 0.9]];
        let classes: [u32; 5] = [0, 0, 0, 1, 1];
        let tree = fit(&features, &classes, &TreeConfig::default());

        assert_eq!(tree.num_nodes(), 3);
        match &tree.nodes[0] {
            TreeNode::Split {
                feature, threshold, ..
            } => {
                assert_eq!(*feature, 1);
                assert!((*threshold - 0.55).abs() < 1e-6);
            }
            other => panic!("expected split at root, got {other:?}"),
        }
        for (row, &class) in features.rows().into_iter().zip(&classes) {
            assert_eq!(tree.predict(row.as_slice().unwrap()), class);
        }
    }

    #[test]
    fn fits_xor_with_full_depth() {
        let features = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let classes: [u32; 4] = [0, 1, 1, 0];
        let config = TreeConfig {
            max_features: Some(2),
            ..Default::default()
        };
        let tree = fit(&features, &classes, &config);
        for (row, &class) in features.rows().into_iter().zip(&classes) {
            assert_eq!(tree.predict(row.as_slice().unwrap()), class);
        }
    }

    #[test]
    fn max_depth_limits_growth() {
        let features = array![[0.0], [1.0], [2.0], [3.0]];
        let classes: [u32; 4] = [0, 1, 0, 1];
        let config = TreeConfig {
            max_depth: Some(1),
            ..Default::default()
        };
        let tree = fit(&features, &classes, &config);
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn pure_node_is_a_leaf() {
        let features = array![[0.0], [5.0]];
        let tree = fit(&features, &[2, 2], &TreeConfig::default());
        assert_eq!(tree.nodes, vec![TreeNode::Leaf { class: 2 }]);
    }

    #[test]
    fn validate_accepts_fitted_tree() {
        let features = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let classes: [u32; 4] = [0, 1, 1, 0];
        let tree = fit(&features, &classes, &TreeConfig::default());
        tree.validate(2, 2).unwrap();
    }

    #[test]
    fn validate_rejects_broken_trees() {
        let split = |feature, left, right| TreeNode::Split {
            feature,
            threshold: 0.5,
            left,
            right,
        };
        let leaf = |class| TreeNode::Leaf { class };

        let broken = [
            DecisionTree::new(vec![]),
            DecisionTree::new(vec![split(5, 1, 2), leaf(0), leaf(1)]),
            DecisionTree::new(vec![split(0, 1, 9), leaf(0), leaf(1)]),
            DecisionTree::new(vec![split(0, 0, 1), leaf(0)]),
            DecisionTree::new(vec![split(0, 1, 2), leaf(0), leaf(4)]),
        ];
        for tree in broken {
            assert!(
                matches!(tree.validate(2, 2), Err(Error::InvalidModel(_))),
                "{tree:?}"
            );
        }
    }

    #[test]
    fn gini_and_argmax() {
        assert_eq!(gini(&[4, 0], 4), 0.0);
        assert!((gini(&[2, 2], 4) - 0.5).abs() < 1e-12);
        assert_eq!(argmax(&[1, 3, 3]), 1);
        assert_eq!(argmax(&[0, 0]), 0);
    }

    #[test]
    fn partition_moves_matches_first() {
        let mut rows = vec![5, 2, 8, 1, 9];
        let split = partition(&mut rows, |r| r < 5);
        assert_eq!(split, 2);
        let mut left = rows[..split].to_vec();
        left.sort();
        assert_eq!(left, vec![1, 2]);
    }
}
