use std::collections::HashMap;
use std::str::FromStr;

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use super::vote::majority_vote;
use super::WaypointClassifier;

/// Impurity measure used when choosing a split point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitCriterion {
    Gini,
    Entropy,
}

impl SplitCriterion {
    fn impurity(&self, counts: &HashMap<i64, usize>, total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        match self {
            SplitCriterion::Gini => {
                let sum_sq: f64 = counts
                    .values()
                    .map(|&c| {
                        let p = c as f64 / total as f64;
                        p * p
                    })
                    .sum();
                1.0 - sum_sq
            }
            SplitCriterion::Entropy => counts
                .values()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / total as f64;
                    -p * p.log2()
                })
                .sum(),
        }
    }
}

impl FromStr for SplitCriterion {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gini" => Ok(SplitCriterion::Gini),
            "entropy" => Ok(SplitCriterion::Entropy),
            other => Err(PipelineError::ValidationError(format!(
                "Unknown split criterion '{}'. Supported criteria are: gini, entropy",
                other
            ))),
        }
    }
}

/// Hyperparameters for the random forest. Defaults match the shipped
/// artifacts: 20 gini trees of depth 20, seeded for reproducible training.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RandomForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub criterion: SplitCriterion,
    pub seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_trees: 20,
            max_depth: 20,
            criterion: SplitCriterion::Gini,
            seed: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        label: i64,
    },
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
}

/// A single decision tree. Nodes live in a flat arena; index 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn fit(
        x: ArrayView2<f32>,
        y: &[i64],
        sample: &[usize],
        params: &RandomForestParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut tree = DecisionTree { nodes: Vec::new() };
        tree.grow(x, y, sample, 0, params, rng);
        tree
    }

    /// Grows a subtree over `sample` and returns its root index.
    fn grow(
        &mut self,
        x: ArrayView2<f32>,
        y: &[i64],
        sample: &[usize],
        depth: usize,
        params: &RandomForestParams,
        rng: &mut StdRng,
    ) -> usize {
        let counts = label_counts(y, sample);

        let is_pure = counts.len() == 1;
        if is_pure || depth >= params.max_depth || sample.len() < 2 {
            return self.push(Node::Leaf {
                label: majority_label(&counts),
            });
        }

        match self.best_split(x, y, sample, params, rng) {
            Some((feature, threshold)) => {
                let (left_sample, right_sample): (Vec<usize>, Vec<usize>) = sample
                    .iter()
                    .copied()
                    .partition(|&i| x[[i, feature]] <= threshold);

                let node = self.push(Node::Leaf { label: 0 }); // placeholder, patched below
                let left = self.grow(x, y, &left_sample, depth + 1, params, rng);
                let right = self.grow(x, y, &right_sample, depth + 1, params, rng);
                self.nodes[node] = Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                };
                node
            }
            None => self.push(Node::Leaf {
                label: majority_label(&counts),
            }),
        }
    }

    /// Picks the impurity-minimizing (feature, threshold) over a random
    /// subset of sqrt(d) features. Returns None when no candidate threshold
    /// actually separates the sample.
    fn best_split(
        &self,
        x: ArrayView2<f32>,
        y: &[i64],
        sample: &[usize],
        params: &RandomForestParams,
        rng: &mut StdRng,
    ) -> Option<(usize, f32)> {
        let n_features = x.ncols();
        let n_candidates = ((n_features as f64).sqrt().floor() as usize).max(1);
        let features = rand::seq::index::sample(rng, n_features, n_candidates.min(n_features));

        let total = sample.len();
        let parent_counts = label_counts(y, sample);

        let mut best: Option<(usize, f32, f64)> = None;
        for feature in features.iter() {
            let mut column: Vec<(f32, i64)> = sample
                .iter()
                .map(|&i| (x[[i, feature]], y[i]))
                .collect();
            column.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut left_counts: HashMap<i64, usize> = HashMap::new();
            let mut right_counts = parent_counts.clone();

            // Sweep split positions left to right, moving one sample at a
            // time from the right partition into the left.
            for pos in 1..total {
                let (value, label) = column[pos - 1];
                *left_counts.entry(label).or_insert(0) += 1;
                if let Some(count) = right_counts.get_mut(&label) {
                    *count -= 1;
                    if *count == 0 {
                        right_counts.remove(&label);
                    }
                }

                let next_value = column[pos].0;
                if next_value <= value {
                    continue; // no threshold separates equal values
                }

                let left_impurity = params.criterion.impurity(&left_counts, pos);
                let right_impurity = params.criterion.impurity(&right_counts, total - pos);
                let weighted = (pos as f64 / total as f64) * left_impurity
                    + ((total - pos) as f64 / total as f64) * right_impurity;

                if best.map_or(true, |(_, _, score)| weighted < score) {
                    let threshold = (value + next_value) / 2.0;
                    best = Some((feature, threshold, weighted));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn predict_one(&self, row: ArrayView1<f32>) -> i64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { label } => return *label,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

fn label_counts(y: &[i64], sample: &[usize]) -> HashMap<i64, usize> {
    let mut counts = HashMap::new();
    for &i in sample {
        *counts.entry(y[i]).or_insert(0) += 1;
    }
    counts
}

/// Most frequent label, smallest ID on ties.
fn majority_label(counts: &HashMap<i64, usize>) -> i64 {
    counts
        .iter()
        .max_by(|(label_a, count_a), (label_b, count_b)| {
            count_a.cmp(count_b).then_with(|| label_b.cmp(label_a))
        })
        .map(|(&label, _)| label)
        .unwrap_or(0)
}

/// Random-forest waypoint classifier: an ensemble of decision trees, each
/// trained on a bootstrap resample of the training set. Prediction is a
/// majority vote across the trees' individual votes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    params: RandomForestParams,
    trees: Vec<DecisionTree>,
}

impl RandomForestClassifier {
    /// Creates an untrained forest with the given hyperparameters.
    ///
    /// # Errors
    /// - `ValidationError` if the tree count or max depth is zero
    pub fn new(params: RandomForestParams) -> Result<Self, PipelineError> {
        if params.n_trees == 0 {
            return Err(PipelineError::ValidationError(
                "Random forest needs at least one tree".into(),
            ));
        }
        if params.max_depth == 0 {
            return Err(PipelineError::ValidationError(
                "Random forest max depth must be at least 1".into(),
            ));
        }
        Ok(Self {
            params,
            trees: Vec::new(),
        })
    }

    pub fn params(&self) -> &RandomForestParams {
        &self.params
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

impl WaypointClassifier for RandomForestClassifier {
    /// Trains the ensemble. Each tree sees an independent bootstrap sample
    /// drawn from a seeded RNG, so training is reproducible for a given
    /// `RandomForestParams::seed`.
    fn fit(&mut self, embeddings: ArrayView2<f32>, labels: &[i64]) -> Result<(), PipelineError> {
        if embeddings.nrows() == 0 {
            return Err(PipelineError::ValidationError(
                "Cannot fit on an empty training set".into(),
            ));
        }
        if embeddings.nrows() != labels.len() {
            return Err(PipelineError::ValidationError(format!(
                "Embedding count ({}) does not match label count ({})",
                embeddings.nrows(),
                labels.len()
            )));
        }

        let n = embeddings.nrows();
        let mut rng = StdRng::seed_from_u64(self.params.seed);

        self.trees = (0..self.params.n_trees)
            .map(|_| {
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(embeddings, labels, &bootstrap, &self.params, &mut rng)
            })
            .collect();

        Ok(())
    }

    fn predict(&self, embeddings: ArrayView2<f32>) -> Result<Vec<i64>, PipelineError> {
        if !self.is_fitted() {
            return Err(PipelineError::ValidationError(
                "Classifier has not been fitted".into(),
            ));
        }
        if embeddings.nrows() == 0 {
            return Err(PipelineError::ValidationError(
                "Cannot predict on an empty embedding batch".into(),
            ));
        }

        embeddings
            .rows()
            .into_iter()
            .map(|row| {
                let votes: Vec<i64> = self.trees.iter().map(|t| t.predict_one(row)).collect();
                majority_vote(&votes)
            })
            .collect()
    }
}
