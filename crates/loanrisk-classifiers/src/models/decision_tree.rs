//! Weighted CART classification tree used as the forest's base learner.
use ndarray::{ArrayView1, ArrayView2};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Arena node. Children are indices into [`DecisionTree::nodes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        /// Weighted fraction of positive samples that reached this leaf.
        proba: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Candidate features per split; `None` means all.
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    n_features: usize,
    /// Weighted Gini decrease per feature, normalised to sum 1.
    importances: Vec<f64>,
}

impl DecisionTree {
    /// Grow a tree on `rows` of `x` (repeats allowed, as in a bootstrap draw).
    pub fn fit<R: Rng>(
        params: &TreeParams,
        x: ArrayView2<'_, f64>,
        y: &[u8],
        sample_weight: &[f64],
        rows: Vec<usize>,
        rng: &mut R,
    ) -> Self {
        let n_features = x.ncols();
        let mut builder = Builder {
            params,
            x: x.view(),
            y,
            w: sample_weight,
            rng,
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };
        builder.grow(rows, 0);

        let mut importances = builder.importances;
        super::classifier_trait::normalize(&mut importances);
        Self {
            nodes: builder.nodes,
            n_features,
            importances,
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], id: usize) -> usize {
            match nodes[id] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + walk(nodes, left).max(walk(nodes, right))
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    pub fn importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes.get(id) {
                Some(TreeNode::Leaf { proba }) => return *proba,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }
}

struct Builder<'a, R> {
    params: &'a TreeParams,
    x: ArrayView2<'a, f64>,
    y: &'a [u8],
    w: &'a [f64],
    rng: &'a mut R,
    nodes: Vec<TreeNode>,
    importances: Vec<f64>,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

fn gini(neg: f64, pos: f64) -> f64 {
    let total = neg + pos;
    if total <= 0.0 {
        return 0.0;
    }
    let (a, b) = (neg / total, pos / total);
    1.0 - a * a - b * b
}

impl<R: Rng> Builder<'_, R> {
    fn class_mass(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter().fold((0.0, 0.0), |(neg, pos), &i| {
            if self.y[i] == 1 {
                (neg, pos + self.w[i])
            } else {
                (neg + self.w[i], pos)
            }
        })
    }

    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let (neg, pos) = self.class_mass(&rows);
        let id = self.nodes.len();
        let proba = if neg + pos > 0.0 { pos / (neg + pos) } else { 0.0 };
        self.nodes.push(TreeNode::Leaf { proba });

        let p = self.params;
        if depth >= p.max_depth
            || rows.len() < p.min_samples_split
            || rows.len() < 2 * p.min_samples_leaf
            || neg == 0.0
            || pos == 0.0
        {
            return id;
        }

        let Some(best) = self.best_split(&rows, neg, pos) else {
            return id;
        };
        self.importances[best.feature] += best.gain;

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&i| self.x[[i, best.feature]] <= best.threshold);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[id] = TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        id
    }

    /// Search candidate features in random order. Keeps drawing past
    /// `max_features` until at least one valid split has been found.
    fn best_split(&mut self, rows: &[usize], neg: f64, pos: f64) -> Option<Candidate> {
        let n_features = self.x.ncols();
        let max_features = self.params.max_features.unwrap_or(n_features).max(1);
        let min_leaf = self.params.min_samples_leaf.max(1);
        let parent = (neg + pos) * gini(neg, pos);

        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(&mut *self.rng);

        let mut best: Option<Candidate> = None;
        let mut order = rows.to_vec();
        for (examined, &f) in features.iter().enumerate() {
            if examined >= max_features && best.is_some() {
                break;
            }
            order.sort_by(|&a, &b| self.x[[a, f]].total_cmp(&self.x[[b, f]]));

            let (mut left_neg, mut left_pos) = (0.0, 0.0);
            for k in 0..order.len() - 1 {
                let i = order[k];
                if self.y[i] == 1 {
                    left_pos += self.w[i];
                } else {
                    left_neg += self.w[i];
                }
                let here = self.x[[i, f]];
                let next = self.x[[order[k + 1], f]];
                if here == next {
                    continue;
                }
                let n_left = k + 1;
                if n_left < min_leaf || order.len() - n_left < min_leaf {
                    continue;
                }
                let (right_neg, right_pos) = (neg - left_neg, pos - left_pos);
                let children = (left_neg + left_pos) * gini(left_neg, left_pos)
                    + (right_neg + right_pos) * gini(right_neg, right_pos);
                let gain = parent - children;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mid = here + (next - here) / 2.0;
                    best = Some(Candidate {
                        feature: f,
                        threshold: if mid < next { mid } else { here },
                        gain,
                    });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn fit(x: &Array2<f64>, y: &[u8], params: TreeParams) -> DecisionTree {
        let w = vec![1.0; y.len()];
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        DecisionTree::fit(&params, x.view(), y, &w, (0..y.len()).collect(), &mut rng)
    }

    #[test]
    fn learns_a_threshold() {
        let x = array![[1.0, 9.0], [2.0, 1.0], [3.0, 5.0], [10.0, 4.0], [11.0, 8.0], [12.0, 2.0]];
        let y = [0, 0, 0, 1, 1, 1];
        let params = TreeParams {
            min_samples_split: 2,
            min_samples_leaf: 1,
            ..TreeParams::default()
        };
        let tree = fit(&x, &y, params);
        for (row, &label) in x.rows().into_iter().zip(&y) {
            assert_eq!(tree.predict_row(row), f64::from(label));
        }
        assert!((tree.importances()[0] - 1.0).abs() < 1e-12);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn respects_depth_and_leaf_size() {
        let n = 64;
        let x = Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
        let y: Vec<u8> = (0..n).map(|i| u8::from(i % 2 == 0)).collect();
        let tree = fit(&x, &y, TreeParams::default());
        assert!(tree.depth() <= 10);
        // Alternating labels cannot be separated with at least two rows per leaf.
        for row in x.rows() {
            let p = tree.predict_row(row);
            assert!(p > 0.0 && p < 1.0, "leaf probability {}", p);
        }
    }

    #[test]
    fn pure_node_is_a_leaf() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let tree = fit(&x, &[1, 1, 1, 1, 1], TreeParams::default());
        assert_eq!(tree.n_nodes(), 1);
        assert!(tree.importances().iter().all(|&v| v == 0.0));
    }
}
