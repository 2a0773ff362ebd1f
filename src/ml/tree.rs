//! CART decision trees.

use ndarray::{Array1, Array2};

use super::Estimator;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity over class indices.
    Gini,
    /// Variance of the target.
    Mse,
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    pub criterion: Criterion,
    pub max_depth: usize,
    pub min_samples_split: usize,
    root: Option<TreeNode>,
}

impl DecisionTree {
    pub fn classifier(max_depth: usize) -> Self {
        Self {
            criterion: Criterion::Gini,
            max_depth,
            min_samples_split: 2,
            root: None,
        }
    }

    pub fn regressor(max_depth: usize) -> Self {
        Self {
            criterion: Criterion::Mse,
            max_depth,
            min_samples_split: 2,
            root: None,
        }
    }

    fn impurity(&self, y: &[f64]) -> f64 {
        if y.is_empty() {
            return 0.0;
        }
        let n = y.len() as f64;
        match self.criterion {
            Criterion::Gini => {
                let counts = class_counts(y);
                1.0 - counts
                    .iter()
                    .map(|&c| {
                        let p = c as f64 / n;
                        p * p
                    })
                    .sum::<f64>()
            }
            Criterion::Mse => {
                let mean = y.iter().sum::<f64>() / n;
                y.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
            }
        }
    }

    fn leaf_value(&self, y: &[f64]) -> f64 {
        match self.criterion {
            Criterion::Gini => {
                let counts = class_counts(y);
                // first maximum wins so ties go to the lowest class
                let mut best = 0;
                for (c, &count) in counts.iter().enumerate() {
                    if count > counts[best] {
                        best = c;
                    }
                }
                best as f64
            }
            Criterion::Mse => y.iter().sum::<f64>() / y.len().max(1) as f64,
        }
    }

    /// Best (feature, threshold) by weighted child impurity. Thresholds are
    /// midpoints between consecutive distinct values; earlier features and
    /// lower thresholds win ties.
    fn best_split(&self, x: &Array2<f64>, y: &[f64], indices: &[usize]) -> Option<(usize, f64)> {
        let parent = self.impurity(&indices.iter().map(|&i| y[i]).collect::<Vec<_>>());
        let n = indices.len() as f64;
        let mut best: Option<(usize, f64, f64)> = None;

        for feature in 0..x.ncols() {
            let mut order: Vec<usize> = indices.to_vec();
            order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

            for split in 1..order.len() {
                let lo = x[[order[split - 1], feature]];
                let hi = x[[order[split], feature]];
                if lo == hi {
                    continue;
                }
                let left: Vec<f64> = order[..split].iter().map(|&i| y[i]).collect();
                let right: Vec<f64> = order[split..].iter().map(|&i| y[i]).collect();
                let score = (left.len() as f64 * self.impurity(&left)
                    + right.len() as f64 * self.impurity(&right))
                    / n;

                if best.is_none_or(|(_, _, s)| score < s - 1e-12) {
                    best = Some((feature, (lo + hi) / 2.0, score));
                }
            }
        }

        best.filter(|&(_, _, score)| score < parent - 1e-12)
            .map(|(feature, threshold, _)| (feature, threshold))
    }

    fn build(&self, x: &Array2<f64>, y: &[f64], indices: &[usize], depth: usize) -> TreeNode {
        let targets: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
        let leaf = || TreeNode::Leaf {
            value: self.leaf_value(&targets),
        };

        if depth >= self.max_depth
            || indices.len() < self.min_samples_split
            || self.impurity(&targets) <= 0.0
        {
            return leaf();
        }

        let Some((feature, threshold)) = self.best_split(x, y, indices) else {
            return leaf();
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| x[[i, feature]] <= threshold);

        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(self.build(x, y, &left, depth + 1)),
            right: Box::new(self.build(x, y, &right, depth + 1)),
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        self.root.as_ref().map_or(0, walk)
    }
}

fn class_counts(y: &[f64]) -> Vec<usize> {
    let n_classes = y.iter().fold(0usize, |m, &v| m.max(v as usize + 1));
    let mut counts = vec![0usize; n_classes];
    for &v in y {
        counts[v as usize] += 1;
    }
    counts
}

impl Estimator for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() || x.nrows() == 0 {
            return Err(Error::Model(format!(
                "cannot grow a tree from {} rows and {} targets",
                x.nrows(),
                y.len()
            )));
        }
        let targets = y.to_vec();
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.root = Some(self.build(x, &targets, &indices, 0));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| Error::Model("model is not fitted".to_string()))?;

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let mut node = root;
                loop {
                    match node {
                        TreeNode::Leaf { value } => break *value,
                        TreeNode::Split {
                            feature,
                            threshold,
                            left,
                            right,
                        } => {
                            node = if row[*feature] <= *threshold { &**left } else { &**right };
                        }
                    }
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_learns_threshold() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut tree = DecisionTree::classifier(5);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.predict(&array![[6.4], [6.6]]).unwrap(), array![0.0, 1.0]);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn test_regressor_leaf_means() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 1.0, 5.0, 7.0];

        let mut tree = DecisionTree::regressor(1);
        tree.fit(&x, &y).unwrap();
        let predicted = tree.predict(&array![[0.0], [10.0]]).unwrap();
        assert_eq!(predicted, array![1.0, 6.0]);
    }

    #[test]
    fn test_depth_is_bounded() {
        let x = Array2::from_shape_fn((64, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(64, |i| (i % 7) as f64);

        let mut tree = DecisionTree::regressor(5);
        tree.fit(&x, &y).unwrap();
        assert!(tree.depth() <= 5);
    }

    #[test]
    fn test_constant_features_give_single_leaf() {
        let x = array![[1.0], [1.0], [1.0]];
        let y = array![0.0, 1.0, 1.0];

        let mut tree = DecisionTree::classifier(5);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.predict(&x).unwrap(), array![1.0, 1.0, 1.0]);
    }
}
