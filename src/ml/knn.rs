//! k-nearest-neighbours with Euclidean distance and uniform weights.

use ndarray::{Array1, Array2, ArrayView1};

use super::Estimator;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnnMode {
    /// Mean of the neighbours' targets.
    Regress,
    /// Majority vote over class indices; ties go to the lowest class.
    Classify,
}

#[derive(Debug, Clone)]
pub struct Knn {
    pub k: usize,
    pub mode: KnnMode,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl Knn {
    pub fn regressor(k: usize) -> Self {
        Self::new(k, KnnMode::Regress)
    }

    pub fn classifier(k: usize) -> Self {
        Self::new(k, KnnMode::Classify)
    }

    fn new(k: usize, mode: KnnMode) -> Self {
        Self {
            k,
            mode,
            x_train: None,
            y_train: None,
        }
    }

    /// Training indices of the `k` closest rows, nearest first. Equal
    /// distances keep training order.
    fn nearest(&self, x_train: &Array2<f64>, sample: ArrayView1<'_, f64>) -> Vec<usize> {
        let mut dists: Vec<(f64, usize)> = x_train
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let d: f64 = row
                    .iter()
                    .zip(sample.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                (d, i)
            })
            .collect();
        dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        dists.truncate(self.k.min(x_train.nrows()));
        dists.into_iter().map(|(_, i)| i).collect()
    }
}

impl Estimator for Knn {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() || x.nrows() == 0 {
            return Err(Error::Model(format!(
                "cannot fit neighbours on {} rows and {} targets",
                x.nrows(),
                y.len()
            )));
        }
        if self.k == 0 {
            return Err(Error::Model("k must be at least 1".to_string()));
        }
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (Some(x_train), Some(y_train)) = (&self.x_train, &self.y_train) else {
            return Err(Error::Model("model is not fitted".to_string()));
        };

        Ok(x.rows()
            .into_iter()
            .map(|sample| {
                let neighbours = self.nearest(x_train, sample);
                match self.mode {
                    KnnMode::Regress => {
                        neighbours.iter().map(|&i| y_train[i]).sum::<f64>()
                            / neighbours.len() as f64
                    }
                    KnnMode::Classify => {
                        let n_classes = neighbours
                            .iter()
                            .fold(0usize, |m, &i| m.max(y_train[i] as usize + 1));
                        let mut votes = vec![0usize; n_classes];
                        for &i in &neighbours {
                            votes[y_train[i] as usize] += 1;
                        }
                        let mut best = 0;
                        for (c, &v) in votes.iter().enumerate() {
                            if v > votes[best] {
                                best = c;
                            }
                        }
                        best as f64
                    }
                }
            })
            .collect())
    }
}
