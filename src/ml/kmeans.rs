use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub seed: u64,
    centroids: Option<Array2<f64>>,
    labels: Vec<usize>,
    inertia: f64,
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest_centroid(centroids: &Array2<f64>, row: ArrayView1<'_, f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (c, centroid) in centroids.rows().into_iter().enumerate() {
        let d = squared_distance(row, centroid);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

impl KMeans {
    pub fn new(n_clusters: usize, seed: u64) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tol: 1e-4,
            seed,
            centroids: None,
            labels: Vec::new(),
            inertia: 0.0,
        }
    }

    /// k-means++ seeding: each new centroid is drawn with probability
    /// proportional to its squared distance from the closest one so far.
    fn init_centroids(&self, x: &Array2<f64>, rng: &mut StdRng) -> Array2<f64> {
        let n_samples = x.nrows();
        let mut centroids = Array2::<f64>::zeros((self.n_clusters, x.ncols()));
        centroids
            .row_mut(0)
            .assign(&x.row(rng.gen_range(0..n_samples)));

        for c in 1..self.n_clusters {
            let dists: Vec<f64> = x
                .rows()
                .into_iter()
                .map(|row| {
                    (0..c)
                        .map(|j| squared_distance(row, centroids.row(j)))
                        .fold(f64::INFINITY, f64::min)
                })
                .collect();

            let total: f64 = dists.iter().sum();
            let chosen = if total > 0.0 {
                let target = rng.gen_range(0.0..total);
                let mut cumulative = 0.0;
                let mut chosen = n_samples - 1;
                for (i, d) in dists.iter().enumerate() {
                    cumulative += d;
                    if cumulative > target {
                        chosen = i;
                        break;
                    }
                }
                chosen
            } else {
                rng.gen_range(0..n_samples)
            };
            centroids.row_mut(c).assign(&x.row(chosen));
        }

        centroids
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if self.n_clusters == 0 || n_samples < self.n_clusters {
            return Err(Error::Model(format!(
                "need at least {} rows to form {} clusters, got {}",
                self.n_clusters, self.n_clusters, n_samples
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = self.init_centroids(x, &mut rng);
        let mut labels = vec![usize::MAX; n_samples];

        for _ in 0..self.max_iter {
            let new_labels: Vec<usize> = x
                .rows()
                .into_iter()
                .map(|row| nearest_centroid(&centroids, row).0)
                .collect();
            let changed = new_labels != labels;
            labels = new_labels;

            let mut sums = Array2::<f64>::zeros(centroids.dim());
            let mut counts = vec![0usize; self.n_clusters];
            for (i, &c) in labels.iter().enumerate() {
                counts[c] += 1;
                let mut target = sums.row_mut(c);
                target += &x.row(i);
            }
            for (c, &count) in counts.iter().enumerate() {
                if count > 0 {
                    sums.row_mut(c).mapv_inplace(|v| v / count as f64);
                } else {
                    // empty cluster: restart it on a random row
                    sums.row_mut(c).assign(&x.row(rng.gen_range(0..n_samples)));
                }
            }

            let shift: f64 = centroids
                .iter()
                .zip(sums.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            centroids = sums;

            if !changed || shift < self.tol {
                break;
            }
        }

        // final assignment against the final centroids
        let mut inertia = 0.0;
        for (i, row) in x.rows().into_iter().enumerate() {
            let (c, d) = nearest_centroid(&centroids, row);
            labels[i] = c;
            inertia += d;
        }

        tracing::debug!("k-means converged with inertia {inertia:.4}");
        self.centroids = Some(centroids);
        self.labels = labels;
        self.inertia = inertia;
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let centroids = self
            .centroids
            .as_ref()
            .ok_or_else(|| Error::Model("model is not fitted".to_string()))?;
        Ok(x.rows()
            .into_iter()
            .map(|row| nearest_centroid(centroids, row).0 as f64)
            .collect())
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.n_clusters];
        for &c in &self.labels {
            sizes[c] += 1;
        }
        sizes
    }
}
