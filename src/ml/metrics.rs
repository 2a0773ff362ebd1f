use ndarray::Array1;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusteringMetrics {
    pub inertia: f64,
    pub cluster_sizes: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Metrics {
    Regression(RegressionMetrics),
    Classification(ClassificationMetrics),
    Clustering(ClusteringMetrics),
}

/// Coefficient of determination. A constant target scores 1.0 when
/// predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean) * (t - mean)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub fn regression_metrics(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> RegressionMetrics {
    let n = y_true.len().max(1) as f64;
    let mse = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p) * (t - p))
        .sum::<f64>()
        / n;
    let mae = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / n;

    RegressionMetrics {
        mse,
        rmse: mse.sqrt(),
        mae,
        r2: r2_score(y_true, y_pred),
    }
}

/// Accuracy plus support-weighted precision, recall and F1. Classes with no
/// predictions contribute zero precision.
pub fn classification_metrics(y_true: &[usize], y_pred: &[usize]) -> ClassificationMetrics {
    let n = y_true.len();
    if n == 0 {
        return ClassificationMetrics {
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
        };
    }

    let n_classes = y_true
        .iter()
        .chain(y_pred.iter())
        .fold(0, |m, &c| m.max(c + 1));
    let mut tp = vec![0usize; n_classes];
    let mut predicted = vec![0usize; n_classes];
    let mut support = vec![0usize; n_classes];

    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        support[t] += 1;
        predicted[p] += 1;
        if t == p {
            tp[t] += 1;
        }
    }

    let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
    for c in 0..n_classes {
        if support[c] == 0 {
            continue;
        }
        let weight = support[c] as f64 / n as f64;
        let p = if predicted[c] > 0 {
            tp[c] as f64 / predicted[c] as f64
        } else {
            0.0
        };
        let r = tp[c] as f64 / support[c] as f64;
        let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };

        precision += weight * p;
        recall += weight * r;
        f1 += weight * f;
    }

    ClassificationMetrics {
        accuracy: tp.iter().sum::<usize>() as f64 / n as f64,
        precision,
        recall,
        f1,
    }
}
