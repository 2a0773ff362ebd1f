//! Model fitting and scoring over stored tables.
//!
//! Every supervised run uses the same seeded 80/20 split so repeated runs on
//! the same table report the same numbers.

mod abtest;
mod dataset;
mod kmeans;
mod knn;
mod linear;
mod metrics;
mod tree;

pub use abtest::{AbTestReport, AbTestResult, ab_test};
pub use dataset::{MIN_ROWS, SPLIT_SEED, train_test_split};
pub use kmeans::KMeans;
pub use knn::Knn;
pub use linear::{Coefficient, LinearRegression, LogisticRegression, OlsSummary, ols_summary};
pub use metrics::{
    ClassificationMetrics, ClusteringMetrics, Metrics, RegressionMetrics, classification_metrics,
    r2_score, regression_metrics,
};
pub use tree::DecisionTree;

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::table::{Table, Value};
use dataset::{encode_labels, feature_columns, feature_matrix, regression_target, take};

const TREE_DEPTH: usize = 5;
const NEIGHBOURS: usize = 5;
const RIDGE_ALPHA: f64 = 1.0;
const CLUSTERS: usize = 3;

/// Name of the column appended by [`predict_into`].
pub const PREDICTIONS_COLUMN: &str = "Predictions";

/// Supervised model interface. Classification labels are class indices
/// stored as `f64`.
pub trait Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Regression,
    Classification,
    Clustering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LinearRegression,
    Ridge,
    DecisionTreeRegressor,
    KnnRegressor,
    LogisticRegression,
    DecisionTreeClassifier,
    KnnClassifier,
    Kmeans,
}

impl ModelKind {
    pub const ALL: [ModelKind; 8] = [
        ModelKind::LinearRegression,
        ModelKind::Ridge,
        ModelKind::DecisionTreeRegressor,
        ModelKind::KnnRegressor,
        ModelKind::LogisticRegression,
        ModelKind::DecisionTreeClassifier,
        ModelKind::KnnClassifier,
        ModelKind::Kmeans,
    ];

    pub const REGRESSORS: [ModelKind; 4] = [
        ModelKind::LinearRegression,
        ModelKind::Ridge,
        ModelKind::DecisionTreeRegressor,
        ModelKind::KnnRegressor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "linear_regression",
            ModelKind::Ridge => "ridge",
            ModelKind::DecisionTreeRegressor => "decision_tree_regressor",
            ModelKind::KnnRegressor => "knn_regressor",
            ModelKind::LogisticRegression => "logistic_regression",
            ModelKind::DecisionTreeClassifier => "decision_tree_classifier",
            ModelKind::KnnClassifier => "knn_classifier",
            ModelKind::Kmeans => "kmeans",
        }
    }

    pub fn task(self) -> Task {
        match self {
            ModelKind::LinearRegression
            | ModelKind::Ridge
            | ModelKind::DecisionTreeRegressor
            | ModelKind::KnnRegressor => Task::Regression,
            ModelKind::LogisticRegression
            | ModelKind::DecisionTreeClassifier
            | ModelKind::KnnClassifier => Task::Classification,
            ModelKind::Kmeans => Task::Clustering,
        }
    }

    fn estimator(self) -> Result<Box<dyn Estimator>> {
        Ok(match self {
            ModelKind::LinearRegression => Box::new(LinearRegression::new()),
            ModelKind::Ridge => Box::new(LinearRegression::ridge(RIDGE_ALPHA)),
            ModelKind::DecisionTreeRegressor => Box::new(DecisionTree::regressor(TREE_DEPTH)),
            ModelKind::KnnRegressor => Box::new(Knn::regressor(NEIGHBOURS)),
            ModelKind::LogisticRegression => Box::new(LogisticRegression::new()),
            ModelKind::DecisionTreeClassifier => Box::new(DecisionTree::classifier(TREE_DEPTH)),
            ModelKind::KnnClassifier => Box::new(Knn::classifier(NEIGHBOURS)),
            ModelKind::Kmeans => {
                return Err(Error::Model("kmeans is unsupervised".to_string()));
            }
        })
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ModelKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = ModelKind::ALL.iter().map(|k| k.as_str()).collect();
                Error::Validation(format!(
                    "unknown model '{s}' (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub model: ModelKind,
    pub target: Option<String>,
    pub features: Vec<String>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub metrics: Metrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ols: Option<OlsSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoRunEntry {
    pub model: ModelKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<RegressionMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AutoRunReport {
    pub target: Option<String>,
    pub features: Vec<String>,
    pub results: Vec<AutoRunEntry>,
    pub best_model: Option<ModelKind>,
    pub best_score: f64,
}

fn require_target<'a>(target: Option<&'a str>, kind: ModelKind) -> Result<&'a str> {
    target.ok_or_else(|| Error::Validation(format!("{kind} needs a target column")))
}

fn check_target_not_feature(target: &str, features: &[String]) -> Result<()> {
    if features.iter().any(|f| f == target) {
        return Err(Error::Validation(format!(
            "target column '{target}' cannot also be a feature"
        )));
    }
    Ok(())
}

/// Fit `kind` on the training split and score it on the held-out rows.
/// Clustering fits on every row and ignores `target`.
pub fn fit_and_score(
    table: &Table,
    target: Option<&str>,
    features: &[String],
    kind: ModelKind,
) -> Result<ModelReport> {
    let columns = feature_columns(table, features)?;

    let report = match kind.task() {
        Task::Regression => {
            let target = require_target(target, kind)?;
            check_target_not_feature(target, features)?;
            let target_col = table.require_column(target)?;

            let all_rows: Vec<usize> = (0..table.n_rows()).collect();
            let y_all = regression_target(table, target_col, &all_rows)?;
            let (train, test) = train_test_split(all_rows.len())?;

            let mut model = kind.estimator()?;
            model.fit(
                &feature_matrix(table, &columns, &train),
                &y_all.select(Axis(0), &train),
            )?;
            let predicted = model.predict(&feature_matrix(table, &columns, &test))?;
            let y_test = y_all.select(Axis(0), &test);

            let ols = if kind == ModelKind::LinearRegression {
                Some(ols_summary(
                    &feature_matrix(table, &columns, &all_rows),
                    &y_all,
                    features,
                )?)
            } else {
                None
            };

            ModelReport {
                model: kind,
                target: Some(target.to_string()),
                features: features.to_vec(),
                train_rows: train.len(),
                test_rows: test.len(),
                metrics: Metrics::Regression(regression_metrics(&y_test, &predicted)),
                ols,
            }
        }
        Task::Classification => {
            let target = require_target(target, kind)?;
            check_target_not_feature(target, features)?;
            let target_col = table.require_column(target)?;

            let encoded = encode_labels(table, target_col)?;
            let (train, test) = train_test_split(encoded.rows.len())?;
            let train_rows = take(&encoded.rows, &train);
            let test_rows = take(&encoded.rows, &test);
            let y_train: Array1<f64> = take(&encoded.labels, &train)
                .into_iter()
                .map(|l| l as f64)
                .collect();
            let y_test = take(&encoded.labels, &test);

            let mut model = kind.estimator()?;
            model.fit(&feature_matrix(table, &columns, &train_rows), &y_train)?;
            let predicted: Vec<usize> = model
                .predict(&feature_matrix(table, &columns, &test_rows))?
                .iter()
                .map(|&p| p as usize)
                .collect();

            ModelReport {
                model: kind,
                target: Some(target.to_string()),
                features: features.to_vec(),
                train_rows: train.len(),
                test_rows: test.len(),
                metrics: Metrics::Classification(classification_metrics(&y_test, &predicted)),
                ols: None,
            }
        }
        Task::Clustering => {
            let all_rows: Vec<usize> = (0..table.n_rows()).collect();
            let mut model = KMeans::new(CLUSTERS, SPLIT_SEED);
            model.fit(&feature_matrix(table, &columns, &all_rows))?;

            ModelReport {
                model: kind,
                target: None,
                features: features.to_vec(),
                train_rows: all_rows.len(),
                test_rows: 0,
                metrics: Metrics::Clustering(ClusteringMetrics {
                    inertia: model.inertia(),
                    cluster_sizes: model.cluster_sizes(),
                }),
                ols: None,
            }
        }
    };

    tracing::info!(
        "Fitted {} on {} rows, scored on {}",
        kind,
        report.train_rows,
        report.test_rows
    );
    Ok(report)
}

/// Run every regression model with the last numeric column as target and
/// the other numeric columns as features. Individual model failures are
/// recorded in the report. With fewer than two numeric columns the report
/// is empty.
pub fn auto_run(table: &Table) -> AutoRunReport {
    let numeric = table.numeric_columns();
    let Some((&target_col, feature_cols)) = numeric.split_last() else {
        return AutoRunReport::default();
    };
    if feature_cols.is_empty() {
        return AutoRunReport::default();
    }

    let target = table.headers()[target_col].clone();
    let features: Vec<String> = feature_cols
        .iter()
        .map(|&c| table.headers()[c].clone())
        .collect();

    let mut report = AutoRunReport {
        target: Some(target.clone()),
        features: features.clone(),
        ..Default::default()
    };

    for kind in ModelKind::REGRESSORS {
        let entry = match fit_and_score(table, Some(&target), &features, kind) {
            Ok(ModelReport {
                metrics: Metrics::Regression(m),
                ..
            }) => {
                if m.r2 > report.best_score {
                    report.best_score = m.r2;
                    report.best_model = Some(kind);
                }
                AutoRunEntry {
                    model: kind,
                    metrics: Some(m),
                    error: None,
                }
            }
            Ok(_) => AutoRunEntry {
                model: kind,
                metrics: None,
                error: Some("unexpected metrics kind".to_string()),
            },
            Err(e) => {
                tracing::warn!("{} failed during auto run: {}", kind, e);
                AutoRunEntry {
                    model: kind,
                    metrics: None,
                    error: Some(e.to_string()),
                }
            }
        };
        report.results.push(entry);
    }

    report
}

/// Fit `kind` on every usable row and append a `Predictions` column with
/// one prediction per row of `table`.
pub fn predict_into(
    table: &Table,
    target: Option<&str>,
    features: &[String],
    kind: ModelKind,
) -> Result<Table> {
    let columns = feature_columns(table, features)?;
    let all_rows: Vec<usize> = (0..table.n_rows()).collect();
    let x_all = feature_matrix(table, &columns, &all_rows);

    let predictions: Vec<Value> = match kind.task() {
        Task::Regression => {
            let target = require_target(target, kind)?;
            check_target_not_feature(target, features)?;
            let target_col = table.require_column(target)?;
            let y = regression_target(table, target_col, &all_rows)?;

            let mut model = kind.estimator()?;
            model.fit(&x_all, &y)?;
            model.predict(&x_all)?.into_iter().map(Value::Float).collect()
        }
        Task::Classification => {
            let target = require_target(target, kind)?;
            check_target_not_feature(target, features)?;
            let target_col = table.require_column(target)?;
            let encoded = encode_labels(table, target_col)?;
            let y: Array1<f64> = encoded.labels.iter().map(|&l| l as f64).collect();

            let mut model = kind.estimator()?;
            model.fit(&feature_matrix(table, &columns, &encoded.rows), &y)?;
            model
                .predict(&x_all)?
                .iter()
                .map(|&p| encoded.decode(p as usize))
                .collect()
        }
        Task::Clustering => {
            let mut model = KMeans::new(CLUSTERS, SPLIT_SEED);
            model.fit(&x_all)?;
            model
                .labels()
                .iter()
                .map(|&c| Value::Int(c as i64))
                .collect()
        }
    };

    let mut out = table.clone();
    out.push_column(PREDICTIONS_COLUMN, predictions)?;
    Ok(out)
}
