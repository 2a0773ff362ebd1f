//! Turning table columns into model inputs.

use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::{Error, Result};
use crate::table::{Table, Value};

pub const SPLIT_SEED: u64 = 42;
pub const TEST_FRACTION: f64 = 0.2;
pub const MIN_ROWS: usize = 5;

/// Resolve feature names to numeric column indices.
pub fn feature_columns(table: &Table, features: &[String]) -> Result<Vec<usize>> {
    if features.is_empty() {
        return Err(Error::Validation("at least one feature column is required".to_string()));
    }
    features
        .iter()
        .map(|name| {
            let idx = table.require_column(name)?;
            if !table.column_type(idx).is_numeric() {
                return Err(Error::Validation(format!(
                    "feature column '{name}' is not numeric"
                )));
            }
            Ok(idx)
        })
        .collect()
}

/// Feature matrix over the given rows with missing cells read as 0.
pub fn feature_matrix(table: &Table, columns: &[usize], rows: &[usize]) -> Array2<f64> {
    Array2::from_shape_fn((rows.len(), columns.len()), |(r, c)| {
        table.rows()[rows[r]][columns[c]].as_f64().unwrap_or(0.0)
    })
}

/// Numeric regression target with missing cells read as 0.
pub fn regression_target(table: &Table, column: usize, rows: &[usize]) -> Result<Array1<f64>> {
    if !table.column_type(column).is_numeric() {
        return Err(Error::Validation(format!(
            "target column '{}' is not numeric",
            table.headers()[column]
        )));
    }
    Ok(rows
        .iter()
        .map(|&r| table.rows()[r][column].as_f64().unwrap_or(0.0))
        .collect())
}

/// Label encoding of a classification target.
#[derive(Debug, Clone)]
pub struct EncodedLabels {
    /// Distinct target values in ascending order; a label is an index into it.
    pub classes: Vec<Value>,
    /// Rows with a non-null target.
    pub rows: Vec<usize>,
    pub labels: Vec<usize>,
}

impl EncodedLabels {
    pub fn decode(&self, label: usize) -> Value {
        self.classes.get(label).cloned().unwrap_or(Value::Null)
    }
}

pub fn encode_labels(table: &Table, column: usize) -> Result<EncodedLabels> {
    let mut classes: Vec<Value> = Vec::new();
    let mut rows = Vec::new();
    for (r, row) in table.rows().iter().enumerate() {
        let value = &row[column];
        if value.is_null() {
            continue;
        }
        rows.push(r);
        if !classes.contains(value) {
            classes.push(value.clone());
        }
    }
    classes.sort_by(Value::total_cmp);

    if classes.len() < 2 {
        return Err(Error::Model(format!(
            "target column '{}' needs at least two distinct values",
            table.headers()[column]
        )));
    }

    let labels = rows
        .iter()
        .map(|&r| {
            let value = &table.rows()[r][column];
            classes.iter().position(|c| c == value).unwrap_or(0)
        })
        .collect();

    Ok(EncodedLabels {
        classes,
        rows,
        labels,
    })
}

/// Seeded shuffle split of `0..n` into (train, test) positions with
/// `ceil(0.2 n)` test rows.
pub fn train_test_split(n: usize) -> Result<(Vec<usize>, Vec<usize>)> {
    if n < MIN_ROWS {
        return Err(Error::Model(format!(
            "at least {MIN_ROWS} rows are required to train a model, got {n}"
        )));
    }
    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(SPLIT_SEED);
    order.shuffle(&mut rng);

    let n_test = (n as f64 * TEST_FRACTION).ceil() as usize;
    let test = order[..n_test].to_vec();
    let train = order[n_test..].to_vec();
    Ok((train, test))
}

/// Pick elements of `values` at `positions`.
pub fn take<T: Clone>(values: &[T], positions: &[usize]) -> Vec<T> {
    positions.iter().map(|&p| values[p].clone()).collect()
}
