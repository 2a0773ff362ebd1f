//! Canned row/column cleaning steps with an audit line per applied step.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::table::{Table, Value, mean, quantile, row_key};

const IQR_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingStrategy {
    #[default]
    Drop,
    FillMean,
    FillMode,
}

impl MissingStrategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MissingStrategy::Drop => "drop",
            MissingStrategy::FillMean => "fill_mean",
            MissingStrategy::FillMode => "fill_mode",
        }
    }
}

impl fmt::Display for MissingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MissingStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "drop" => Ok(MissingStrategy::Drop),
            "fill_mean" => Ok(MissingStrategy::FillMean),
            "fill_mode" => Ok(MissingStrategy::FillMode),
            other => Err(Error::Validation(format!(
                "unknown missing-value strategy '{other}' (expected drop, fill_mean or fill_mode)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanOptions {
    pub remove_duplicates: bool,
    pub handle_missing: bool,
    pub missing_strategy: MissingStrategy,
    pub standardize_text: bool,
    pub remove_outliers: bool,
}

impl CleanOptions {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        !(self.remove_duplicates
            || self.handle_missing
            || self.standardize_text
            || self.remove_outliers)
    }
}

#[derive(Debug, Clone)]
pub struct Cleaned {
    pub table: Table,
    pub log: Vec<String>,
}

/// Apply the enabled steps in a fixed order: duplicates, missing values,
/// text normalization, IQR outliers. The input is left untouched.
#[must_use]
pub fn apply(table: &Table, options: &CleanOptions) -> Cleaned {
    let mut table = table.clone();
    let mut log = Vec::new();

    if options.remove_duplicates {
        let removed = remove_duplicates(&mut table);
        log.push(format!("Removed {removed} duplicate rows"));
    }

    if options.handle_missing {
        log.push(match options.missing_strategy {
            MissingStrategy::Drop => {
                let removed = drop_missing(&mut table);
                format!("Dropped {removed} rows with missing values")
            }
            MissingStrategy::FillMean => {
                fill_mean(&mut table);
                "Filled missing numeric values with mean".to_string()
            }
            MissingStrategy::FillMode => {
                fill_mode(&mut table);
                "Filled missing values with mode".to_string()
            }
        });
    }

    if options.standardize_text {
        standardize_text(&mut table);
        log.push("Standardized text columns".to_string());
    }

    if options.remove_outliers {
        let removed = remove_outliers(&mut table);
        log.push(format!("Removed {removed} outlier rows using IQR method"));
    }

    for line in &log {
        tracing::info!("{line}");
    }

    Cleaned { table, log }
}

fn remove_duplicates(table: &mut Table) -> usize {
    let before = table.n_rows();
    let mut seen = HashSet::new();
    table.retain_rows(|row| seen.insert(row_key(row)));
    before - table.n_rows()
}

fn drop_missing(table: &mut Table) -> usize {
    let before = table.n_rows();
    table.retain_rows(|row| row.iter().all(|v| !v.is_null()));
    before - table.n_rows()
}

fn fill_mean(table: &mut Table) {
    for col in table.numeric_columns() {
        let present: Vec<f64> = table.numeric_values(col).into_iter().flatten().collect();
        let Some(m) = mean(&present) else { continue };
        table.map_column(col, |v| match v {
            Value::Null => Value::Float(m),
            other => other.clone(),
        });
    }
}

fn fill_mode(table: &mut Table) {
    for col in 0..table.n_cols() {
        let fill = mode(table.column(col)).unwrap_or_else(|| Value::Text("Unknown".to_string()));
        table.map_column(col, |v| match v {
            Value::Null => fill.clone(),
            other => other.clone(),
        });
    }
}

/// Most frequent non-null value; ties resolve to the smallest value.
fn mode<'a, I>(values: I) -> Option<Value>
where
    I: Iterator<Item = &'a Value>,
{
    let mut counts: HashMap<String, (&'a Value, usize)> = HashMap::new();
    for value in values.filter(|v| !v.is_null()) {
        counts.entry(value.key()).or_insert((value, 0)).1 += 1;
    }
    counts
        .into_values()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.total_cmp(a.0)))
        .map(|(v, _)| v.clone())
}

fn standardize_text(table: &mut Table) {
    for col in table.text_columns() {
        table.map_column(col, |v| match v {
            Value::Text(s) => Value::Text(s.trim().to_lowercase()),
            other => other.clone(),
        });
    }
}

/// Bounds are recomputed on the rows that survived earlier columns.
fn remove_outliers(table: &mut Table) -> usize {
    let before = table.n_rows();
    for col in table.numeric_columns() {
        let mut present: Vec<f64> = table.numeric_values(col).into_iter().flatten().collect();
        present.sort_by(f64::total_cmp);
        let (Some(q1), Some(q3)) = (quantile(&present, 0.25), quantile(&present, 0.75)) else {
            continue;
        };
        let iqr = q3 - q1;
        let lower = q1 - IQR_FACTOR * iqr;
        let upper = q3 + IQR_FACTOR * iqr;
        table.retain_rows(|row| {
            row[col]
                .as_f64()
                .is_some_and(|v| v >= lower && v <= upper)
        });
    }
    before - table.n_rows()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnType;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table::from_text_rows(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_iqr_removes_single_outlier() {
        let t = table(&["v"], &[&["1"], &["2"], &["3"], &["4"], &["100"]]);
        let options = CleanOptions {
            remove_outliers: true,
            ..Default::default()
        };

        let cleaned = apply(&t, &options);
        let kept: Vec<_> = cleaned.table.column(0).cloned().collect();
        assert_eq!(
            kept,
            vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]
        );
        assert_eq!(cleaned.log, vec!["Removed 1 outlier rows using IQR method"]);
    }

    #[test]
    fn test_iqr_is_cumulative_across_columns() {
        // Column-independent bounds would keep the `13` row; after the
        // `a` outlier row is gone the `b` bounds collapse to [10, 10].
        let t = table(
            &["a", "b"],
            &[
                &["1", "10"],
                &["2", "10"],
                &["3", "10"],
                &["4", "10"],
                &["100", "50"],
                &["2", "13"],
            ],
        );
        let cleaned = apply(
            &t,
            &CleanOptions {
                remove_outliers: true,
                ..Default::default()
            },
        );
        assert_eq!(cleaned.table.n_rows(), 4);
        assert!(cleaned.table.column(1).all(|v| *v == Value::Int(10)));
    }

    #[test]
    fn test_duplicates_and_fill_mean() {
        let t = table(
            &["name", "age", "city"],
            &[
                &["ann", "20", "x"],
                &["bob", "30", "y"],
                &["ann", "20", "x"],
                &["cy", "", "z"],
                &["dee", "40", "w"],
            ],
        );
        let options = CleanOptions {
            remove_duplicates: true,
            handle_missing: true,
            missing_strategy: MissingStrategy::FillMean,
            ..Default::default()
        };

        let cleaned = apply(&t, &options);
        assert_eq!(cleaned.table.n_rows(), 4);
        assert_eq!(cleaned.table.missing_count(), 0);
        assert_eq!(cleaned.table.column_type(1), ColumnType::Float);
        assert_eq!(cleaned.table.rows()[2][1], Value::Float(30.0));
        assert_eq!(
            cleaned.log,
            vec![
                "Removed 1 duplicate rows",
                "Filled missing numeric values with mean"
            ]
        );
    }

    #[test]
    fn test_drop_missing() {
        let t = table(&["a", "b"], &[&["1", "x"], &["", "y"], &["3", ""]]);
        let cleaned = apply(
            &t,
            &CleanOptions {
                handle_missing: true,
                ..Default::default()
            },
        );
        assert_eq!(cleaned.table.n_rows(), 1);
        assert_eq!(cleaned.log, vec!["Dropped 2 rows with missing values"]);
    }

    #[test]
    fn test_fill_mode_prefers_smallest_on_tie() {
        let t = table(
            &["dept", "n", "empty"],
            &[&["it", "2", ""], &["hr", "1", ""], &["", "", ""]],
        );
        let cleaned = apply(
            &t,
            &CleanOptions {
                handle_missing: true,
                missing_strategy: MissingStrategy::FillMode,
                ..Default::default()
            },
        );
        let last = &cleaned.table.rows()[2];
        assert_eq!(last[0], Value::Text("hr".to_string()));
        assert_eq!(last[1], Value::Int(1));
        assert_eq!(last[2], Value::Text("Unknown".to_string()));
    }

    #[test]
    fn test_standardize_text() {
        let t = table(&["name", "n"], &[&["  Alice ", "1"], &["BOB", "2"]]);
        let cleaned = apply(
            &t,
            &CleanOptions {
                standardize_text: true,
                ..Default::default()
            },
        );
        assert_eq!(cleaned.table.rows()[0][0], Value::Text("alice".to_string()));
        assert_eq!(cleaned.table.rows()[1][0], Value::Text("bob".to_string()));
        assert_eq!(cleaned.table.rows()[1][1], Value::Int(2));
    }

    #[test]
    fn test_apply_is_deterministic() {
        let t = table(
            &["a", "b"],
            &[&["1", " X"], &["1", " X"], &["", "y"], &["50", "z"], &["2", "w"]],
        );
        let options = CleanOptions {
            remove_duplicates: true,
            handle_missing: true,
            missing_strategy: MissingStrategy::FillMode,
            standardize_text: true,
            remove_outliers: true,
        };
        let first = apply(&t, &options);
        let second = apply(&t, &options);
        assert_eq!(first.table, second.table);
        assert_eq!(first.log, second.log);
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(
            "fill_mode".parse::<MissingStrategy>().unwrap(),
            MissingStrategy::FillMode
        );
        assert!("median".parse::<MissingStrategy>().is_err());
    }
}
