use std::collections::HashMap;

use serde::Serialize;

use super::stats::{mean, quantile, sample_std, sorted_present};
use super::{ColumnType, Table};

const TOP_VALUES: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct DataSummary {
    pub rows: usize,
    pub columns: usize,
    pub missing_values: usize,
    pub duplicate_rows: usize,
    pub estimated_bytes: i64,
    pub column_profiles: Vec<ColumnProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub dtype: ColumnType,
    pub missing: usize,
    pub unique: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub top_values: Vec<(String, usize)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std: Option<f64>,
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
}

impl Table {
    /// Shape, types, missing values and per-column descriptions.
    #[must_use]
    pub fn summary(&self) -> DataSummary {
        let column_profiles = (0..self.n_cols()).map(|i| self.profile_column(i)).collect();
        DataSummary {
            rows: self.n_rows(),
            columns: self.n_cols(),
            missing_values: self.missing_count(),
            duplicate_rows: self.duplicate_count(),
            estimated_bytes: self.estimated_size().unwrap_or(0),
            column_profiles,
        }
    }

    fn profile_column(&self, idx: usize) -> ColumnProfile {
        let dtype = self.column_type(idx);
        let mut counts: HashMap<String, (String, usize)> = HashMap::new();
        let mut missing = 0;
        for value in self.column(idx) {
            if value.is_null() {
                missing += 1;
                continue;
            }
            counts
                .entry(value.key())
                .or_insert_with(|| (value.to_string(), 0))
                .1 += 1;
        }

        let numeric = if dtype.is_numeric() {
            describe(&sorted_present(&self.numeric_values(idx)))
        } else {
            None
        };

        let top_values = if dtype == ColumnType::Text {
            let mut ranked: Vec<(String, usize)> = counts.values().cloned().collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            ranked.truncate(TOP_VALUES);
            ranked
        } else {
            Vec::new()
        };

        ColumnProfile {
            name: self.headers[idx].clone(),
            dtype,
            missing,
            unique: counts.len(),
            numeric,
            top_values,
        }
    }
}

fn describe(sorted: &[f64]) -> Option<NumericSummary> {
    Some(NumericSummary {
        count: sorted.len(),
        mean: mean(sorted)?,
        std: sample_std(sorted),
        min: *sorted.first()?,
        p25: quantile(sorted, 0.25)?,
        p50: quantile(sorted, 0.5)?,
        p75: quantile(sorted, 0.75)?,
        max: *sorted.last()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_profiles_columns() {
        let table = Table::from_text_rows(
            vec!["dept".into(), "salary".into()],
            vec![
                vec!["IT".into(), "10".into()],
                vec!["IT".into(), "20".into()],
                vec!["HR".into(), "".into()],
            ],
        );

        let summary = table.summary();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.missing_values, 1);

        let dept = &summary.column_profiles[0];
        assert_eq!(dept.dtype, ColumnType::Text);
        assert_eq!(dept.unique, 2);
        assert_eq!(dept.top_values[0], ("IT".to_string(), 2));

        let salary = summary.column_profiles[1].numeric.as_ref().unwrap();
        assert_eq!(salary.count, 2);
        assert_eq!(salary.mean, 15.0);
        assert_eq!(salary.p50, 15.0);
    }
}
