//! Control vs. personalization conversion comparison.
//!
//! Rows need a `variant` column holding `control` or `personalization` and a
//! `converted` outcome (numbers, or `true`/`false` text). When the table has a
//! `user_id` column each user counts once per variant, with their best
//! outcome.

use std::collections::BTreeMap;

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{Error, Result};
use crate::table::{Table, Value, mean};

pub const VARIANT_COLUMN: &str = "variant";
pub const CONVERTED_COLUMN: &str = "converted";
pub const CHANNEL_COLUMN: &str = "marketing_channel";
pub const USER_COLUMN: &str = "user_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Group {
    Control,
    Personalization,
}

impl Group {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Text(s) if s.trim() == "control" => Some(Group::Control),
            Value::Text(s) if s.trim() == "personalization" => Some(Group::Personalization),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AbTestReport {
    pub channel: Option<String>,
    pub subsegment: Option<String>,
    pub results: Vec<AbTestResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AbTestResult {
    /// Subsegment value, absent for the overall comparison.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<String>,
    /// Relative change of the personalization mean over control. Undefined
    /// when control never converts.
    pub lift: Option<f64>,
    /// Pooled-variance two-sample t test of control against personalization.
    pub t_statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub control_count: usize,
    pub personalization_count: usize,
}

#[derive(Clone, Copy)]
struct Columns {
    variant: usize,
    converted: usize,
    user: Option<usize>,
}

fn outcome(value: &Value) -> Option<f64> {
    match value {
        Value::Text(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(1.0),
            "false" | "no" => Some(0.0),
            _ => None,
        },
        other => other.as_f64(),
    }
}

/// Outcomes per group, deduplicated per user when a user column exists.
fn group_outcomes(rows: &[&[Value]], cols: Columns) -> (Vec<f64>, Vec<f64>) {
    let mut control = Vec::new();
    let mut personalization = Vec::new();
    let mut push = |group: Group, value: f64| match group {
        Group::Control => control.push(value),
        Group::Personalization => personalization.push(value),
    };

    match cols.user {
        Some(user) => {
            let mut best: BTreeMap<(String, Group), f64> = BTreeMap::new();
            for row in rows {
                if row[user].is_null() {
                    continue;
                }
                let (Some(group), Some(value)) =
                    (Group::of(&row[cols.variant]), outcome(&row[cols.converted]))
                else {
                    continue;
                };
                let slot = best.entry((row[user].key(), group)).or_insert(value);
                *slot = slot.max(value);
            }
            for ((_, group), value) in best {
                push(group, value);
            }
        }
        None => {
            for row in rows {
                if let (Some(group), Some(value)) =
                    (Group::of(&row[cols.variant]), outcome(&row[cols.converted]))
                {
                    push(group, value);
                }
            }
        }
    }
    (control, personalization)
}

fn sum_squares(values: &[f64], m: f64) -> f64 {
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>()
}

/// Student's t test with pooled variance, as `(t, two-sided p)`.
fn t_test(a: &[f64], b: &[f64]) -> (Option<f64>, Option<f64>) {
    let (Some(ma), Some(mb)) = (mean(a), mean(b)) else {
        return (None, None);
    };
    let df = (a.len() + b.len()) as f64 - 2.0;
    if df <= 0.0 {
        return (None, None);
    }
    let pooled = (sum_squares(a, ma) + sum_squares(b, mb)) / df;
    let se = (pooled * (1.0 / a.len() as f64 + 1.0 / b.len() as f64)).sqrt();
    if se == 0.0 || !se.is_finite() {
        return (None, None);
    }

    let t = (ma - mb) / se;
    let p = StudentsT::new(0.0, 1.0, df)
        .ok()
        .map(|dist| (2.0 * dist.sf(t.abs())).min(1.0));
    (Some(t), p)
}

fn compare(rows: &[&[Value]], cols: Columns, segment: Option<String>) -> AbTestResult {
    let (control, personalization) = group_outcomes(rows, cols);
    let lift = match (mean(&control), mean(&personalization)) {
        (Some(c), Some(p)) if c != 0.0 => Some((p - c) / c),
        _ => None,
    };
    let (t_statistic, p_value) = t_test(&control, &personalization);

    AbTestResult {
        segment,
        lift,
        t_statistic,
        p_value,
        control_count: control.len(),
        personalization_count: personalization.len(),
    }
}

/// Compare conversion between the control and personalization variants,
/// optionally restricted to one marketing channel. With `subsegment`, one
/// result is reported per distinct value of that column that has both
/// groups.
pub fn ab_test(
    table: &Table,
    channel: Option<&str>,
    subsegment: Option<&str>,
) -> Result<AbTestReport> {
    let (Some(variant), Some(converted)) = (
        table.column_index(VARIANT_COLUMN),
        table.column_index(CONVERTED_COLUMN),
    ) else {
        return Err(Error::Validation(format!(
            "required columns '{VARIANT_COLUMN}' and '{CONVERTED_COLUMN}' missing"
        )));
    };
    let cols = Columns {
        variant,
        converted,
        user: table.column_index(USER_COLUMN),
    };

    let channel_filter = match channel {
        Some(wanted) => Some((table.require_column(CHANNEL_COLUMN)?, wanted)),
        None => None,
    };
    let rows: Vec<&[Value]> = table
        .rows()
        .iter()
        .map(Vec::as_slice)
        .filter(|row| match channel_filter {
            Some((col, wanted)) => row[col].to_string() == wanted,
            None => true,
        })
        .collect();

    let results = match subsegment {
        None => {
            let result = compare(&rows, cols, None);
            if result.control_count == 0 || result.personalization_count == 0 {
                return Err(Error::Validation(
                    "control or personalization group missing".to_string(),
                ));
            }
            vec![result]
        }
        Some(name) => {
            let col = table.require_column(name)?;
            let mut segments: Vec<Value> = Vec::new();
            for value in table.column(col) {
                if !value.is_null() && !segments.contains(value) {
                    segments.push(value.clone());
                }
            }
            segments.sort_by(Value::total_cmp);

            segments
                .iter()
                .filter_map(|segment| {
                    let subset: Vec<&[Value]> =
                        rows.iter().copied().filter(|row| &row[col] == segment).collect();
                    let result = compare(&subset, cols, Some(segment.to_string()));
                    (result.control_count > 0 && result.personalization_count > 0)
                        .then_some(result)
                })
                .collect()
        }
    };

    tracing::debug!("A/B test produced {} result(s)", results.len());
    Ok(AbTestReport {
        channel: channel.map(str::to_string),
        subsegment: subsegment.map(str::to_string),
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table::from_text_rows(strings(headers), rows.iter().map(|r| strings(r)).collect())
    }

    #[test]
    fn test_lift_and_t_test() {
        let t = table(
            &["variant", "converted"],
            &[
                &["control", "0"],
                &["control", "1"],
                &["control", "0"],
                &["control", "0"],
                &["personalization", "1"],
                &["personalization", "1"],
                &["personalization", "0"],
                &["personalization", "1"],
            ],
        );

        let report = ab_test(&t, None, None).unwrap();
        assert_eq!(report.results.len(), 1);
        let r = &report.results[0];
        assert_eq!(r.control_count, 4);
        assert_eq!(r.personalization_count, 4);
        assert!((r.lift.unwrap() - 2.0).abs() < 1e-9);

        // means 0.25 and 0.75, both sample variances 0.25, six degrees of freedom
        let stat = r.t_statistic.unwrap();
        assert!((stat + 2f64.sqrt()).abs() < 1e-9);
        let dist = StudentsT::new(0.0, 1.0, 6.0).unwrap();
        let p = r.p_value.unwrap();
        assert!((p - 2.0 * dist.sf(2f64.sqrt())).abs() < 1e-12);
        assert!(p > 0.2 && p < 0.22);
    }

    #[test]
    fn test_users_count_once_with_best_outcome() {
        let t = table(
            &["user_id", "variant", "converted"],
            &[
                &["u1", "control", "False"],
                &["u1", "control", "True"],
                &["u2", "control", "False"],
                &["u3", "personalization", "True"],
                &["u4", "personalization", "True"],
                &["u4", "personalization", "False"],
            ],
        );

        let r = &ab_test(&t, None, None).unwrap().results[0];
        assert_eq!(r.control_count, 2);
        assert_eq!(r.personalization_count, 2);
        assert!((r.lift.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_channel_filter_and_subsegments() {
        let t = table(
            &["marketing_channel", "age_group", "variant", "converted"],
            &[
                &["Email", "young", "control", "0"],
                &["Email", "young", "control", "1"],
                &["Email", "young", "personalization", "1"],
                &["Email", "young", "personalization", "1"],
                &["Email", "old", "control", "1"],
                &["Ads", "old", "personalization", "1"],
                &["Ads", "young", "control", "0"],
            ],
        );

        let report = ab_test(&t, Some("Email"), Some("age_group")).unwrap();
        assert_eq!(report.results.len(), 1);
        let r = &report.results[0];
        assert_eq!(r.segment.as_deref(), Some("young"));
        assert_eq!(r.control_count, 2);
        assert!((r.lift.unwrap() - 1.0).abs() < 1e-9);

        let all = ab_test(&t, None, Some("age_group")).unwrap();
        let segments: Vec<_> = all.results.iter().map(|r| r.segment.clone()).collect();
        assert_eq!(segments, vec![Some("old".to_string()), Some("young".to_string())]);
    }

    #[test]
    fn test_degenerate_groups() {
        let t = table(
            &["variant", "converted"],
            &[&["control", "0"], &["personalization", "1"]],
        );
        let r = &ab_test(&t, None, None).unwrap().results[0];
        assert!(r.lift.is_none());
        assert!(r.t_statistic.is_none());
        assert!(r.p_value.is_none());
    }

    #[test]
    fn test_missing_inputs_rejected() {
        let no_variant = table(&["converted"], &[&["1"]]);
        assert!(matches!(ab_test(&no_variant, None, None), Err(Error::Validation(_))));

        let control_only = table(&["variant", "converted"], &[&["control", "1"]]);
        assert!(matches!(ab_test(&control_only, None, None), Err(Error::Validation(_))));

        let no_channel = table(&["variant", "converted"], &[&["control", "1"]]);
        assert!(ab_test(&no_channel, Some("Email"), None).is_err());
    }
}
