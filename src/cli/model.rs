use serde_json::json;

use crate::ml::{self, Metrics, ModelKind, ModelReport};

use super::CliContext;

fn print_report(report: &ModelReport) {
    println!();
    println!("Model:     {}", report.model);
    if let Some(target) = &report.target {
        println!("Target:    {target}");
    }
    println!("Features:  {}", report.features.join(", "));
    println!(
        "Rows:      {} train, {} test",
        report.train_rows, report.test_rows
    );
    println!("{}", "─".repeat(20));

    match &report.metrics {
        Metrics::Regression(m) => {
            println!("MSE:   {:.4}", m.mse);
            println!("RMSE:  {:.4}", m.rmse);
            println!("MAE:   {:.4}", m.mae);
            println!("R²:    {:.4}", m.r2);
        }
        Metrics::Classification(m) => {
            println!("Accuracy:   {:.4}", m.accuracy);
            println!("Precision:  {:.4}", m.precision);
            println!("Recall:     {:.4}", m.recall);
            println!("F1:         {:.4}", m.f1);
        }
        Metrics::Clustering(m) => {
            println!("Inertia:  {:.4}", m.inertia);
            let sizes: Vec<String> = m.cluster_sizes.iter().map(ToString::to_string).collect();
            println!("Sizes:    {}", sizes.join(", "));
        }
    }

    if let Some(ols) = &report.ols {
        println!();
        println!("OLS fit on all {} rows", ols.observations);
        println!("  intercept  {:.6}", ols.intercept);
        for c in &ols.coefficients {
            println!("  {:<10} {:.6}", c.feature, c.value);
        }
        println!("  R²         {:.4}", ols.r_squared);
        if let Some(adj) = ols.adj_r_squared {
            println!("  adj. R²    {adj:.4}");
        }
        if let (Some(f), Some(p)) = (ols.f_statistic, ols.p_value) {
            println!("  F          {f:.4} (p = {p:.4})");
        }
    }
    println!();
}

pub fn run_model_fit(
    ctx: &CliContext,
    id: i64,
    model: ModelKind,
    target: Option<String>,
    features: Vec<String>,
    json: bool,
) -> anyhow::Result<()> {
    let ws = ctx.workspace()?;
    let (_, table) = ws.dataset(id)?;
    let report = ml::fit_and_score(&table, target.as_deref(), &features, model)?;

    ws.record(
        id,
        "model",
        json!({
            "model": model,
            "target": target,
            "features": features,
            "metrics": report.metrics,
        }),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

pub fn run_model_auto(ctx: &CliContext, id: i64, json: bool) -> anyhow::Result<()> {
    let ws = ctx.workspace()?;
    let (_, table) = ws.dataset(id)?;
    let report = ml::auto_run(&table);

    if report.results.is_empty() {
        anyhow::bail!("Dataset {id} needs at least two numeric columns for an automatic run");
    }

    ws.record(
        id,
        "auto_model",
        json!({ "best_model": report.best_model, "best_score": report.best_score }),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(
        "Target:    {}",
        report.target.as_deref().unwrap_or_default()
    );
    println!("Features:  {}", report.features.join(", "));
    println!("{}", "─".repeat(20));
    for entry in &report.results {
        match (&entry.metrics, &entry.error) {
            (Some(m), _) => println!(
                "{:<24} R² {:>8.4}  RMSE {:>10.4}",
                entry.model.as_str(),
                m.r2,
                m.rmse
            ),
            (None, Some(e)) => println!("{:<24} failed: {e}", entry.model.as_str()),
            (None, None) => println!("{:<24} no result", entry.model.as_str()),
        }
    }
    println!();
    match report.best_model {
        Some(best) => println!("Best model: {best} (R² {:.4})", report.best_score),
        None => println!("No model reached a positive R²."),
    }
    println!();
    Ok(())
}

pub fn run_model_predict(
    ctx: &CliContext,
    id: i64,
    model: ModelKind,
    target: Option<String>,
    features: Vec<String>,
    name: Option<String>,
) -> anyhow::Result<()> {
    let ws = ctx.workspace()?;
    let saved = ws.save_predictions(id, model, target.as_deref(), &features, name.as_deref())?;

    println!(
        "Saved predictions from {model} as dataset {} ({} rows, {} columns)",
        saved.id, saved.rows, saved.columns
    );
    Ok(())
}

fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"))
}

pub fn run_model_ab_test(
    ctx: &CliContext,
    id: i64,
    channel: Option<String>,
    subsegment: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let ws = ctx.workspace()?;
    let (_, table) = ws.dataset(id)?;
    let report = ml::ab_test(&table, channel.as_deref(), subsegment.as_deref())?;

    ws.record(
        id,
        "ab_test",
        json!({
            "channel": channel,
            "subsegment": subsegment,
            "segments": report.results.len(),
        }),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.results.is_empty() {
        println!("No segment has both control and personalization rows.");
        return Ok(());
    }

    println!();
    println!(
        "{:<16} {:>9} {:>9} {:>9} {:>8} {:>8}",
        "SEGMENT", "CONTROL", "PERSONAL", "LIFT", "T", "P"
    );
    println!("{}", "─".repeat(64));
    for r in &report.results {
        println!(
            "{:<16} {:>9} {:>9} {:>9} {:>8} {:>8}",
            r.segment.as_deref().unwrap_or("all"),
            r.control_count,
            r.personalization_count,
            format_optional(r.lift),
            format_optional(r.t_statistic),
            format_optional(r.p_value),
        );
    }
    println!();
    Ok(())
}
