use serde::Serialize;

use crate::types::StoreStatistics;

use super::CliContext;

#[derive(Serialize)]
struct StoreInfo {
    database: String,
    #[serde(flatten)]
    statistics: StoreStatistics,
}

pub fn run_stats(ctx: &CliContext, json: bool) -> anyhow::Result<()> {
    let ws = ctx.workspace()?;
    let statistics = ws.store().statistics()?;

    if json {
        let info = StoreInfo {
            database: ws.config().db_path().display().to_string(),
            statistics,
        };
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!();
    println!("DWAP Store Status");
    println!("{}", "─".repeat(20));
    println!("Database:        {}", ws.config().db_path().display());
    println!("Datasets:        {}", statistics.total_datasets);
    println!("Total size:      {} bytes", statistics.total_size_bytes);
    println!("Recent uploads:  {} (last 7 days)", statistics.recent_uploads);
    if !statistics.datasets_by_type.is_empty() {
        println!("By type:");
        for (file_type, count) in &statistics.datasets_by_type {
            println!("  {file_type:<8} {count}");
        }
    }
    println!();

    Ok(())
}
