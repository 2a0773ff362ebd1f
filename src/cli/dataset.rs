use std::fs;
use std::iter;
use std::path::PathBuf;

use serde_json::json;

use crate::config::{AppConfig, CONFIG_FILE};
use crate::error::Error;
use crate::notify::{self, ExportFormat};
use crate::store::{SqliteStore, Store};
use crate::table::Table;
use crate::types::parse_tags;
use crate::workspace::ImportRequest;

use super::commands::{CleanArgs, ImportArgs};
use super::pickers::{confirm_action, format_relative_time, resolve_dataset};
use super::CliContext;

const MAX_CELL_WIDTH: usize = 24;

fn truncate(s: &str) -> String {
    if s.chars().count() > MAX_CELL_WIDTH {
        let mut out: String = s.chars().take(MAX_CELL_WIDTH - 1).collect();
        out.push('…');
        out
    } else {
        s.to_string()
    }
}

/// Print the first `limit` rows as aligned columns.
pub(super) fn print_rows(table: &Table, limit: usize) {
    let headers: Vec<String> = table.headers().iter().map(|h| truncate(h)).collect();
    let cells: Vec<Vec<String>> = table
        .rows()
        .iter()
        .take(limit)
        .map(|row| row.iter().map(|v| truncate(&v.to_string())).collect())
        .collect();

    let widths: Vec<usize> = (0..headers.len())
        .map(|c| {
            cells
                .iter()
                .map(|row| row[c].chars().count())
                .chain(iter::once(headers[c].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |row: &[String]| {
        row.iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("{}", line(&headers));
    println!(
        "{}",
        widths
            .iter()
            .map(|&w| "─".repeat(w))
            .collect::<Vec<_>>()
            .join("  ")
    );
    for row in &cells {
        println!("{}", line(row));
    }
    if table.n_rows() > limit {
        println!("… {} more rows", table.n_rows() - limit);
    }
}

pub fn run_init(ctx: &CliContext) -> anyhow::Result<()> {
    fs::create_dir_all(&ctx.data_dir)?;

    let config = AppConfig {
        data_dir: ctx.data_dir.clone(),
        ..Default::default()
    };
    let db_path = config.db_path();
    let existed = db_path.exists();

    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    let config_path = ctx.data_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        fs::write(&config_path, toml::to_string_pretty(&config)?)?;
        println!("Wrote default configuration to {}", config_path.display());
    }

    if existed {
        println!("Database already initialized at {}", db_path.display());
    } else {
        println!("Initialized database at {}", db_path.display());
    }
    Ok(())
}

pub fn run_import(ctx: &CliContext, args: ImportArgs) -> anyhow::Result<()> {
    let ws = ctx.workspace()?;
    let request = ImportRequest {
        name: args.name,
        description: args.description,
        tags: parse_tags(&args.tags),
        clean: Some(args.clean.options()),
    };

    let imported = match ws.import_file(&args.file, request) {
        Err(Error::DuplicateContent { existing_id }) => {
            anyhow::bail!(
                "{} has the same content as dataset {existing_id}",
                args.file.display()
            );
        }
        other => other?,
    };

    println!(
        "Imported dataset {} ({} rows, {} columns)",
        imported.id, imported.rows, imported.columns
    );
    for line in &imported.processing_log {
        println!("  - {line}");
    }

    if let Some(recipient) = args.notify {
        let text = format!(
            "{} was stored as dataset {} with {} rows and {} columns.",
            args.file.display(),
            imported.id,
            imported.rows,
            imported.columns
        );
        match ws.notify(&recipient, "Dataset imported", &text) {
            Ok(()) => println!("Notified {recipient}"),
            Err(e) => eprintln!("warning: could not notify {recipient}: {e}"),
        }
    }
    Ok(())
}

pub fn run_clean(
    ctx: &CliContext,
    id: i64,
    clean: CleanArgs,
    name: Option<String>,
) -> anyhow::Result<()> {
    let ws = ctx.workspace()?;
    let saved = ws.clean_dataset(id, &clean.options(), name.as_deref())?;

    println!(
        "Saved cleaned copy of dataset {id} as dataset {} ({} rows, {} columns)",
        saved.id, saved.rows, saved.columns
    );
    for line in &saved.processing_log {
        println!("  - {line}");
    }
    Ok(())
}

pub fn run_search(
    ctx: &CliContext,
    query: Option<String>,
    owner: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let ws = ctx.workspace()?;
    let results = ws
        .store()
        .search_datasets(query.as_deref().unwrap_or(""), owner.as_deref().unwrap_or(""))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No datasets found.");
        return Ok(());
    }
    for d in &results {
        println!(
            "{:>4}  {}  {}x{}  {}  {}",
            d.id,
            d.name,
            d.row_count,
            d.column_count,
            d.file_type,
            format_relative_time(&d.uploaded_at)
        );
        if !d.tags.is_empty() {
            println!("      tags: {}", d.tags.join(", "));
        }
    }
    Ok(())
}

pub fn run_show(ctx: &CliContext, id: i64, rows: usize, json: bool) -> anyhow::Result<()> {
    let ws = ctx.workspace()?;
    let (record, table) = ws.dataset(id)?;

    if json {
        let preview: Vec<Vec<String>> = table
            .rows()
            .iter()
            .take(rows)
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect();
        let out = json!({
            "dataset": record,
            "columns": table.headers(),
            "rows": preview,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("Dataset {}: {}", record.id, record.name);
    println!("{}", "─".repeat(20));
    if !record.description.is_empty() {
        println!("Description: {}", record.description);
    }
    println!("Owner:       {}", record.owner_email);
    println!(
        "Uploaded:    {} ({})",
        record.uploaded_at.format("%Y-%m-%d %H:%M:%S"),
        format_relative_time(&record.uploaded_at)
    );
    println!("Type:        {}", record.file_type);
    println!(
        "Shape:       {} rows x {} columns, {} bytes",
        record.row_count, record.column_count, record.size_bytes
    );
    if !record.tags.is_empty() {
        println!("Tags:        {}", record.tags.join(", "));
    }
    if !record.processing_log.is_empty() {
        println!("Processing:");
        for line in &record.processing_log {
            println!("  - {line}");
        }
    }
    println!();
    print_rows(&table, rows);
    println!();
    Ok(())
}

pub fn run_history(ctx: &CliContext, id: i64, json: bool) -> anyhow::Result<()> {
    let ws = ctx.workspace()?;
    if ws.store().get_dataset(id)?.is_none() {
        anyhow::bail!("Dataset {id} not found");
    }
    let history = ws.store().get_history(id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    if history.is_empty() {
        println!("No history recorded for dataset {id}.");
        return Ok(());
    }
    for entry in &history {
        let actor = if entry.actor_email.is_empty() {
            "-"
        } else {
            entry.actor_email.as_str()
        };
        println!(
            "{}  {:<8}  {}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.operation,
            actor,
            entry.parameters
        );
    }
    Ok(())
}

pub fn run_delete(
    ctx: &CliContext,
    id: Option<i64>,
    yes: bool,
    non_interactive: bool,
) -> anyhow::Result<()> {
    let ws = ctx.workspace()?;
    let Some(id) = resolve_dataset(ws.store(), id, non_interactive)? else {
        return Ok(());
    };

    let Some(record) = ws.store().get_dataset(id)? else {
        anyhow::bail!("Dataset {id} not found");
    };

    let message = format!(
        "Delete dataset {} '{}' and its history? This cannot be undone.",
        record.id, record.name
    );
    if !confirm_action(&message, yes, non_interactive)? {
        println!("Cancelled.");
        return Ok(());
    }

    if ws.store().delete_dataset(id)? {
        println!("Deleted dataset {id}");
    } else {
        anyhow::bail!("Dataset {id} not found");
    }
    Ok(())
}

pub fn run_profile(ctx: &CliContext, id: i64, json: bool) -> anyhow::Result<()> {
    let ws = ctx.workspace()?;
    let (record, table) = ws.dataset(id)?;
    let summary = table.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("Profile of dataset {}: {}", record.id, record.name);
    println!("{}", "─".repeat(20));
    println!("Rows:            {}", summary.rows);
    println!("Columns:         {}", summary.columns);
    println!("Missing values:  {}", summary.missing_values);
    println!("Duplicate rows:  {}", summary.duplicate_rows);
    println!("Estimated size:  {} bytes", summary.estimated_bytes);
    println!();

    for col in &summary.column_profiles {
        println!(
            "{} ({}): {} missing, {} unique",
            col.name, col.dtype, col.missing, col.unique
        );
        if let Some(n) = &col.numeric {
            let std = n.std.map_or_else(|| "n/a".to_string(), |s| format!("{s:.4}"));
            println!(
                "    mean {:.4}  std {}  min {}  25% {}  50% {}  75% {}  max {}",
                n.mean, std, n.min, n.p25, n.p50, n.p75, n.max
            );
        }
        if !col.top_values.is_empty() {
            let top: Vec<String> = col
                .top_values
                .iter()
                .map(|(value, count)| format!("{value} ({count})"))
                .collect();
            println!("    top: {}", top.join(", "));
        }
    }
    println!();
    Ok(())
}

pub fn run_export(
    ctx: &CliContext,
    id: i64,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let ws = ctx.workspace()?;
    let (record, table) = ws.dataset(id)?;

    let file = notify::export(&table, format, &record.name)?;
    let path = output.unwrap_or_else(|| PathBuf::from(&file.file_name));
    fs::write(&path, &file.bytes)?;

    ws.record(
        id,
        "export",
        json!({ "format": format.as_str(), "path": path.display().to_string() }),
    );
    println!("Exported dataset {id} to {}", path.display());
    Ok(())
}
