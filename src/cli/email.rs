use crate::notify::ExportFormat;

use super::CliContext;
use super::pickers::resolve_dataset;

pub fn run_email(
    ctx: &CliContext,
    id: Option<i64>,
    to: String,
    format: ExportFormat,
    analysis: bool,
    non_interactive: bool,
) -> anyhow::Result<()> {
    let ws = ctx.workspace()?;
    let Some(id) = resolve_dataset(ws.store(), id, non_interactive)? else {
        return Ok(());
    };

    if analysis {
        ws.email_analysis(id, &to)?;
        println!("Sent analysis report for dataset {id} to {to}");
    } else {
        ws.email_dataset(id, &to, format)?;
        println!("Sent dataset {id} as {format} to {to}");
    }
    Ok(())
}
