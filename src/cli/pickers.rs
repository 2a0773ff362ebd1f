use std::fmt;

use chrono::{DateTime, Utc};
use inquire::{InquireError, Select};

use crate::store::Store;
use crate::types::DatasetSummary;

/// Dataset catalog entry for display
pub struct DatasetDisplay {
    pub dataset: DatasetSummary,
}

impl fmt::Display for DatasetDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {}  {}x{} {}  uploaded {}",
            self.dataset.id,
            self.dataset.name,
            self.dataset.row_count,
            self.dataset.column_count,
            self.dataset.file_type,
            format_relative_time(&self.dataset.uploaded_at)
        )
    }
}

/// Format a datetime as relative time (e.g., "2 hours ago", "3 days ago")
#[must_use]
pub fn format_relative_time(dt: &DateTime<Utc>) -> String {
    let diff = Utc::now().signed_duration_since(*dt);

    if diff.num_seconds() < 0 {
        return "in the future".to_string();
    }
    if diff.num_seconds() < 60 {
        return "just now".to_string();
    }

    let (count, unit) = if diff.num_minutes() < 60 {
        (diff.num_minutes(), "minute")
    } else if diff.num_hours() < 24 {
        (diff.num_hours(), "hour")
    } else if diff.num_days() < 30 {
        (diff.num_days(), "day")
    } else if diff.num_days() < 365 {
        (diff.num_days() / 30, "month")
    } else {
        (diff.num_days() / 365, "year")
    };

    if count == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}

/// Pick a dataset from the catalog, newest first
pub fn pick_dataset(store: &dyn Store, owner_email: &str) -> anyhow::Result<Option<i64>> {
    let datasets: Vec<DatasetDisplay> = store
        .search_datasets("", owner_email)?
        .into_iter()
        .map(|dataset| DatasetDisplay { dataset })
        .collect();

    if datasets.is_empty() {
        println!("No datasets found.");
        return Ok(None);
    }

    let selection = Select::new("Select dataset:", datasets)
        .with_page_size(15)
        .with_help_message("Type to filter, Enter to select")
        .with_vim_mode(true)
        .prompt();

    match selection {
        Ok(display) => Ok(Some(display.dataset.id)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Use `id` when given, otherwise prompt for one unless non-interactive
pub fn resolve_dataset(
    store: &dyn Store,
    id: Option<i64>,
    non_interactive: bool,
) -> anyhow::Result<Option<i64>> {
    match id {
        Some(id) => Ok(Some(id)),
        None if non_interactive => {
            anyhow::bail!("a dataset ID is required in non-interactive mode")
        }
        None => pick_dataset(store, ""),
    }
}

/// Confirm a destructive action. Returns Ok(true) if confirmed.
pub fn confirm_action(message: &str, yes: bool, non_interactive: bool) -> anyhow::Result<bool> {
    if yes {
        Ok(true)
    } else if non_interactive {
        anyhow::bail!("--yes is required for destructive operations in non-interactive mode");
    } else {
        Ok(inquire::Confirm::new(message)
            .with_default(false)
            .prompt()?)
    }
}
