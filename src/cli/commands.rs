use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::cleaner::{CleanOptions, MissingStrategy};
use crate::ml::ModelKind;

/// Cleaning steps shared by `import` and `clean`.
#[derive(Args, Debug, Clone, Default)]
pub struct CleanArgs {
    /// Drop repeated rows, keeping the first occurrence
    #[arg(long)]
    pub remove_duplicates: bool,

    /// Handle missing values using --missing-strategy
    #[arg(long)]
    pub handle_missing: bool,

    /// How to handle missing values (drop, fill_mean, fill_mode)
    #[arg(long, default_value = "drop")]
    pub missing_strategy: MissingStrategy,

    /// Trim and lowercase text columns
    #[arg(long)]
    pub standardize_text: bool,

    /// Drop rows outside 1.5 IQR in any numeric column
    #[arg(long)]
    pub remove_outliers: bool,
}

impl CleanArgs {
    pub fn options(&self) -> CleanOptions {
        CleanOptions {
            remove_duplicates: self.remove_duplicates,
            handle_missing: self.handle_missing,
            missing_strategy: self.missing_strategy,
            standardize_text: self.standardize_text,
            remove_outliers: self.remove_outliers,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// File to load (csv, json or txt)
    pub file: PathBuf,

    /// Dataset name (defaults to the file name)
    #[arg(long)]
    pub name: Option<String>,

    /// Free-text description
    #[arg(long, default_value = "")]
    pub description: String,

    /// Tags (comma-separated)
    #[arg(long, default_value = "")]
    pub tags: String,

    #[command(flatten)]
    pub clean: CleanArgs,

    /// Send a notification to this address once the import is stored
    #[arg(long)]
    pub notify: Option<String>,
}

#[derive(Subcommand)]
pub enum ModelCommands {
    /// Fit a model on an 80/20 split and report held-out metrics
    Fit {
        /// Dataset ID
        id: i64,

        /// Model to fit
        #[arg(long)]
        model: ModelKind,

        /// Target column (not used by kmeans)
        #[arg(long)]
        target: Option<String>,

        /// Numeric feature columns (comma-separated)
        #[arg(long, value_delimiter = ',', required = true)]
        features: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run every regressor with the last numeric column as target
    Auto {
        /// Dataset ID
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fit on all rows and save a copy with a Predictions column
    Predict {
        /// Dataset ID
        id: i64,

        /// Model to fit
        #[arg(long)]
        model: ModelKind,

        /// Target column (not used by kmeans)
        #[arg(long)]
        target: Option<String>,

        /// Numeric feature columns (comma-separated)
        #[arg(long, value_delimiter = ',', required = true)]
        features: Vec<String>,

        /// Name for the new dataset
        #[arg(long)]
        name: Option<String>,
    },

    /// Compare control and personalization conversion (needs variant and converted columns)
    AbTest {
        /// Dataset ID
        id: i64,

        /// Only rows whose marketing_channel equals this value
        #[arg(long)]
        channel: Option<String>,

        /// Report one comparison per value of this column
        #[arg(long)]
        subsegment: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
