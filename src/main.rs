use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dwap::cli::{
    CleanArgs, CliContext, ImportArgs, ModelCommands, run_clean, run_delete, run_email,
    run_export, run_history, run_import, run_init, run_model_ab_test, run_model_auto,
    run_model_fit, run_model_predict, run_profile, run_search, run_show, run_stats,
};
use dwap::notify::ExportFormat;

#[derive(Parser)]
#[command(name = "dwap")]
#[command(about = "Load, clean, store, model and mail tabular data", long_about = None)]
struct Cli {
    /// Data directory for the database and default config file
    #[arg(long, global = true, default_value = "./data")]
    data_dir: PathBuf,

    /// Config file (defaults to <data-dir>/dwap.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Email address recorded as owner and actor
    #[arg(long, global = true, default_value = "")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and a default config file
    Init,

    /// Load a file, optionally clean it, and store it
    Import(ImportArgs),

    /// Clean a stored dataset into a new dataset
    Clean {
        /// Dataset ID
        id: i64,

        #[command(flatten)]
        clean: CleanArgs,

        /// Name for the cleaned dataset
        #[arg(long)]
        name: Option<String>,
    },

    /// Search stored datasets by name, description or tag
    Search {
        /// Case-insensitive text to look for
        query: Option<String>,

        /// Only datasets owned by this email
        #[arg(long)]
        owner: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a dataset's metadata and first rows
    Show {
        /// Dataset ID
        id: i64,

        /// Number of rows to preview
        #[arg(long, default_value = "10")]
        rows: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the processing history of a dataset
    History {
        /// Dataset ID
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a dataset, its data and its history
    Delete {
        /// Dataset ID (prompted when omitted)
        id: Option<i64>,

        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,

        /// Skip interactive prompts (requires ID and --yes)
        #[arg(long)]
        non_interactive: bool,
    },

    /// Show catalog statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Profile column types, missing values and distributions
    Profile {
        /// Dataset ID
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a dataset to a csv, excel or json file
    Export {
        /// Dataset ID
        id: i64,

        /// Output format (csv, excel, json)
        #[arg(long, default_value = "csv")]
        format: ExportFormat,

        /// Output path (defaults to the dataset name with the format's extension)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Fit and score models
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },

    /// Mail a dataset or its analysis report
    Email {
        /// Dataset ID (prompted when omitted)
        id: Option<i64>,

        /// Recipient address
        #[arg(long)]
        to: String,

        /// Attachment format (csv, excel, json)
        #[arg(long, default_value = "csv")]
        format: ExportFormat,

        /// Send a quality report instead of the data
        #[arg(long)]
        analysis: bool,

        /// Skip interactive prompts (requires ID)
        #[arg(long)]
        non_interactive: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dwap=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = CliContext {
        data_dir: cli.data_dir,
        config: cli.config,
        user: cli.user,
    };

    match cli.command {
        Commands::Init => run_init(&ctx)?,
        Commands::Import(args) => run_import(&ctx, args)?,
        Commands::Clean { id, clean, name } => run_clean(&ctx, id, clean, name)?,
        Commands::Search { query, owner, json } => run_search(&ctx, query, owner, json)?,
        Commands::Show { id, rows, json } => run_show(&ctx, id, rows, json)?,
        Commands::History { id, json } => run_history(&ctx, id, json)?,
        Commands::Delete {
            id,
            yes,
            non_interactive,
        } => run_delete(&ctx, id, yes, non_interactive)?,
        Commands::Stats { json } => run_stats(&ctx, json)?,
        Commands::Profile { id, json } => run_profile(&ctx, id, json)?,
        Commands::Export { id, format, output } => run_export(&ctx, id, format, output)?,
        Commands::Model { command } => match command {
            ModelCommands::Fit {
                id,
                model,
                target,
                features,
                json,
            } => run_model_fit(&ctx, id, model, target, features, json)?,
            ModelCommands::Auto { id, json } => run_model_auto(&ctx, id, json)?,
            ModelCommands::Predict {
                id,
                model,
                target,
                features,
                name,
            } => run_model_predict(&ctx, id, model, target, features, name)?,
            ModelCommands::AbTest {
                id,
                channel,
                subsegment,
                json,
            } => run_model_ab_test(&ctx, id, channel, subsegment, json)?,
        },
        Commands::Email {
            id,
            to,
            format,
            analysis,
            non_interactive,
        } => run_email(&ctx, id, to, format, analysis, non_interactive)?,
    }

    Ok(())
}
