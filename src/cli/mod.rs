mod commands;
mod dataset;
mod email;
mod info;
mod model;
pub mod pickers;

pub use commands::{CleanArgs, ImportArgs, ModelCommands};
pub use dataset::{
    run_clean, run_delete, run_export, run_history, run_import, run_init, run_profile,
    run_search, run_show,
};
pub use email::run_email;
pub use info::run_stats;
pub use model::{run_model_ab_test, run_model_auto, run_model_fit, run_model_predict};

use std::path::PathBuf;

use crate::config::AppConfig;
use crate::workspace::Workspace;

/// Options every subcommand shares.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub data_dir: PathBuf,
    pub config: Option<PathBuf>,
    pub user: String,
}

impl CliContext {
    pub fn load_config(&self) -> anyhow::Result<AppConfig> {
        Ok(AppConfig::load(&self.data_dir, self.config.as_deref())?)
    }

    /// Open the workspace, checking the database was initialized first.
    pub fn workspace(&self) -> anyhow::Result<Workspace> {
        let config = self.load_config()?;
        let db_path = config.db_path();
        if !db_path.exists() {
            anyhow::bail!(
                "Database not found at {}. Run 'dwap init' first.",
                db_path.display()
            );
        }
        Ok(Workspace::open(config, &self.user)?)
    }
}
