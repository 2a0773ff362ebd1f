//! # DWAP
//!
//! A data wrangling toolkit: load tabular files, clean them with a fixed set
//! of audited steps, keep them in a local SQLite catalog, fit simple models
//! and mail the results. Usable as a binary or as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! dwap = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::path::Path;
//! use dwap::config::AppConfig;
//! use dwap::workspace::{ImportRequest, Workspace};
//!
//! let config = AppConfig::load(Path::new("./data"), None)?;
//! let ws = Workspace::open(config, "ana@example.com")?;
//! let imported = ws.import_file(Path::new("sales.csv"), ImportRequest::default())?;
//! let (record, table) = ws.dataset(imported.id)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.

pub mod cleaner;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod loader;
pub mod ml;
pub mod notify;
pub mod store;
pub mod table;
pub mod types;
pub mod workspace;
