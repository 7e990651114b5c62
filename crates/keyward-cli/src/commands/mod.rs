//! CLI command implementations

pub mod authenticate;
pub mod check_config;
pub mod origin;
pub mod users;

use crate::OutputFormat;
use anyhow::{Context, Result};
use keyward_core::KeywardConfig;
use keyward_store::{SqliteUserStore, UserStore};
use serde::Serialize;
use std::sync::Arc;

/// Context passed to all commands
pub struct CommandContext {
    pub config: KeywardConfig,
    pub output_format: OutputFormat,
    pub quiet: bool,
}

impl CommandContext {
    /// Check if output should be JSON
    pub fn is_json(&self) -> bool {
        matches!(self.output_format, OutputFormat::Json)
    }

    /// Print info message if not quiet
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Open the internal store named by the configuration
    pub async fn open_store(&self) -> Result<Arc<dyn UserStore>> {
        self.config.store.validate()?;
        let store = SqliteUserStore::new(&self.config.store)
            .await
            .with_context(|| format!("Failed to open store at {}", self.config.store.database_url))?;
        Ok(Arc::new(store))
    }
}
