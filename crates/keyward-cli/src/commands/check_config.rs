//! check-config command - validate configuration without touching any backend

use super::CommandContext;
use anyhow::Result;
use colored::Colorize;
use keyward_core::config::ProviderKind;

pub fn execute(ctx: &CommandContext) -> Result<()> {
    let config = &ctx.config;
    config.validate()?;

    if ctx.is_json() {
        // never echo the service account password
        let mut redacted = config.clone();
        redacted.directory.bind_password = String::new();
        return ctx.print_json(&redacted);
    }

    println!("{}", "Configuration OK".green());
    ctx.info(&format!("  providers: {:?}", config.chain.providers));
    if config.chain.providers.contains(&ProviderKind::Directory) {
        ctx.info(&format!("  directory: {}", config.directory.server_url));
        ctx.info(&format!("  strategy: {:?}", config.directory.strategy));
        ctx.info(&format!("  scope mapping: {:?}", config.directory.groups.policy));
        ctx.info(&format!("  max search depth: {}", config.directory.groups.max_search_depth));
    }
    ctx.info(&format!("  store: {}", config.store.database_url));
    Ok(())
}
