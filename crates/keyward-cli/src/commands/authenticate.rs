//! authenticate command - run a credential through the provider chain

use super::CommandContext;
use anyhow::Result;
use colored::Colorize;
use keyward_auth::AuthenticationManagerChain;

pub async fn execute(ctx: &CommandContext, username: &str, password: &str) -> Result<()> {
    let store = ctx.open_store().await?;
    let chain = AuthenticationManagerChain::from_config(&ctx.config, store, None)?;

    match chain.authenticate(username, password).await {
        Ok(principal) => {
            if ctx.is_json() {
                return ctx.print_json(&principal);
            }

            println!(
                "{}: {} (origin: {})",
                "authenticated".green(),
                principal.username,
                principal.origin
            );
            for scope in &principal.scopes {
                ctx.info(&format!("  {}", scope));
            }
            Ok(())
        }
        Err(e) => {
            if ctx.is_json() {
                ctx.print_json(&serde_json::json!({
                    "error": e.code(),
                    "message": e.to_string(),
                }))?;
            } else {
                eprintln!("{}: {}", "rejected".red(), e);
            }
            std::process::exit(1);
        }
    }
}
