//! add-user, grant and list-users commands - internal store administration

use super::CommandContext;
use anyhow::{bail, Result};
use colored::Colorize;
use keyward_core::types::UserRecord;

pub async fn add(
    ctx: &CommandContext,
    username: &str,
    password: &str,
    scopes: Vec<String>,
) -> Result<()> {
    if username.is_empty() {
        bail!("Username cannot be empty");
    }
    if password.is_empty() {
        bail!("Password cannot be empty");
    }

    let store = ctx.open_store().await?;
    let user = UserRecord::internal(username, keyward_crypto::hash_password(password))
        .with_scopes(scopes);
    store.create_user(&user).await?;

    if ctx.is_json() {
        return ctx.print_json(&user);
    }

    ctx.info(&format!(
        "{}: {} ({} scopes)",
        "add_user".green(),
        username,
        user.scopes.len()
    ));
    Ok(())
}

pub async fn grant(ctx: &CommandContext, username: &str, scopes: Vec<String>) -> Result<()> {
    let store = ctx.open_store().await?;
    store.grant_scopes(username, &scopes).await?;

    let granted = store.scopes_for(username).await?;
    if ctx.is_json() {
        return ctx.print_json(&granted);
    }

    ctx.info(&format!("{}: {}", "grant".green(), username));
    for scope in granted {
        ctx.info(&format!("  {}", scope));
    }
    Ok(())
}

pub async fn list(ctx: &CommandContext) -> Result<()> {
    let store = ctx.open_store().await?;
    let users = store.list_users().await?;

    if ctx.is_json() {
        return ctx.print_json(&users);
    }

    for user in &users {
        println!(
            "{:<24} {:<10} {} {}",
            user.username,
            user.origin,
            user.created_at.format("%Y-%m-%d %H:%M:%S"),
            user.scopes.len()
        );
    }
    ctx.info(&format!("\n{} users", users.len()));
    Ok(())
}
