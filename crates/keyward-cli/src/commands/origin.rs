//! origin command - show where a username was first authenticated

use super::CommandContext;
use anyhow::Result;
use keyward_auth::AuthenticationManagerChain;

pub async fn execute(ctx: &CommandContext, username: &str) -> Result<()> {
    let store = ctx.open_store().await?;
    let chain = AuthenticationManagerChain::new(Vec::new())
        .with_user_store(store, Vec::new());

    let origin = chain.origin_of(username).await?;

    if ctx.is_json() {
        return ctx.print_json(&serde_json::json!({
            "username": username,
            "origin": origin,
        }));
    }

    match origin {
        Some(origin) => println!("{}", origin),
        None => {
            eprintln!("Unknown user: {}", username);
            std::process::exit(1);
        }
    }
    Ok(())
}
