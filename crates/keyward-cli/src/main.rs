//! Keyward - chained internal and directory authentication
//!
//! Command-line front end: loads configuration, initialises logging, and
//! runs one operation against the configured provider chain or user store.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use commands::CommandContext;
use keyward_core::KeywardConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "keyward")]
#[command(author = "Keyward Team")]
#[command(version = keyward_core::VERSION)]
#[command(about = "Chained internal and LDAP authentication", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "KEYWARD_CONFIG")]
    config: Option<String>,

    /// Database URL for the internal store
    #[arg(long, global = true, env = "KEYWARD_DATABASE_URL")]
    database_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "KEYWARD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate a username through the provider chain
    Authenticate {
        username: String,

        #[arg(short, long, env = "KEYWARD_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Show the recorded origin of a username
    Origin { username: String },

    /// Create an internal user
    AddUser {
        username: String,

        #[arg(short, long, env = "KEYWARD_PASSWORD", hide_env_values = true)]
        password: String,

        /// Scope to grant (repeatable)
        #[arg(short, long = "scope")]
        scopes: Vec<String>,
    },

    /// Record additional scopes for an existing username
    Grant {
        username: String,

        #[arg(required = true)]
        scopes: Vec<String>,
    },

    /// List every recorded username
    ListUsers,

    /// Validate the configuration and exit
    CheckConfig,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = if let Some(config_path) = &cli.config {
        KeywardConfig::from_file(config_path)?
    } else {
        KeywardConfig::from_env()?
    };

    // Override with CLI args
    if let Some(url) = cli.database_url {
        config.store.database_url = url;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_logging(&config);
    tracing::debug!(source = ?cli.config, "Configuration loaded");

    let ctx = CommandContext {
        config,
        output_format: cli.output,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Authenticate { username, password } => {
            commands::authenticate::execute(&ctx, &username, &password).await
        }
        Commands::Origin { username } => commands::origin::execute(&ctx, &username).await,
        Commands::AddUser {
            username,
            password,
            scopes,
        } => commands::users::add(&ctx, &username, &password, scopes).await,
        Commands::Grant { username, scopes } => {
            commands::users::grant(&ctx, &username, scopes).await
        }
        Commands::ListUsers => commands::users::list(&ctx).await,
        Commands::CheckConfig => commands::check_config::execute(&ctx),
        Commands::Version => {
            println!("keyward {}", keyward_core::VERSION);
            Ok(())
        }
    }
}

fn init_logging(config: &KeywardConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    // logs go to stderr so command output stays parseable
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "keyward",
            "list-users",
            "--output",
            "json",
            "--database-url",
            "sqlite::memory:",
            "-q",
        ])
        .unwrap();

        assert!(matches!(cli.output, OutputFormat::Json));
        assert_eq!(cli.database_url.as_deref(), Some("sqlite::memory:"));
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::ListUsers));
    }

    #[test]
    fn test_add_user_collects_repeated_scopes() {
        let cli = Cli::try_parse_from([
            "keyward",
            "add-user",
            "marissa",
            "--password",
            "koala",
            "-s",
            "uaa.admin",
            "--scope",
            "openid",
        ])
        .unwrap();

        match cli.command {
            Commands::AddUser {
                username,
                password,
                scopes,
            } => {
                assert_eq!(username, "marissa");
                assert_eq!(password, "koala");
                assert_eq!(scopes, vec!["uaa.admin", "openid"]);
            }
            _ => panic!("expected add-user"),
        }
    }

    #[test]
    fn test_grant_requires_a_scope() {
        assert!(Cli::try_parse_from(["keyward", "grant", "marissa"]).is_err());
    }

    #[test]
    fn test_unknown_output_format_rejected() {
        assert!(Cli::try_parse_from(["keyward", "version", "--output", "yaml"]).is_err());
    }
}
