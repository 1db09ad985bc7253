//! gram CLI - log in to the gram auth server and manage the local session.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use commands::Context;
use tracing::debug;

/// gram CLI - Sign in and manage your gram session.
#[derive(Parser)]
#[command(name = "gram")]
#[command(about = "gram CLI for account and session management")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Auth server URL, overriding config and GRAM_AUTH_SERVER_URL
    #[arg(long, global = true)]
    server: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with username or email and password
    Login {
        /// Username or email (prompted if omitted)
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Create an account
    Register {
        /// Username (prompted if omitted)
        #[arg(short, long)]
        username: Option<String>,
        /// Email (prompted if omitted)
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Logout and clear session
    Logout,

    /// Show local session status
    Status,

    /// Show the logged-in user's profile
    Me,

    /// Rotate the session tokens now
    Refresh,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let ctx = match Context::load(cli.server.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            output::print_error(&format!("{:#}", e), None, &cli.format);
            std::process::exit(1);
        }
    };

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| ctx.config.log_level.clone());
    // The CLI owns the terminal; logs only go to the file.
    gram_config::init_logging("cli", &level, &ctx.paths, false);
    debug!(server = %ctx.config.auth_server_url, "Loaded configuration");

    let result = match cli.command {
        Commands::Login { user } => commands::login(&ctx, user, &cli.format).await,
        Commands::Register { username, email } => {
            commands::register(&ctx, username, email, &cli.format).await
        }
        Commands::Logout => commands::logout(&ctx, &cli.format).await,
        Commands::Status => commands::status(&ctx, &cli.format).await,
        Commands::Me => commands::me(&ctx, &cli.format).await,
        Commands::Refresh => commands::refresh(&ctx, &cli.format).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e), commands::error_status(&e), &cli.format);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gram",
            "login",
            "--user",
            "ana",
            "--format",
            "json",
            "--server",
            "http://localhost:9000",
        ])
        .unwrap();

        assert!(matches!(cli.format, output::OutputFormat::Json));
        assert_eq!(cli.server.as_deref(), Some("http://localhost:9000"));
        match cli.command {
            Commands::Login { user } => assert_eq!(user.as_deref(), Some("ana")),
            _ => panic!("expected login"),
        }
    }

    #[test]
    fn test_parse_register() {
        let cli = Cli::try_parse_from(["gram", "register", "-u", "ana_b", "-e", "a@b.co"]).unwrap();
        match cli.command {
            Commands::Register { username, email } => {
                assert_eq!(username.as_deref(), Some("ana_b"));
                assert_eq!(email.as_deref(), Some("a@b.co"));
            }
            _ => panic!("expected register"),
        }
    }
}
