//! Authentication commands.

use super::{auth_failure, Context};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use serde_json::json;
use std::io::{self, Write};

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}

fn prompt_required(label: &str, given: Option<String>) -> Result<String> {
    let value = match given {
        Some(value) => value,
        None => prompt(label)?,
    };
    if value.is_empty() {
        anyhow::bail!("{} is required", label);
    }
    Ok(value)
}

/// Login with username or email and password.
pub async fn login(ctx: &Context, user: Option<String>, format: &OutputFormat) -> Result<()> {
    let session = ctx.open_session()?;

    if session.has_session()? {
        output::print_success("Already logged in. Run 'gram logout' to switch accounts.", format);
        return Ok(());
    }

    let username_or_email = prompt_required("Username or email", user)?;
    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }

    if matches!(format, OutputFormat::Text) {
        println!("Logging in...");
    }

    let message = session
        .login(&username_or_email, &password)
        .await
        .map_err(|e| auth_failure(&session, e))?;
    output::print_success(&message, format);

    Ok(())
}

/// Create a new account.
pub async fn register(
    ctx: &Context,
    username: Option<String>,
    email: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let session = ctx.open_session()?;

    let username = prompt_required("Username", username)?;
    let email = prompt_required("Email", email)?;
    let password = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }

    let message = session
        .register(&username, &email, &password)
        .await
        .map_err(|e| auth_failure(&session, e))?;
    output::print_success(&format!("{}. Run 'gram login' to sign in.", message), format);

    Ok(())
}

/// Logout and clear session.
pub async fn logout(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let session = ctx.open_session()?;

    if !session.has_session()? {
        output::print_success("Not logged in", format);
        return Ok(());
    }

    session.logout().await?;
    output::print_success("Logged out successfully", format);

    Ok(())
}

/// Show the local session state. Does not contact the server.
pub async fn status(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let session = ctx.open_session()?;
    let logged_in = session.state().is_authenticated();
    let tokens_file = ctx.paths.tokens_file();

    match format {
        OutputFormat::Text => {
            output::print_row("Server", &ctx.config.auth_server_url);
            output::print_row(
                "Auth",
                if logged_in { "logged in" } else { "not logged in" },
            );
            output::print_row("State", session.state().as_str());
            output::print_row("Tokens", &tokens_file.display().to_string());
        }
        OutputFormat::Json => {
            output::print_json(&json!({
                "server": ctx.config.auth_server_url,
                "logged_in": logged_in,
                "state": session.state(),
                "tokens_file": tokens_file,
            }));
        }
    }

    Ok(())
}
