//! Commands that use the stored session.

use super::{auth_failure, Context};
use crate::output::{self, OutputFormat};
use anyhow::Result;

/// Show the profile of the logged-in user.
pub async fn me(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let session = ctx.open_session()?;
    let profile = session.me().await.map_err(|e| auth_failure(&session, e))?;

    match format {
        OutputFormat::Text => {
            output::print_row("Username", &profile.username);
            output::print_row("Email", profile.email.as_deref().unwrap_or("-"));
        }
        OutputFormat::Json => output::print_json(&profile),
    }

    Ok(())
}

/// Rotate the stored token pair.
pub async fn refresh(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let session = ctx.open_session()?;
    session
        .refresh_now()
        .await
        .map_err(|e| auth_failure(&session, e))?;
    output::print_success("Session refreshed", format);

    Ok(())
}
