//! Account and dashboard command handlers.

use chrono::Utc;

use crate::context::{explain, Context};
use crate::present;

pub(crate) async fn run_login(ctx: &Context, email: &str, password: &str) -> anyhow::Result<()> {
    let outcome = ctx.client.login(email, password).await;
    ctx.persist().await?;
    let status = outcome.map_err(|e| anyhow::anyhow!("login failed: {e}"))?;
    println!(
        "{}",
        status.message.as_deref().unwrap_or("Login successful")
    );
    print!("{}", present::render_session(&ctx.client.session().snapshot()));
    Ok(())
}

/// Log out remotely and locally. The local session file is cleared even
/// when the service cannot be reached.
pub(crate) async fn run_logout(ctx: &Context) -> anyhow::Result<()> {
    let outcome = ctx.client.logout().await;
    ctx.persist().await?;
    match outcome {
        Ok(()) => println!("Logged out"),
        Err(e) => println!("Logged out locally; the service did not confirm: {e}"),
    }
    Ok(())
}

/// Show the login state, re-checking with the service unless a logout
/// happened within the quiescence window.
pub(crate) async fn run_whoami(ctx: &Context) -> anyhow::Result<()> {
    let session = ctx.client.session();
    if session.should_check_auth(Utc::now()) {
        ctx.client.check_auth().await.map_err(explain)?;
        ctx.persist().await?;
    }
    print!("{}", present::render_session(&session.snapshot()));
    Ok(())
}

pub(crate) async fn run_signup(
    ctx: &Context,
    email: &str,
    password: &str,
    plan: &str,
) -> anyhow::Result<()> {
    let outcome = ctx.client.signup(email, password, plan).await;
    ctx.persist().await?;
    let status = outcome.map_err(|e| anyhow::anyhow!("signup failed: {e}"))?;
    println!(
        "{}",
        status.message.as_deref().unwrap_or("Account created")
    );
    println!("run `rankgrid login --email {email}` to start a session");
    Ok(())
}

pub(crate) async fn run_pricing(ctx: &Context) -> anyhow::Result<()> {
    let pricing = ctx.client.pricing().await.map_err(explain)?;
    print!("{}", present::render_pricing(&pricing));
    Ok(())
}

pub(crate) async fn run_dashboard(ctx: &Context) -> anyhow::Result<()> {
    let data = ctx.client.dashboard().await.map_err(explain)?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

pub(crate) async fn run_info(ctx: &Context) -> anyhow::Result<()> {
    let info = ctx.client.service_info().await.map_err(explain)?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
