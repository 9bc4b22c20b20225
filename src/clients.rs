//! Client registration commands.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::context::AppContext;

pub async fn run_client_add(config: &Config, name: &str, credential: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("client name must not be empty");
    }
    if credential.trim().is_empty() {
        bail!("client credential must not be empty");
    }

    let ctx = AppContext::from_config(config).await?;
    let client = ctx.store.create_client(name.trim(), credential.trim()).await?;
    tracing::info!(client_id = %client.id, "client registered");

    println!("{}", client.id);
    Ok(())
}

pub async fn run_client_list(config: &Config) -> Result<()> {
    let ctx = AppContext::from_config(config).await?;
    let clients = ctx.store.list_clients().await?;

    if clients.is_empty() {
        println!("No clients registered. Add one with `postline client add`.");
        return Ok(());
    }

    println!("{:<36}  {:<24}  CREATED", "ID", "NAME");
    for c in &clients {
        println!(
            "{:<36}  {:<24}  {}",
            c.id,
            c.name,
            c.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}
