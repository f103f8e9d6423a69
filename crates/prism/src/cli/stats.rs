//! The `prism stats` command.

use prism_core::{Config, Prism};

/// Print aggregate counters from the configured store as JSON.
pub async fn execute(config: Config) -> anyhow::Result<()> {
    let prism = Prism::new(config)?;
    let stats = prism.stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
