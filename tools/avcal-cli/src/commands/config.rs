//! Show or write the configuration.

use avcal_common::config::AppConfig;

pub fn run(config: &AppConfig, write: bool) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);

    if write {
        config
            .save()
            .map_err(|e| anyhow::anyhow!("Failed to write configuration: {e}"))?;
        println!();
        println!("Configuration written.");
    }
    Ok(())
}
