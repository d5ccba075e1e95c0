use anyhow::{Context, Result};

use crate::core::Config;

pub fn execute(matches: &clap::ArgMatches) -> Result<()> {
    let config = super::load_config(matches.get_one::<String>("config"))?;

    if matches.get_flag("path") {
        println!("{}", Config::get_config_path()?.display());
        return Ok(());
    }

    if let Err(e) = config.validate() {
        log::warn!("Configuration is not usable: {}", e);
    }

    let json = serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
    println!("{}", json);
    Ok(())
}
