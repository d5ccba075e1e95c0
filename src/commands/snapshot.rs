use anyhow::{Context, Result};

use crate::core::monitor::{Forecaster, SnapshotCollector};
use crate::platform::{default_probe_chain, SysinfoSource};

/// Collect a single snapshot and print it as the `data` part of an update.
pub fn execute(matches: &clap::ArgMatches) -> Result<()> {
    let config = super::load_config(matches.get_one::<String>("config"))?;
    config.validate().context("Invalid configuration")?;

    let mut collector = SnapshotCollector::new(
        SysinfoSource::with_cpu_sample(config.cpu_sample()),
        default_probe_chain(config.probe_timeout()),
    );
    let snapshot = collector.collect();

    // A fresh forecaster is still in cold start, so this echoes current usage
    let mut forecaster = Forecaster::with_config(config.forecast);
    let forecast = forecaster.predict(snapshot.cpu.usage_percent);
    let snapshot = snapshot.with_forecast(forecast);

    let json = if matches.get_flag("pretty") {
        serde_json::to_string_pretty(&snapshot)
    } else {
        serde_json::to_string(&snapshot)
    }
    .context("Failed to serialize snapshot")?;

    println!("{}", json);
    Ok(())
}
