use anyhow::{Context, Result};

use crate::core::monitor::MonitorRuntime;

pub fn execute(matches: &clap::ArgMatches) -> Result<()> {
    let mut config = super::load_config(matches.get_one::<String>("config"))?;

    if let Some(host) = matches.get_one::<String>("host") {
        config.host = host.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }
    if let Some(interval) = matches.get_one::<u64>("interval") {
        config.interval_ms = *interval;
    }

    config.validate().context("Invalid configuration")?;

    let runtime = MonitorRuntime::start(&config)?;
    log::info!(
        "Serving metrics on ws://{} every {} ms",
        runtime.local_addr(),
        config.interval_ms
    );

    let shutdown = runtime.shutdown_handle();
    ctrlc::set_handler(move || {
        log::info!("Shutting down...");
        let _ = shutdown.send(());
    })
    .context("Error setting Ctrl-C handler")?;

    runtime.wait();
    Ok(())
}
