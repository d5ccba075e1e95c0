//! Tokio runtime hosting the broadcast loop and the subscriber registry.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::broadcast::BroadcastLoop;
use super::collector::SnapshotCollector;
use super::forecast::Forecaster;
use crate::core::config::Config;
use crate::platform::{default_probe_chain, SysinfoSource};
use crate::server::SubscriberRegistry;

/// Owns the runtime and the two long-running tasks.
///
/// Both tasks stop when a value is sent on the shutdown handle.
pub struct MonitorRuntime {
    local_addr: SocketAddr,
    registry: Arc<SubscriberRegistry>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
    tasks: Vec<JoinHandle<()>>,
    runtime: tokio::runtime::Runtime,
}

impl MonitorRuntime {
    /// Bind the listener and spawn the serve and broadcast tasks.
    pub fn start(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("sysfeed-worker")
            .build()?;

        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

        let bind_addr = config.bind_addr();
        let listener = runtime
            .block_on(TcpListener::bind(&bind_addr))
            .with_context(|| format!("Failed to bind {}", bind_addr))?;
        let local_addr = listener.local_addr()?;

        let registry = Arc::new(SubscriberRegistry::new(config.channel_capacity));
        registry.on_connect(|addr| log::info!("Client connected: {}", addr));

        let collector = SnapshotCollector::new(
            SysinfoSource::with_cpu_sample(config.cpu_sample()),
            default_probe_chain(config.probe_timeout()),
        );
        log::debug!("GPU probes: {:?}", collector.probes().names());

        let broadcast_loop = BroadcastLoop::new(
            collector,
            Forecaster::with_config(config.forecast),
            Arc::clone(&registry),
        )
        .with_period(config.interval());

        let serve_registry = Arc::clone(&registry);
        let serve_shutdown = shutdown_tx.subscribe();
        let serve_task = runtime.spawn(async move {
            if let Err(e) = serve_registry.serve(listener, serve_shutdown).await {
                log::error!("Subscriber registry failed: {}", e);
            }
        });

        let loop_task = runtime.spawn(broadcast_loop.run(shutdown_tx.subscribe()));

        Ok(Self {
            local_addr,
            registry,
            shutdown_tx,
            shutdown_rx,
            tasks: vec![serve_task, loop_task],
            runtime,
        })
    }

    /// Address actually bound (useful when the configured port is 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Sender that stops both tasks; safe to move into a signal handler.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Block the calling thread until shutdown is requested, then wind down.
    pub fn wait(mut self) {
        let tasks = std::mem::take(&mut self.tasks);
        let mut shutdown_rx = self.shutdown_rx;

        self.runtime.block_on(async move {
            let _ = shutdown_rx.recv().await;
            for task in tasks {
                if let Err(e) = task.await {
                    log::warn!("Task ended abnormally: {}", e);
                }
            }
        });

        self.runtime
            .shutdown_timeout(std::time::Duration::from_secs(2));
        log::info!("Monitor stopped");
    }

    /// Request shutdown and wait for both tasks to finish.
    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        self.wait();
    }
}
