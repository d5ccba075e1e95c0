//! The broadcast loop: sample, forecast, publish, wait, repeat.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::collector::SnapshotCollector;
use super::forecast::Forecaster;
use super::metrics::MetricsSnapshot;
use super::source::MetricsSource;
use crate::error::{Result, SysfeedError};

/// Event name observers subscribe to
pub const UPDATE_EVENT: &str = "update_metrics";

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

/// Fire-and-forget delivery to every connected observer
///
/// Implementations must tolerate being called while observers attach and
/// detach. Returning `Ok` says nothing about whether anyone received it.
pub trait Publisher: Send + Sync {
    fn publish(&self, event: &str, payload: &serde_json::Value) -> Result<()>;
}

impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    fn publish(&self, event: &str, payload: &serde_json::Value) -> Result<()> {
        (**self).publish(event, payload)
    }
}

/// Drives the sampling cadence and hands payloads to the publisher
pub struct BroadcastLoop<S: MetricsSource + 'static, P: Publisher> {
    collector: Arc<Mutex<SnapshotCollector<S>>>,
    forecaster: Forecaster,
    publisher: P,
    period: Duration,
}

impl<S: MetricsSource + 'static, P: Publisher> BroadcastLoop<S, P> {
    pub fn new(collector: SnapshotCollector<S>, forecaster: Forecaster, publisher: P) -> Self {
        Self {
            collector: Arc::new(Mutex::new(collector)),
            forecaster,
            publisher,
            period: DEFAULT_PERIOD,
        }
    }

    /// Delay between the end of one publish and the start of the next cycle
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn forecaster(&self) -> &Forecaster {
        &self.forecaster
    }

    /// Run until `shutdown` fires or its sender is dropped.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        log::info!(
            "Broadcast loop started (period {} ms)",
            self.period.as_millis()
        );

        loop {
            tokio::select! {
                result = self.run_cycle() => {
                    if let Err(e) = result {
                        log::error!("{}", e);
                    }
                }
                _ = shutdown.recv() => break,
            }

            tokio::select! {
                _ = tokio::time::sleep(self.period) => {}
                _ = shutdown.recv() => break,
            }
        }

        log::info!("Broadcast loop stopped");
    }

    /// One sampling cycle: collect, forecast, publish.
    pub async fn run_cycle(&mut self) -> Result<()> {
        let collector = Arc::clone(&self.collector);
        // CPU sampling blocks for its averaging interval
        let snapshot = tokio::task::spawn_blocking(move || collector.lock().collect())
            .await
            .map_err(|e| SysfeedError::cycle(format!("collection task failed: {}", e)))?;

        let snapshot = self.attach_forecast(snapshot);

        let payload = serde_json::to_value(&snapshot)?;
        self.publisher
            .publish(UPDATE_EVENT, &payload)
            .map_err(|e| SysfeedError::cycle(format!("publish failed: {}", e)))
    }

    fn attach_forecast(&mut self, snapshot: MetricsSnapshot) -> MetricsSnapshot {
        let forecast = if snapshot.is_degraded() {
            // keep the history clean; show the stale forecast instead
            self.forecaster.last_forecast().unwrap_or_default()
        } else {
            self.forecaster.predict(snapshot.cpu.usage_percent)
        };
        snapshot.with_forecast(forecast)
    }
}
