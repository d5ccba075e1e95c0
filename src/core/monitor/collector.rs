use log::{debug, warn};

use crate::error::Result;

use super::gpu::ProbeChain;
use super::metrics::*;
use super::source::MetricsSource;

/// Collects one complete snapshot per tick from a metrics source and the
/// GPU probe chain
pub struct SnapshotCollector<S: MetricsSource> {
    source: S,
    probes: ProbeChain,
}

impl<S: MetricsSource> SnapshotCollector<S> {
    pub fn new(source: S, probes: ProbeChain) -> Self {
        Self { source, probes }
    }

    /// Collect a snapshot.
    ///
    /// Never fails: if the source cannot be refreshed at all, a degraded
    /// snapshot carrying only a timestamp is returned.
    pub fn collect(&mut self) -> MetricsSnapshot {
        match self.try_collect() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Metrics collection failed, publishing empty snapshot: {}", e);
                MetricsSnapshot::degraded()
            }
        }
    }

    fn try_collect(&mut self) -> Result<MetricsSnapshot> {
        self.source.refresh()?;

        let cpu = self.source.cpu().unwrap_or_else(|e| {
            warn!("Failed to read CPU metrics: {}", e);
            CpuMetrics::default()
        });

        let memory = self.source.memory().unwrap_or_else(|e| {
            warn!("Failed to read memory metrics: {}", e);
            MemoryMetrics::default()
        });

        let gpu = self.probes.probe();

        let disk = self.collect_disks();

        let network = self.source.network().unwrap_or_else(|e| {
            warn!("Failed to read network counters: {}", e);
            NetworkMetrics::default()
        });

        let system = self.source.system().unwrap_or_else(|e| {
            warn!("Failed to read system facts: {}", e);
            SystemFacts::default()
        });

        Ok(MetricsSnapshot {
            timestamp: now_timestamp(),
            cpu,
            memory,
            gpu,
            disk,
            network,
            system,
            predictions: Predictions::default(),
            degraded: false,
        })
    }

    /// Partitions whose usage query fails are skipped
    fn collect_disks(&mut self) -> Vec<DiskMetrics> {
        let partitions = match self.source.partitions() {
            Ok(partitions) => partitions,
            Err(e) => {
                warn!("Failed to enumerate partitions: {}", e);
                return Vec::new();
            }
        };

        partitions
            .into_iter()
            .filter_map(|partition| match self.source.partition_usage(&partition) {
                Ok(usage) => Some(DiskMetrics {
                    used_percent: percent_of(usage.used_bytes, usage.total_bytes),
                    device: partition.device,
                    mountpoint: partition.mountpoint,
                    total_bytes: usage.total_bytes,
                    used_bytes: usage.used_bytes,
                    free_bytes: usage.free_bytes,
                }),
                Err(e) => {
                    debug!("Skipping partition {}: {}", partition.mountpoint, e);
                    None
                }
            })
            .collect()
    }

    pub fn probes(&self) -> &ProbeChain {
        &self.probes
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}
