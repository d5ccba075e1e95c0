use super::metrics::{CpuMetrics, MemoryMetrics, NetworkMetrics, SystemFacts};
use crate::error::Result;

/// A mounted partition as enumerated by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub device: String,
    pub mountpoint: String,
}

/// Space figures for one partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
}

/// Raw OS metric accessors used by the snapshot collector
///
/// Implementations are provided in the platform layer. Every read is
/// independent so the collector can degrade each one on its own.
pub trait MetricsSource: Send {
    /// Refresh cached counters before a tick's reads.
    fn refresh(&mut self) -> Result<()>;

    /// CPU usage averaged over the source's sampling interval (may block).
    fn cpu(&mut self) -> Result<CpuMetrics>;

    fn memory(&mut self) -> Result<MemoryMetrics>;

    fn partitions(&mut self) -> Result<Vec<Partition>>;

    fn partition_usage(&mut self, partition: &Partition) -> Result<PartitionUsage>;

    /// Cumulative byte counters summed over all interfaces
    fn network(&mut self) -> Result<NetworkMetrics>;

    fn system(&mut self) -> Result<SystemFacts>;
}
