//! `sysinfo`-backed metrics source.

use std::time::Duration;

use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, Networks, RefreshKind, System};

use crate::core::monitor::{
    percent_of, CpuMetrics, MemoryMetrics, MetricsSource, NetworkMetrics, Partition,
    PartitionUsage, SystemFacts, TIMESTAMP_FORMAT,
};
use crate::error::{Result, SysfeedError};

pub const DEFAULT_CPU_SAMPLE: Duration = Duration::from_secs(1);

/// Metrics source reading the host through `sysinfo`
pub struct SysinfoSource {
    system: System,
    disks: Disks,
    networks: Networks,
    cpu_sample: Duration,
    /// Static facts, read once
    facts: Option<SystemFacts>,
}

impl SysinfoSource {
    pub fn new() -> Self {
        Self::with_cpu_sample(DEFAULT_CPU_SAMPLE)
    }

    /// `cpu_sample` is how long a CPU reading averages over; it is raised to
    /// sysinfo's minimum update interval if shorter.
    pub fn with_cpu_sample(cpu_sample: Duration) -> Self {
        let refresh_kind = RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything());

        Self {
            system: System::new_with_specifics(refresh_kind),
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
            cpu_sample: cpu_sample.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
            facts: None,
        }
    }

    fn read_facts(&self) -> SystemFacts {
        let boot_time = chrono::DateTime::from_timestamp(System::boot_time() as i64, 0)
            .map(|t| {
                t.with_timezone(&chrono::Local)
                    .format(TIMESTAMP_FORMAT)
                    .to_string()
            })
            .unwrap_or_default();

        SystemFacts {
            os_name: os_family().to_string(),
            os_version: System::long_os_version()
                .or_else(System::os_version)
                .or_else(System::kernel_version)
                .unwrap_or_default(),
            processor_name: self
                .system
                .cpus()
                .first()
                .map(|c| c.brand().trim().to_string())
                .unwrap_or_default(),
            boot_time,
        }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for SysinfoSource {
    fn refresh(&mut self) -> Result<()> {
        self.system.refresh_memory();
        self.disks.refresh(true);
        self.networks.refresh(true);
        Ok(())
    }

    fn cpu(&mut self) -> Result<CpuMetrics> {
        // Usage is a delta between two refreshes, so sample over an interval
        self.system.refresh_cpu_usage();
        std::thread::sleep(self.cpu_sample);
        self.system
            .refresh_cpu_specifics(CpuRefreshKind::nothing().with_cpu_usage().with_frequency());

        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return Err(SysfeedError::metric_collection("no CPUs reported"));
        }

        let frequency = cpus.iter().map(|c| c.frequency()).max().unwrap_or(0);

        Ok(CpuMetrics {
            usage_percent: f64::from(self.system.global_cpu_usage()),
            frequency_mhz: (frequency > 0).then_some(frequency as f64),
            core_count: cpus.len(),
        })
    }

    fn memory(&mut self) -> Result<MemoryMetrics> {
        let total = self.system.total_memory();
        if total == 0 {
            return Err(SysfeedError::metric_collection("total memory reported as 0"));
        }

        Ok(MemoryMetrics {
            total_bytes: total,
            available_bytes: self.system.available_memory(),
            used_percent: percent_of(self.system.used_memory(), total),
            swap_percent: percent_of(self.system.used_swap(), self.system.total_swap()),
        })
    }

    fn partitions(&mut self) -> Result<Vec<Partition>> {
        Ok(self
            .disks
            .iter()
            .map(|disk| Partition {
                device: disk.name().to_string_lossy().to_string(),
                mountpoint: disk.mount_point().to_string_lossy().to_string(),
            })
            .collect())
    }

    fn partition_usage(&mut self, partition: &Partition) -> Result<PartitionUsage> {
        let disk = self
            .disks
            .iter()
            .find(|d| d.mount_point().to_string_lossy() == partition.mountpoint)
            .ok_or_else(|| {
                SysfeedError::metric_collection(format!(
                    "{} is no longer mounted",
                    partition.mountpoint
                ))
            })?;

        let total = disk.total_space();
        if total == 0 {
            return Err(SysfeedError::metric_collection(format!(
                "{} reports no capacity",
                partition.mountpoint
            )));
        }
        let free = disk.available_space();

        Ok(PartitionUsage {
            total_bytes: total,
            used_bytes: total.saturating_sub(free),
            free_bytes: free,
        })
    }

    fn network(&mut self) -> Result<NetworkMetrics> {
        Ok(self
            .networks
            .iter()
            .fold(NetworkMetrics::default(), |acc, (_, data)| NetworkMetrics {
                bytes_sent: acc.bytes_sent + data.total_transmitted(),
                bytes_received: acc.bytes_received + data.total_received(),
            }))
    }

    fn system(&mut self) -> Result<SystemFacts> {
        if self.facts.is_none() {
            self.facts = Some(self.read_facts());
        }
        self.facts
            .clone()
            .ok_or_else(|| SysfeedError::metric_collection("system facts unavailable"))
    }
}

/// OS family name as dashboards expect it
fn os_family() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "windows" => "Windows",
        "macos" => "Darwin",
        "freebsd" => "FreeBSD",
        other => other,
    }
}
