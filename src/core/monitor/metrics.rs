use serde::{Deserialize, Serialize};

/// Timestamp layout used for snapshot and boot times.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Complete metrics snapshot for one sampling tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub gpu: GpuMetrics,
    pub disk: Vec<DiskMetrics>,
    pub network: NetworkMetrics,
    pub system: SystemFacts,
    pub predictions: Predictions,
    /// Set when the whole collection failed and only the timestamp is real.
    #[serde(skip)]
    pub degraded: bool,
}

impl MetricsSnapshot {
    /// Snapshot carrying only a timestamp, used when collection fails outright.
    pub fn degraded() -> Self {
        Self {
            timestamp: now_timestamp(),
            degraded: true,
            ..Default::default()
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Return a copy with the CPU forecast attached.
    pub fn with_forecast(mut self, cpu_forecast_percent: f64) -> Self {
        self.predictions.cpu_forecast_percent = cpu_forecast_percent;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    #[serde(rename = "usage")]
    pub usage_percent: f64,
    #[serde(rename = "frequency")]
    pub frequency_mhz: Option<f64>,
    #[serde(rename = "cores")]
    pub core_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    #[serde(rename = "total")]
    pub total_bytes: u64,
    #[serde(rename = "available")]
    pub available_bytes: u64,
    #[serde(rename = "percent")]
    pub used_percent: f64,
    pub swap_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpuVendor {
    Intel,
    #[serde(rename = "AMD")]
    Amd,
}

impl std::fmt::Display for GpuVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuVendor::Intel => write!(f, "Intel"),
            GpuVendor::Amd => write!(f, "AMD"),
        }
    }
}

/// GPU reading as produced by the probe chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuMetrics {
    pub available: bool,
    #[serde(rename = "type")]
    pub vendor: Option<GpuVendor>,
    #[serde(rename = "usage")]
    pub usage_percent: Option<f64>,
}

impl GpuMetrics {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn detected(vendor: GpuVendor, usage_percent: Option<f64>) -> Self {
        Self {
            available: true,
            vendor: Some(vendor),
            usage_percent,
        }
    }
}

/// Per-tick probe output; same shape as the snapshot's GPU section.
pub type ProbeResult = GpuMetrics;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskMetrics {
    pub device: String,
    pub mountpoint: String,
    #[serde(rename = "total")]
    pub total_bytes: u64,
    #[serde(rename = "used")]
    pub used_bytes: u64,
    #[serde(rename = "free")]
    pub free_bytes: u64,
    #[serde(rename = "percent")]
    pub used_percent: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub bytes_sent: u64,
    #[serde(rename = "bytes_recv")]
    pub bytes_received: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemFacts {
    #[serde(rename = "os")]
    pub os_name: String,
    pub os_version: String,
    #[serde(rename = "processor")]
    pub processor_name: String,
    pub boot_time: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Predictions {
    #[serde(rename = "cpu")]
    pub cpu_forecast_percent: f64,
}

/// Percentage of `part` in `whole`, 0 when `whole` is 0.
pub fn percent_of(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        (part as f64 / whole as f64) * 100.0
    } else {
        0.0
    }
}

pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}
