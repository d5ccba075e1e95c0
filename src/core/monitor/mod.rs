//! System monitoring core functionality.
//!
//! This module provides the sampling-forecasting-broadcast pipeline: the
//! GPU probe chain, the snapshot collector, the rolling-window CPU
//! forecaster and the loop that publishes each snapshot to observers.

pub mod arima;
mod broadcast;
mod collector;
mod forecast;
mod gpu;
mod history;
mod metrics;
mod runtime;
mod source;

pub use arima::ArimaOrder;
pub use broadcast::{BroadcastLoop, Publisher, DEFAULT_PERIOD, UPDATE_EVENT};
pub use collector::SnapshotCollector;
pub use forecast::{ForecastConfig, Forecaster, DEFAULT_COLD_START};
pub use gpu::{GpuProbe, ProbeChain};
pub use history::{RollingWindow, DEFAULT_WINDOW_CAPACITY};
pub use metrics::{
    now_timestamp, percent_of, CpuMetrics, DiskMetrics, GpuMetrics, GpuVendor, MemoryMetrics,
    MetricsSnapshot, NetworkMetrics, Predictions, ProbeResult, SystemFacts, TIMESTAMP_FORMAT,
};
pub use runtime::MonitorRuntime;
pub use source::{MetricsSource, Partition, PartitionUsage};
