//! GPU-specific platform code.
//!
//! Provides the built-in integrated-GPU probes for Windows and Linux,
//! Intel and AMD.

mod linux;
mod windows;

pub use linux::{AmdSysfsProbe, IntelGpuTopProbe};
pub use windows::{AdapterName, WindowsGpuProbe};

use std::sync::Arc;
use std::time::Duration;

use crate::core::monitor::{GpuVendor, ProbeChain};
use crate::error::{Result, SysfeedError};

/// Build the default probe chain
///
/// Tries each strategy in order of preference:
/// 1. Windows, Intel (CIM controller name + GPU engine counters)
/// 2. Windows, AMD (same sources)
/// 3. Linux, Intel (`intel_gpu_top`)
/// 4. Linux, AMD (`gpu_busy_percent` in sysfs)
pub fn default_probe_chain(timeout: Duration) -> ProbeChain {
    let adapter = Arc::new(AdapterName::default());
    ProbeChain::new(vec![
        Box::new(WindowsGpuProbe::with_adapter(
            GpuVendor::Intel,
            timeout,
            Arc::clone(&adapter),
        )),
        Box::new(WindowsGpuProbe::with_adapter(GpuVendor::Amd, timeout, adapter)),
        Box::new(IntelGpuTopProbe::new(timeout)),
        Box::new(AmdSysfsProbe::new()),
    ])
}

/// Guess the vendor from an adapter name
pub fn vendor_from_name(name: &str) -> Option<GpuVendor> {
    let name = name.to_ascii_lowercase();

    if name.contains("intel") {
        Some(GpuVendor::Intel)
    } else if name.contains("amd") || name.contains("radeon") {
        Some(GpuVendor::Amd)
    } else {
        None
    }
}

/// Validate a raw utilization reading
///
/// Negative or non-finite values are unusable; values over 100 (summed
/// engine counters) are capped.
pub fn usage_reading(value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(SysfeedError::gpu_not_available(format!(
            "unusable utilization reading: {}",
            value
        )));
    }
    Ok(value.min(100.0))
}
