use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;

use super::{usage_reading, vendor_from_name};
use crate::core::monitor::{GpuProbe, GpuVendor, ProbeResult};
use crate::error::{Result, SysfeedError};
use crate::platform::command::{run_powershell_json, run_with_timeout};

/// Sum of 3D engine utilization over all GPU engine instances
const GPU_3D_COUNTER: &str = "(Get-Counter '\\GPU Engine(*engtype_3D)\\Utilization Percentage')\
     .CounterSamples | Measure-Object -Property CookedValue -Sum \
     | Select-Object -ExpandProperty Sum";

#[derive(Debug, Deserialize)]
struct VideoControllerPs {
    #[serde(rename = "Name")]
    name: String,
}

/// Adapter name, looked up once and shared by the per-vendor probes
///
/// Failed lookups are not remembered, so a timed-out CIM query is retried on
/// the next tick.
#[derive(Debug, Default)]
pub struct AdapterName {
    name: Mutex<Option<String>>,
}

impl AdapterName {
    pub fn get_or_try_init<F>(&self, lookup: F) -> Result<String>
    where
        F: FnOnce() -> Result<String>,
    {
        let mut slot = self.name.lock();
        if let Some(name) = slot.as_ref() {
            return Ok(name.clone());
        }
        let name = lookup()?;
        *slot = Some(name.clone());
        Ok(name)
    }
}

/// Integrated GPU probe for Windows, one instance per vendor
///
/// Applies when the first real video controller belongs to `vendor`.
/// Utilization comes from the GPU engine performance counters; if those are
/// missing the GPU is still reported, without a usage figure.
pub struct WindowsGpuProbe {
    vendor: GpuVendor,
    timeout: Duration,
    adapter: Arc<AdapterName>,
}

impl WindowsGpuProbe {
    pub fn new(vendor: GpuVendor, timeout: Duration) -> Self {
        Self::with_adapter(vendor, timeout, Arc::new(AdapterName::default()))
    }

    /// Share the adapter lookup with other Windows probes
    pub fn with_adapter(vendor: GpuVendor, timeout: Duration, adapter: Arc<AdapterName>) -> Self {
        Self {
            vendor,
            timeout,
            adapter,
        }
    }

    fn adapter_name(&self) -> Result<String> {
        self.adapter.get_or_try_init(|| self.first_controller())
    }

    fn first_controller(&self) -> Result<String> {
        let raw: serde_json::Value = run_powershell_json(
            "Get-CimInstance Win32_VideoController | Select Name | ConvertTo-Json",
            self.timeout,
        )?;

        let controllers: Vec<VideoControllerPs> = match raw {
            serde_json::Value::Array(arr) => serde_json::from_value(serde_json::Value::Array(arr))?,
            value => vec![serde_json::from_value(value)?],
        };

        controllers
            .into_iter()
            .map(|c| c.name)
            .find(|name| !is_basic_display(name))
            .ok_or_else(|| SysfeedError::gpu_not_available("No video controller found"))
    }

    fn utilization(&self) -> Result<f64> {
        let out = run_with_timeout(
            "powershell",
            &["-NoProfile", "-NonInteractive", "-Command", GPU_3D_COUNTER],
            self.timeout,
        )?;
        let value = parse_counter_sum(&out)?;
        usage_reading(value)
    }
}

impl GpuProbe for WindowsGpuProbe {
    fn name(&self) -> &'static str {
        match self.vendor {
            GpuVendor::Intel => "windows-intel",
            GpuVendor::Amd => "windows-amd",
        }
    }

    fn applies(&self) -> bool {
        cfg!(target_os = "windows")
    }

    fn try_read(&self) -> Result<ProbeResult> {
        let name = self.adapter_name()?;
        if vendor_from_name(&name) != Some(self.vendor) {
            return Err(SysfeedError::gpu_not_available(format!(
                "{} is not a {} adapter",
                name, self.vendor
            )));
        }

        let usage = match self.utilization() {
            Ok(value) => Some(value),
            Err(e) => {
                log::debug!("GPU engine counters unavailable for {}: {}", name, e);
                None
            }
        };

        Ok(ProbeResult::detected(self.vendor, usage))
    }
}

fn is_basic_display(name: &str) -> bool {
    name.contains("Basic Display") || name.contains("Microsoft Basic")
}

/// Parse the counter sum printed by PowerShell (locale may use a comma)
fn parse_counter_sum(output: &str) -> Result<f64> {
    let trimmed = output.trim().replace(',', ".");
    trimmed.parse::<f64>().map_err(|_| {
        SysfeedError::gpu_not_available(format!("unexpected counter output: {:?}", output))
    })
}
