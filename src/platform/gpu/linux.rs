use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::usage_reading;
use crate::core::monitor::{GpuProbe, GpuVendor, ProbeResult};
use crate::error::{Result, SysfeedError};
use crate::platform::command::capture_until;

const DRM_ROOT: &str = "/sys/class/drm";
const RENDER_ENGINE: &str = "Render/3D/0";

/// Intel integrated GPU probe using `intel_gpu_top -J`
///
/// `intel_gpu_top` streams samples until stopped, so it is run for the
/// probe timeout at most and stopped as soon as the first sample is complete.
pub struct IntelGpuTopProbe {
    window: Duration,
}

impl IntelGpuTopProbe {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }
}

impl GpuProbe for IntelGpuTopProbe {
    fn name(&self) -> &'static str {
        "linux-intel"
    }

    fn applies(&self) -> bool {
        cfg!(target_os = "linux") && which::which("intel_gpu_top").is_ok()
    }

    fn try_read(&self) -> Result<ProbeResult> {
        // Sample period well below the window so at least one sample lands
        let period_ms = (self.window.as_millis() / 3).max(100).to_string();
        let output = capture_until(
            "intel_gpu_top",
            &["-J", "-s", &period_ms],
            self.window,
            |so_far| first_sample(so_far).is_some(),
        )?;
        let busy = parse_intel_gpu_top(&output)?;
        Ok(ProbeResult::detected(GpuVendor::Intel, Some(busy)))
    }
}

/// The first complete JSON object in `output`, if one has been printed yet
fn first_sample(output: &str) -> Option<serde_json::Value> {
    let start = output.find('{')?;
    serde_json::Deserializer::from_str(&output[start..])
        .into_iter::<serde_json::Value>()
        .next()?
        .ok()
}

/// Extract the render engine's busy percentage from the first JSON sample
pub fn parse_intel_gpu_top(output: &str) -> Result<f64> {
    let sample = first_sample(output)
        .ok_or_else(|| SysfeedError::gpu_not_available("intel_gpu_top printed no sample"))?;

    let busy = sample
        .get("engines")
        .and_then(|engines| engines.get(RENDER_ENGINE))
        .and_then(|engine| engine.get("busy"))
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| {
            SysfeedError::gpu_not_available(format!("no {} busy value in sample", RENDER_ENGINE))
        })?;

    usage_reading(busy)
}

/// AMD GPU probe reading `gpu_busy_percent` from the amdgpu sysfs interface
pub struct AmdSysfsProbe {
    drm_root: PathBuf,
}

impl AmdSysfsProbe {
    pub fn new() -> Self {
        Self::with_root(DRM_ROOT)
    }

    /// Probe a different DRM class directory (for tests)
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self {
            drm_root: root.as_ref().to_path_buf(),
        }
    }

    /// `cardN` directories, lowest N first (connectors like `card0-DP-1` excluded)
    fn cards(&self) -> Result<Vec<PathBuf>> {
        let mut cards: Vec<(u32, PathBuf)> = fs::read_dir(&self.drm_root)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                let index = name.to_str()?.strip_prefix("card")?.parse::<u32>().ok()?;
                Some((index, entry.path()))
            })
            .collect();

        cards.sort_by_key(|(index, _)| *index);
        Ok(cards.into_iter().map(|(_, path)| path).collect())
    }
}

impl Default for AmdSysfsProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuProbe for AmdSysfsProbe {
    fn name(&self) -> &'static str {
        "linux-amd"
    }

    fn applies(&self) -> bool {
        self.drm_root.is_dir()
    }

    fn try_read(&self) -> Result<ProbeResult> {
        for card in self.cards()? {
            let path = card.join("device").join("gpu_busy_percent");
            let Ok(raw) = fs::read_to_string(&path) else {
                continue;
            };

            match raw.trim().parse::<f64>() {
                Ok(value) => {
                    let busy = usage_reading(value)?;
                    return Ok(ProbeResult::detected(GpuVendor::Amd, Some(busy)));
                }
                Err(e) => log::debug!("Unreadable {}: {}", path.display(), e),
            }
        }

        Err(SysfeedError::gpu_not_available(
            "no card exposes gpu_busy_percent",
        ))
    }
}
