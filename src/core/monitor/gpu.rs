//! GPU probe chain.
//!
//! Integrated GPU utilization is read differently per OS and vendor. Each
//! way of reading it is a [`GpuProbe`]; the [`ProbeChain`] tries them in
//! priority order and returns the first successful reading.

use super::metrics::ProbeResult;
use crate::error::Result;

/// Trait for one vendor/OS-specific way of reading GPU utilization
///
/// Implementations are provided in the platform layer.
pub trait GpuProbe: Send {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Whether this probe can run on the current platform
    fn applies(&self) -> bool;

    /// Attempt a reading; any error makes the chain move on
    fn try_read(&self) -> Result<ProbeResult>;
}

/// Ordered fallback list of GPU probes
#[derive(Default)]
pub struct ProbeChain {
    probes: Vec<Box<dyn GpuProbe>>,
}

impl ProbeChain {
    pub fn new(probes: Vec<Box<dyn GpuProbe>>) -> Self {
        Self { probes }
    }

    /// A chain with no probes, always unavailable
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push(&mut self, probe: Box<dyn GpuProbe>) {
        self.probes.push(probe);
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.probes.iter().map(|p| p.name()).collect()
    }

    /// Read GPU utilization; never fails.
    pub fn probe(&self) -> ProbeResult {
        for probe in &self.probes {
            if !probe.applies() {
                log::trace!("GPU probe '{}' does not apply", probe.name());
                continue;
            }

            match probe.try_read() {
                Ok(result) if result.available => {
                    log::trace!("GPU probe '{}' succeeded", probe.name());
                    return result;
                }
                Ok(_) => log::debug!("GPU probe '{}' found no GPU", probe.name()),
                Err(e) => log::debug!("GPU probe '{}' failed: {}", probe.name(), e),
            }
        }

        ProbeResult::unavailable()
    }
}

impl std::fmt::Debug for ProbeChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeChain")
            .field("probes", &self.names())
            .finish()
    }
}
