// Platform-specific code module

pub mod command;
pub mod gpu;
pub mod sysinfo_source;

// Re-exports for clean imports
pub use gpu::default_probe_chain;
pub use sysinfo_source::SysinfoSource;
