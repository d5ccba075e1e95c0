// Command handlers module
pub mod config;
pub mod serve;
pub mod snapshot;

use anyhow::Result;
use std::path::Path;

use crate::core::Config;

// Re-exports for cleaner imports
pub use config::execute as config;
pub use serve::execute as serve;
pub use snapshot::execute as snapshot;

/// Effective configuration: an explicit file is strict, the default
/// location falls back to defaults.
pub(crate) fn load_config(path: Option<&String>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(Path::new(path)),
        None => Config::load(),
    }
}
