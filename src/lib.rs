// sysfeed library - public API

// Re-export error types
pub mod error;
pub use error::{Result, SysfeedError};

// Module declarations
pub mod commands;
pub mod core;
pub mod platform;
pub mod server;

// Re-export commonly used types
pub use core::config::Config;

// Initialize logging
pub fn init_logging() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
