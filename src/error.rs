use std::io;
use thiserror::Error;

/// Custom error type for sysfeed
#[derive(Error, Debug)]
pub enum SysfeedError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("GPU not available: {0}")]
    GpuNotAvailable(String),

    #[error("Metric collection failed: {0}")]
    MetricCollection(String),

    #[error("Forecast failed: {0}")]
    Forecast(String),

    #[error("Insufficient data for forecast: need {needed} points, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("Command '{command}' timed out after {timeout_ms} ms")]
    CommandTimeout { command: String, timeout_ms: u64 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Broadcast cycle failed: {0}")]
    Cycle(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for sysfeed
pub type Result<T> = std::result::Result<T, SysfeedError>;

impl SysfeedError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        SysfeedError::Config(msg.into())
    }

    pub fn gpu_not_available<S: Into<String>>(msg: S) -> Self {
        SysfeedError::GpuNotAvailable(msg.into())
    }

    pub fn metric_collection<S: Into<String>>(msg: S) -> Self {
        SysfeedError::MetricCollection(msg.into())
    }

    pub fn forecast<S: Into<String>>(msg: S) -> Self {
        SysfeedError::Forecast(msg.into())
    }

    pub fn command_timeout<S: Into<String>>(command: S, timeout_ms: u64) -> Self {
        SysfeedError::CommandTimeout {
            command: command.into(),
            timeout_ms,
        }
    }

    pub fn transport<S: Into<String>>(msg: S) -> Self {
        SysfeedError::Transport(msg.into())
    }

    pub fn cycle<S: Into<String>>(msg: S) -> Self {
        SysfeedError::Cycle(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        SysfeedError::Other(msg.into())
    }

    pub fn insufficient_data(needed: usize, available: usize) -> Self {
        SysfeedError::InsufficientData { needed, available }
    }
}
