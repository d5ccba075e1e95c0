//! Short-horizon CPU usage forecasting.
//!
//! The forecaster owns the rolling window of recent observations. Every tick
//! it ingests the current usage and returns a one-step-ahead prediction, or
//! the current usage itself while the window is still warming up or when
//! the model cannot be fitted.

use serde::{Deserialize, Serialize};

use super::arima::{self, ArimaOrder};
use super::history::{RollingWindow, DEFAULT_WINDOW_CAPACITY};
use crate::error::{Result, SysfeedError};

pub const DEFAULT_COLD_START: usize = 5;

/// Forecaster hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub window_capacity: usize,
    /// Window lengths at or below this return the input unchanged
    pub cold_start: usize,
    pub order: ArimaOrder,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            cold_start: DEFAULT_COLD_START,
            order: ArimaOrder::default(),
        }
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_capacity == 0 {
            return Err(SysfeedError::config("forecast window capacity must be > 0"));
        }

        let needed = self.order.min_observations();
        if needed > self.window_capacity {
            return Err(SysfeedError::config(format!(
                "ARIMA{} needs at least {} observations but the window holds {}",
                self.order, needed, self.window_capacity
            )));
        }

        Ok(())
    }
}

/// Rolling-window ARIMA forecaster for CPU usage
#[derive(Debug, Clone)]
pub struct Forecaster {
    window: RollingWindow,
    config: ForecastConfig,
    last_forecast: Option<f64>,
}

impl Forecaster {
    pub fn new() -> Self {
        Self::with_config(ForecastConfig::default())
    }

    pub fn with_config(config: ForecastConfig) -> Self {
        Self {
            window: RollingWindow::with_capacity(config.window_capacity),
            config,
            last_forecast: None,
        }
    }

    /// Ingest `current_usage` and predict the next value.
    ///
    /// Never fails: cold start and fitting failures both return
    /// `current_usage` unchanged.
    pub fn predict(&mut self, current_usage: f64) -> f64 {
        self.window.push(current_usage);

        let forecast = if self.window.len() <= self.config.cold_start {
            current_usage
        } else {
            match self.fit_and_forecast() {
                Ok(value) => value.clamp(0.0, 100.0),
                Err(e) if matches!(e, SysfeedError::InsufficientData { .. }) => {
                    log::debug!("CPU forecast skipped: {}", e);
                    current_usage
                }
                Err(e) => {
                    log::warn!("CPU forecast failed, using current usage: {}", e);
                    current_usage
                }
            }
        };

        self.last_forecast = Some(forecast);
        forecast
    }

    fn fit_and_forecast(&self) -> Result<f64> {
        let fit = arima::fit(&self.window.to_vec(), self.config.order)?;
        fit.forecast_one()
    }

    /// The most recent value returned by `predict`
    pub fn last_forecast(&self) -> Option<f64> {
        self.last_forecast
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }
}

impl Default for Forecaster {
    fn default() -> Self {
        Self::new()
    }
}
