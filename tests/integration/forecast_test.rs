use sysfeed::core::monitor::arima::{self, ArimaOrder};
use sysfeed::core::monitor::{ForecastConfig, Forecaster, DEFAULT_COLD_START};
use sysfeed::SysfeedError;

/// CPU-like trace: slow oscillation plus deterministic jitter
fn cpu_trace(len: usize) -> Vec<f64> {
    let mut state: u64 = 0x2545_f491;
    (0..len)
        .map(|i| {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let jitter = ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5;
            40.0 + 15.0 * (i as f64 / 4.0).sin() + 6.0 * jitter
        })
        .collect()
}

#[test]
fn test_cold_start_passes_through() {
    let mut forecaster = Forecaster::new();
    for value in [10.0, 12.0, 11.0, 13.0, 12.0] {
        assert_eq!(forecaster.predict(value), value);
    }
    assert_eq!(forecaster.window().len(), DEFAULT_COLD_START);
}

#[test]
fn test_forecasts_stay_in_percent_range() {
    let mut forecaster = Forecaster::new();

    for value in cpu_trace(60) {
        let forecast = forecaster.predict(value);
        assert!(forecast.is_finite());
        assert!((0.0..=100.0).contains(&forecast), "forecast {} out of range", forecast);
        assert_eq!(forecaster.last_forecast(), Some(forecast));
    }

    // the window never grows past its capacity
    assert_eq!(forecaster.window().len(), forecaster.window().capacity());
}

#[test]
fn test_saturated_series_is_clamped() {
    let mut forecaster = Forecaster::with_config(ForecastConfig {
        order: ArimaOrder::new(1, 1, 0),
        ..Default::default()
    });
    let mut last = 0.0;
    // damped climb whose next step lands at 101
    for value in [38.0, 70.0, 86.0, 94.0, 98.0, 100.0] {
        last = forecaster.predict(value);
    }
    assert_eq!(last, 100.0);
}

#[test]
fn test_window_keeps_latest_values() {
    let config = ForecastConfig {
        window_capacity: 12,
        ..Default::default()
    };
    let mut forecaster = Forecaster::with_config(config);
    let trace = cpu_trace(30);
    for value in &trace {
        forecaster.predict(*value);
    }

    assert_eq!(forecaster.window().to_vec(), trace[18..].to_vec());
}

#[test]
fn test_sixth_value_reaches_the_model() {
    let order = ArimaOrder::default();
    assert!(order.min_observations() <= DEFAULT_COLD_START + 1);

    let trace = cpu_trace(DEFAULT_COLD_START + 1);
    let fitted = arima::fit(&trace, order).unwrap();
    let expected = fitted.forecast_one().unwrap().clamp(0.0, 100.0);

    let mut forecaster = Forecaster::new();
    let mut forecast = 0.0;
    for value in &trace {
        forecast = forecaster.predict(*value);
    }
    assert_eq!(forecast, expected);
}

#[test]
fn test_explosive_history_passes_through() {
    let mut forecaster = Forecaster::with_config(ForecastConfig {
        order: ArimaOrder::new(1, 1, 0),
        ..Default::default()
    });
    let mut forecast = 0.0;
    for value in [1.0, 2.0, 4.0, 8.0, 16.0, 32.0] {
        forecast = forecaster.predict(value);
    }
    assert_eq!(forecast, 32.0);
}

#[test]
fn test_fit_reports_missing_observations() {
    let order = ArimaOrder::default();
    let err = arima::fit(&cpu_trace(4), order).unwrap_err();
    assert!(matches!(
        err,
        SysfeedError::InsufficientData {
            available: 4,
            ..
        }
    ));
}
