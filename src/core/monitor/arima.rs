//! ARIMA(p, d, q) fitting for short CPU usage series.
//!
//! The series is differenced `d` times and ARMA(p, q) coefficients are fitted
//! to the result by conditional sum of squares (residuals before lag `p` are
//! taken as zero).
//!
//! - Pure autoregressions are linear in the coefficients and are solved
//!   exactly by least squares, then checked for stationarity.
//! - With a moving-average part the objective is minimised by Nelder-Mead over
//!   partial autocorrelations mapped through `tanh`, so every candidate is
//!   stationary and invertible. A two-stage Hannan-Rissanen regression
//!   supplies the starting point when the window is long enough.
//!
//! A one-step forecast is integrated back to the original scale and rejected
//! when it lands far outside the range of the fitted series.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SysfeedError};

/// Relative pivot threshold below which the normal equations are singular
const SINGULAR_EPSILON: f64 = 1e-10;

/// Bound on unconstrained parameters; keeps every partial autocorrelation
/// strictly inside (-1, 1).
const MAX_UNCONSTRAINED: f64 = 6.0;

const SIMPLEX_STEP: f64 = 0.1;
const SIMPLEX_TOLERANCE: f64 = 1e-10;
const SIMPLEX_ITERATIONS_PER_PARAM: usize = 250;

/// A forecast more than this many window spans beyond the window is rejected
const FORECAST_SPAN_LIMIT: f64 = 3.0;
/// Smallest span used for that check, so flat windows still allow noise
const MIN_SPAN: f64 = 1.0;

/// Model order: autoregressive `p`, differencing `d`, moving-average `q`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaOrder {
    pub const fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    /// Fewest observations for which `fit` can succeed with this order.
    pub fn min_observations(&self) -> usize {
        let differenced = if self.q == 0 {
            // least squares: p lags and more rows than coefficients
            2 * self.p + 1
        } else {
            self.p + self.q + 1
        };
        differenced + self.d
    }
}

impl Default for ArimaOrder {
    fn default() -> Self {
        Self::new(2, 1, 2)
    }
}

impl std::fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{},{})", self.p, self.d, self.q)
    }
}

/// A fitted model, ready to forecast one step past the fitted series
#[derive(Debug, Clone)]
pub struct ArimaFit {
    order: ArimaOrder,
    ar: Vec<f64>,
    ma: Vec<f64>,
    mean: f64,
    /// Last value of each differencing level, level 0 first
    tails: Vec<f64>,
    /// Demeaned differenced series
    z: Vec<f64>,
    residuals: Vec<f64>,
    /// Smallest and largest value of the fitted series
    low: f64,
    high: f64,
}

impl ArimaFit {
    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma
    }

    /// One-step-ahead forecast on the original (undifferenced) scale.
    pub fn forecast_one(&self) -> Result<f64> {
        let n = self.z.len();
        let mut next = arma_step(&self.z, &self.residuals, n, &self.ar, &self.ma) + self.mean;

        for tail in self.tails.iter().rev() {
            next += tail;
        }

        if !next.is_finite() {
            return Err(SysfeedError::forecast("forecast is not finite"));
        }

        let span = (self.high - self.low).max(MIN_SPAN);
        let floor = self.low - FORECAST_SPAN_LIMIT * span;
        let ceiling = self.high + FORECAST_SPAN_LIMIT * span;
        if next < floor || next > ceiling {
            return Err(SysfeedError::forecast(format!(
                "forecast {:.3} is far outside the fitted range [{:.3}, {:.3}]",
                next, self.low, self.high
            )));
        }

        Ok(next)
    }
}

/// Fit an ARIMA model of the given order to `series` (oldest first).
pub fn fit(series: &[f64], order: ArimaOrder) -> Result<ArimaFit> {
    if series.iter().any(|v| !v.is_finite()) {
        return Err(SysfeedError::forecast("series contains non-finite values"));
    }

    let needed = order.min_observations();
    if series.len() < needed {
        return Err(SysfeedError::insufficient_data(needed, series.len()));
    }

    let low = series.iter().copied().fold(f64::INFINITY, f64::min);
    let high = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut tails = Vec::with_capacity(order.d);
    let mut current = series.to_vec();
    for _ in 0..order.d {
        if let Some(&last) = current.last() {
            tails.push(last);
        }
        current = difference(&current);
    }

    // With no differencing the level is modelled around the sample mean
    let mean = if order.d == 0 { mean(&current) } else { 0.0 };
    let z: Vec<f64> = current.iter().map(|v| v - mean).collect();

    let (ar, ma) = estimate_coefficients(&z, order.p, order.q)?;

    if !is_stationary(&ar) {
        return Err(SysfeedError::forecast(format!(
            "autoregressive part {:?} is not stationary",
            ar
        )));
    }
    if !is_invertible(&ma) {
        return Err(SysfeedError::forecast(format!(
            "moving-average part {:?} is not invertible",
            ma
        )));
    }

    let residuals = innovations(&z, &ar, &ma);
    if residuals.iter().any(|e| !e.is_finite()) {
        return Err(SysfeedError::forecast("residual recursion diverged"));
    }

    Ok(ArimaFit {
        order,
        ar,
        ma,
        mean,
        tails,
        z,
        residuals,
        low,
        high,
    })
}

fn estimate_coefficients(z: &[f64], p: usize, q: usize) -> Result<(Vec<f64>, Vec<f64>)> {
    if p == 0 && q == 0 {
        return Ok((Vec::new(), Vec::new()));
    }

    if q == 0 {
        return Ok((fit_autoregression(z, p)?, Vec::new()));
    }

    let start = hannan_rissanen(z, p, q)
        .ok()
        .and_then(|(ar, ma)| unconstrained(&ar, &ma))
        .unwrap_or_else(|| vec![0.0; p + q]);

    let best = nelder_mead(|params| conditional_sum_of_squares(z, p, params), &start);
    Ok(constrained(&best, p))
}

/// Sum of squared residuals for unconstrained parameters
fn conditional_sum_of_squares(z: &[f64], p: usize, params: &[f64]) -> f64 {
    let (ar, ma) = constrained(params, p);
    let sum: f64 = innovations(z, &ar, &ma).iter().map(|e| e * e).sum();
    if sum.is_finite() {
        sum
    } else {
        f64::INFINITY
    }
}

/// Two-stage regression estimate; may be neither stationary nor invertible.
fn hannan_rissanen(z: &[f64], p: usize, q: usize) -> Result<(Vec<f64>, Vec<f64>)> {
    // Stage 1: long autoregression for innovation estimates
    let long = long_ar_order(z.len(), p, q);
    let long_coefficients = fit_autoregression(z, long)?;
    let mut innovations = vec![0.0; z.len()];
    for t in long..z.len() {
        let predicted: f64 = long_coefficients
            .iter()
            .enumerate()
            .map(|(i, c)| c * z[t - 1 - i])
            .sum();
        innovations[t] = z[t] - predicted;
    }

    // Stage 2: regress on own lags and lagged innovations
    let start = p.max(long + q);
    let mut rows = Vec::with_capacity(z.len().saturating_sub(start));
    let mut targets = Vec::with_capacity(rows.capacity());
    for t in start..z.len() {
        let mut row = Vec::with_capacity(p + q);
        row.extend((1..=p).map(|lag| z[t - lag]));
        row.extend((1..=q).map(|lag| innovations[t - lag]));
        rows.push(row);
        targets.push(z[t]);
    }

    let beta = least_squares(&rows, &targets)?;
    let (ar, ma) = beta.split_at(p);
    Ok((ar.to_vec(), ma.to_vec()))
}

/// Long AR order: at least p + q, growing with ln(n) while the data allows.
fn long_ar_order(n: usize, p: usize, q: usize) -> usize {
    let target = (n as f64).ln().ceil() as usize;
    let fits = |m: usize| n > 2 * m && n > p.max(m + q) + p + q;

    let mut long = (p + q).max(1);
    while long < target && fits(long + 1) {
        long += 1;
    }
    long
}

fn fit_autoregression(z: &[f64], order: usize) -> Result<Vec<f64>> {
    let rows: Vec<Vec<f64>> = (order..z.len())
        .map(|t| (1..=order).map(|lag| z[t - lag]).collect())
        .collect();
    let targets: Vec<f64> = z[order..].to_vec();
    least_squares(&rows, &targets)
}

/// Map unconstrained parameters to AR and MA coefficients.
fn constrained(params: &[f64], p: usize) -> (Vec<f64>, Vec<f64>) {
    let partials: Vec<f64> = params
        .iter()
        .map(|x| x.clamp(-MAX_UNCONSTRAINED, MAX_UNCONSTRAINED).tanh())
        .collect();
    let (ar_partials, ma_partials) = partials.split_at(p.min(partials.len()));

    let ar = from_partials(ar_partials);
    let ma = from_partials(ma_partials).into_iter().map(|c| -c).collect();
    (ar, ma)
}

/// Inverse of [`constrained`]; `None` unless the coefficients are admissible.
fn unconstrained(ar: &[f64], ma: &[f64]) -> Option<Vec<f64>> {
    let negated: Vec<f64> = ma.iter().map(|c| -c).collect();
    let mut partials = to_partials(ar)?;
    partials.extend(to_partials(&negated)?);

    Some(
        partials
            .into_iter()
            .map(|r| r.atanh().clamp(-MAX_UNCONSTRAINED, MAX_UNCONSTRAINED))
            .collect(),
    )
}

/// Durbin-Levinson recursion: partial autocorrelations to AR coefficients.
fn from_partials(partials: &[f64]) -> Vec<f64> {
    let mut phi: Vec<f64> = Vec::with_capacity(partials.len());
    for (k, &r) in partials.iter().enumerate() {
        let previous = phi.clone();
        for j in 0..k {
            phi[j] = previous[j] - r * previous[k - 1 - j];
        }
        phi.push(r);
    }
    phi
}

/// Step-down recursion: AR coefficients to partial autocorrelations.
///
/// `None` when some partial autocorrelation is not strictly inside (-1, 1),
/// which happens exactly when `1 - phi_1 z - ... - phi_p z^p` has a root on
/// or inside the unit circle.
fn to_partials(coefficients: &[f64]) -> Option<Vec<f64>> {
    let mut phi = coefficients.to_vec();
    let mut partials = vec![0.0; phi.len()];

    for k in (0..phi.len()).rev() {
        let r = phi[k];
        if r.is_nan() || r.abs() >= 1.0 {
            return None;
        }
        partials[k] = r;

        let denominator = 1.0 - r * r;
        phi = (0..k)
            .map(|j| (phi[j] + r * phi[k - 1 - j]) / denominator)
            .collect();
    }

    Some(partials)
}

fn is_stationary(ar: &[f64]) -> bool {
    to_partials(ar).is_some()
}

/// `1 + theta_1 z + ... + theta_q z^q` has all roots outside the unit circle.
fn is_invertible(ma: &[f64]) -> bool {
    let negated: Vec<f64> = ma.iter().map(|c| -c).collect();
    to_partials(&negated).is_some()
}

/// Residuals of the fitted ARMA recursion, conditioned on zero residuals
/// before lag `p`.
fn innovations(z: &[f64], ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let p = ar.len().min(z.len());
    let mut residuals = vec![0.0; p];
    for t in p..z.len() {
        let predicted = arma_step(z, &residuals, t, ar, ma);
        residuals.push(z[t] - predicted);
    }
    residuals
}

/// ARMA prediction of position `t` from values and residuals before `t`.
fn arma_step(z: &[f64], residuals: &[f64], t: usize, ar: &[f64], ma: &[f64]) -> f64 {
    let ar_part: f64 = ar
        .iter()
        .enumerate()
        .filter(|(i, _)| *i < t)
        .map(|(i, phi)| phi * z[t - 1 - i])
        .sum();
    let ma_part: f64 = ma
        .iter()
        .enumerate()
        .filter(|(j, _)| *j < t)
        .map(|(j, theta)| theta * residuals[t - 1 - j])
        .sum();
    ar_part + ma_part
}

/// Minimise `f` with the Nelder-Mead simplex method, starting at `start`.
fn nelder_mead<F: Fn(&[f64]) -> f64>(f: F, start: &[f64]) -> Vec<f64> {
    let n = start.len();
    if n == 0 {
        return Vec::new();
    }

    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
    simplex.push((start.to_vec(), f(start)));
    for i in 0..n {
        let mut point = start.to_vec();
        point[i] += SIMPLEX_STEP;
        let value = f(&point);
        simplex.push((point, value));
    }

    for _ in 0..SIMPLEX_ITERATIONS_PER_PARAM * n {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        let best = simplex[0].1;
        let worst = simplex[n].1;
        if (worst - best).abs() <= SIMPLEX_TOLERANCE * (best.abs() + SIMPLEX_TOLERANCE) {
            break;
        }

        let centroid: Vec<f64> = (0..n)
            .map(|i| simplex[..n].iter().map(|(point, _)| point[i]).sum::<f64>() / n as f64)
            .collect();

        let reflected = along(&centroid, &simplex[n].0, 1.0);
        let reflected_value = f(&reflected);

        if reflected_value < best {
            let expanded = along(&centroid, &simplex[n].0, 2.0);
            let expanded_value = f(&expanded);
            simplex[n] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
        } else if reflected_value < simplex[n - 1].1 {
            simplex[n] = (reflected, reflected_value);
        } else {
            let contracted = along(&centroid, &simplex[n].0, -0.5);
            let contracted_value = f(&contracted);
            if contracted_value < worst {
                simplex[n] = (contracted, contracted_value);
            } else {
                // shrink everything toward the best point
                let anchor = simplex[0].0.clone();
                for (point, value) in simplex.iter_mut().skip(1) {
                    for (x, a) in point.iter_mut().zip(&anchor) {
                        *x = a + 0.5 * (*x - a);
                    }
                    *value = f(point);
                }
            }
        }
    }

    simplex
        .into_iter()
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(point, _)| point)
        .unwrap_or_else(|| start.to_vec())
}

/// `centroid + scale * (centroid - worst)`
fn along(centroid: &[f64], worst: &[f64], scale: f64) -> Vec<f64> {
    centroid
        .iter()
        .zip(worst)
        .map(|(c, w)| c + scale * (c - w))
        .collect()
}

/// Ordinary least squares through the normal equations.
fn least_squares(rows: &[Vec<f64>], targets: &[f64]) -> Result<Vec<f64>> {
    let k = rows.first().map(Vec::len).unwrap_or(0);
    if k == 0 || rows.len() <= k {
        return Err(SysfeedError::insufficient_data(k + 1, rows.len()));
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, y) in rows.iter().zip(targets) {
        for i in 0..k {
            xty[i] += row[i] * y;
            for j in 0..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }

    solve(xtx, xty)
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    let scale = (0..n).map(|i| a[i][i].abs()).fold(0.0_f64, f64::max);
    if scale == 0.0 || !scale.is_finite() {
        return Err(SysfeedError::forecast("design matrix is singular"));
    }

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))
            .unwrap_or(col);
        if a[pivot_row][col].abs() <= SINGULAR_EPSILON * scale {
            return Err(SysfeedError::forecast("design matrix is singular"));
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(SysfeedError::forecast("coefficients are not finite"));
    }
    Ok(x)
}

fn difference(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
