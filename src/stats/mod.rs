//! Statistical primitives shared by the simulation and ensemble models
//!
//! Percentiles use linear interpolation between closest ranks, standard
//! deviations take an explicit `ddof`.

pub mod probability;
pub mod series;

#[cfg(test)]
mod tests;

pub use probability::{bayesian_update, business_days_between, lognormal_from_quartiles, poisson_sf};
pub use series::{
    analog_transitions, ema, fit_ar1, fit_logit_ar1, inv_logit, lag1_autocorrelation, logit,
    Ar1Fit, LogitAr1Fit,
};

use crate::error::{ForecastError, Result};
use crate::types::Percentiles;

pub(crate) fn require(values: &[f64], needed: usize) -> Result<()> {
    if values.len() < needed {
        return Err(ForecastError::InsufficientData {
            needed,
            got: values.len(),
        });
    }
    Ok(())
}

pub fn mean(values: &[f64]) -> Result<f64> {
    require(values, 1)?;
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation with `ddof` delta degrees of freedom
pub fn std(values: &[f64], ddof: usize) -> Result<f64> {
    require(values, ddof + 1)?;
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Ok((ss / (values.len() - ddof) as f64).sqrt())
}

pub fn median(values: &[f64]) -> Result<f64> {
    percentile(values, 50.0)
}

/// q-th percentile (0-100), linear interpolation between closest ranks
pub fn percentile(values: &[f64], q: f64) -> Result<f64> {
    require(values, 1)?;
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Ok(percentile_sorted(&sorted, q))
}

/// Same as [`percentile`] on an already ascending, non-empty slice
pub(crate) fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let q = q.clamp(0.0, 100.0);
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

impl Percentiles {
    pub fn from_samples(values: &[f64]) -> Result<Self> {
        require(values, 1)?;
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Ok(Self {
            p5: percentile_sorted(&sorted, 5.0),
            p25: percentile_sorted(&sorted, 25.0),
            p50: percentile_sorted(&sorted, 50.0),
            p75: percentile_sorted(&sorted, 75.0),
            p95: percentile_sorted(&sorted, 95.0),
        })
    }

    /// Normal-approximation quantiles around a point estimate
    pub fn from_normal(mean: f64, sd: f64) -> Self {
        // standard normal quantiles for 0.95 and 0.75
        const Z95: f64 = 1.6448536269514722;
        const Z75: f64 = 0.6744897501960817;
        Self {
            p5: mean - Z95 * sd,
            p25: mean - Z75 * sd,
            p50: mean,
            p75: mean + Z75 * sd,
            p95: mean + Z95 * sd,
        }
    }
}

/// Share of values strictly below `x`
pub fn fraction_below(values: &[f64], x: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|v| **v < x).count() as f64 / values.len() as f64
}

/// Share of values strictly above `x`
pub fn fraction_above(values: &[f64], x: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|v| **v > x).count() as f64 / values.len() as f64
}

/// Ordinary least-squares fit of y on x
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation
    pub r: f64,
    /// Residual mean square (n - 2 denominator)
    pub mse: f64,
    pub n: usize,
    x_mean: f64,
    ss_x: f64,
}

impl LinearFit {
    pub fn r_squared(&self) -> f64 {
        self.r * self.r
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// Prediction interval for a new observation at `x0`, `z` standard errors wide.
    ///
    /// Returns `(point, lower, upper, standard_error)`.
    pub fn prediction_interval(&self, x0: f64, z: f64) -> (f64, f64, f64, f64) {
        let n = self.n as f64;
        let se = (self.mse * (1.0 + 1.0 / n + (x0 - self.x_mean).powi(2) / self.ss_x)).sqrt();
        let point = self.predict(x0);
        (point, point - z * se, point + z * se, se)
    }
}

pub fn linregress(x: &[f64], y: &[f64]) -> Result<LinearFit> {
    if x.len() != y.len() {
        return Err(ForecastError::Internal(format!(
            "linregress: x has {} points, y has {}",
            x.len(),
            y.len()
        )));
    }
    require(x, 3)?;

    let n = x.len();
    let x_mean = mean(x)?;
    let y_mean = mean(y)?;
    let ss_x: f64 = x.iter().map(|v| (v - x_mean).powi(2)).sum();
    let ss_y: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let s_xy: f64 = x.iter().zip(y).map(|(a, b)| (a - x_mean) * (b - y_mean)).sum();

    if ss_x == 0.0 {
        return Err(ForecastError::InsufficientData { needed: 2, got: 1 });
    }

    let slope = s_xy / ss_x;
    let intercept = y_mean - slope * x_mean;
    let r = if ss_y == 0.0 { 0.0 } else { s_xy / (ss_x * ss_y).sqrt() };
    let sse: f64 = x
        .iter()
        .zip(y)
        .map(|(a, b)| (b - (intercept + slope * a)).powi(2))
        .sum();

    Ok(LinearFit {
        slope,
        intercept,
        r,
        mse: sse / (n - 2) as f64,
        n,
        x_mean,
        ss_x,
    })
}
