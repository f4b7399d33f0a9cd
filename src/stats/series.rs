//! Time-series fits: AR(1), AR(1) in logit space, EMA, analog transitions

use super::{mean, require, std};
use crate::error::{ForecastError, Result};
use rand::Rng;
use rand_distr::{Distribution, Normal};

const LOGIT_EPS: f64 = 1e-6;
const LOGIT_SIGMA_FLOOR: f64 = 0.25;

/// x[t+1] = a * x[t] + b + N(0, sigma)
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Ar1Fit {
    pub a: f64,
    pub b: f64,
    pub sigma: f64,
}

/// Fit AR(1) with population moments: a = cov(x, y) / var(x)
pub fn fit_ar1(series: &[f64]) -> Result<Ar1Fit> {
    require(series, 3)?;
    let x = &series[..series.len() - 1];
    let y = &series[1..];
    let x_mean = mean(x)?;
    let y_mean = mean(y)?;
    let n = x.len() as f64;

    let var_x = x.iter().map(|v| (v - x_mean).powi(2)).sum::<f64>() / n;
    if var_x == 0.0 {
        return Err(ForecastError::InsufficientData { needed: 2, got: 1 });
    }
    let cov = x
        .iter()
        .zip(y)
        .map(|(a, b)| (a - x_mean) * (b - y_mean))
        .sum::<f64>()
        / n;

    let a = cov / var_x;
    let b = y_mean - a * x_mean;
    let resid: Vec<f64> = x.iter().zip(y).map(|(xv, yv)| yv - (a * xv + b)).collect();
    let sigma = std(&resid, 0)?;

    Ok(Ar1Fit { a, b, sigma })
}

impl Ar1Fit {
    pub fn predict(&self, last: f64) -> f64 {
        self.a * last + self.b
    }

    /// `n` independent paths, `steps` ahead of `last`; returns the terminal values
    pub fn simulate<R: Rng + ?Sized>(&self, last: f64, steps: usize, n: usize, rng: &mut R) -> Result<Vec<f64>> {
        let noise = Normal::new(0.0, self.sigma)
            .map_err(|e| ForecastError::InvalidDistribution(format!("ar1 sigma: {}", e)))?;
        let mut paths = vec![last; n];
        for _ in 0..steps {
            for s in paths.iter_mut() {
                *s = self.a * *s + self.b + noise.sample(rng);
            }
        }
        Ok(paths)
    }
}

pub fn logit(p: f64) -> f64 {
    let p = p.clamp(LOGIT_EPS, 1.0 - LOGIT_EPS);
    (p / (1.0 - p)).ln()
}

pub fn inv_logit(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// AR(1) on logit(p): z[t+1] = intercept + slope * z[t] + N(0, sigma)
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct LogitAr1Fit {
    pub intercept: f64,
    pub slope: f64,
    pub sigma: f64,
}

/// Fit on fractions in (0, 1). Residual sigma uses ddof=2 past two
/// residuals and is floored at 0.25. Two points give a single transition,
/// which is treated like a flat history.
pub fn fit_logit_ar1(fractions: &[f64]) -> Result<LogitAr1Fit> {
    require(fractions, 2)?;
    let z: Vec<f64> = fractions.iter().map(|p| logit(*p)).collect();
    let x = &z[..z.len() - 1];
    let y = &z[1..];

    let x_mean = mean(x)?;
    let y_mean = mean(y)?;
    let ss_x: f64 = x.iter().map(|v| (v - x_mean).powi(2)).sum();
    let (slope, intercept) = if ss_x == 0.0 || x.len() == 1 {
        // flat history: persistence around the constant level
        (0.0, y_mean)
    } else {
        let s_xy: f64 = x.iter().zip(y).map(|(a, b)| (a - x_mean) * (b - y_mean)).sum();
        let slope = s_xy / ss_x;
        (slope, y_mean - slope * x_mean)
    };

    let resid: Vec<f64> = x
        .iter()
        .zip(y)
        .map(|(xv, yv)| yv - (intercept + slope * xv))
        .collect();
    let sigma = if resid.len() > 2 {
        std(&resid, 2)?
    } else {
        std(&resid, 0)?
    };

    Ok(LogitAr1Fit {
        intercept,
        slope,
        sigma: sigma.max(LOGIT_SIGMA_FLOOR),
    })
}

impl LogitAr1Fit {
    /// One-step-ahead draws, returned as fractions
    pub fn step<R: Rng + ?Sized>(&self, last_fraction: f64, n: usize, rng: &mut R) -> Result<Vec<f64>> {
        let noise = Normal::new(0.0, self.sigma)
            .map_err(|e| ForecastError::InvalidDistribution(format!("logit ar1 sigma: {}", e)))?;
        let z_last = logit(last_fraction);
        Ok((0..n)
            .map(|_| inv_logit(self.intercept + self.slope * z_last + noise.sample(rng)))
            .collect())
    }
}

/// Exponential moving average, alpha = 2 / (span + 1), seeded with the first value
pub fn ema(values: &[f64], span: usize) -> Result<Vec<f64>> {
    require(values, 1)?;
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    out.push(values[0]);
    for v in &values[1..] {
        let prev = out[out.len() - 1];
        out.push(alpha * v + (1.0 - alpha) * prev);
    }
    Ok(out)
}

/// Pearson correlation between x[t] and x[t+1]
pub fn lag1_autocorrelation(values: &[f64]) -> Result<f64> {
    require(values, 3)?;
    let x = &values[..values.len() - 1];
    let y = &values[1..];
    let x_mean = mean(x)?;
    let y_mean = mean(y)?;
    let s_xy: f64 = x.iter().zip(y).map(|(a, b)| (a - x_mean) * (b - y_mean)).sum();
    let ss_x: f64 = x.iter().map(|v| (v - x_mean).powi(2)).sum();
    let ss_y: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    if ss_x == 0.0 || ss_y == 0.0 {
        return Ok(0.0);
    }
    Ok(s_xy / (ss_x * ss_y).sqrt())
}

/// Values that followed every past observation within `band` of the latest one
pub fn analog_transitions(series: &[f64], band: f64) -> Vec<f64> {
    let Some(&last) = series.last() else {
        return Vec::new();
    };
    series
        .windows(2)
        .filter(|w| (w[0] - last).abs() <= band)
        .map(|w| w[1])
        .collect()
}
