//! Component distributions of a Monte Carlo mixture

use crate::error::{ForecastError, Result};
use crate::stats::{self, analog_transitions, fit_ar1, fit_logit_ar1, lognormal_from_quartiles};
use rand::Rng;
use rand_distr::{Distribution, LogNormal, Normal, Poisson, Triangular};
use serde::{Deserialize, Serialize};

/// One distribution in a mixture, tagged by `type` in config files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Component {
    Constant {
        value: f64,
    },
    Normal {
        mean: f64,
        sd: f64,
    },
    #[serde(rename = "lognormal")]
    LogNormal {
        mu: f64,
        sigma: f64,
    },
    /// Lognormal matched to three quartiles
    #[serde(rename = "lognormal_quartiles")]
    LogNormalQuartiles {
        p25: f64,
        p50: f64,
        p75: f64,
    },
    /// Normal clipped (not rejected) to the bounds
    TruncatedNormal {
        mean: f64,
        sd: f64,
        #[serde(default)]
        lower: Option<f64>,
        #[serde(default)]
        upper: Option<f64>,
    },
    Poisson {
        lambda: f64,
    },
    Triangular {
        low: f64,
        mode: f64,
        high: f64,
    },
    Uniform {
        low: f64,
        high: f64,
    },
    /// Resample observed values, optionally with normal jitter
    Bootstrap {
        values: Vec<f64>,
        #[serde(default)]
        jitter_sd: f64,
    },
    /// AR(1) fitted on `history`, simulated `steps` ahead of its last value
    Ar1 {
        history: Vec<f64>,
        #[serde(default = "default_steps")]
        steps: usize,
    },
    /// AR(1) in logit space on `history / scale`, one step ahead, rescaled
    LogitAr1 {
        history: Vec<f64>,
        #[serde(default = "default_scale")]
        scale: f64,
    },
    /// Bootstrap of what followed past observations near the latest one
    Analog {
        history: Vec<f64>,
        band: f64,
        #[serde(default)]
        jitter_sd: f64,
        fallback_sd: f64,
    },
    /// start * exp(N(mu * steps, sd * sqrt(steps)))
    LogReturn {
        start: f64,
        mu: f64,
        sd: f64,
        steps: f64,
    },
    Sum {
        terms: Vec<Component>,
    },
    Product {
        factors: Vec<Component>,
    },
}

fn default_steps() -> usize {
    1
}

fn default_scale() -> f64 {
    100.0
}

fn invalid(msg: impl Into<String>) -> ForecastError {
    ForecastError::InvalidDistribution(msg.into())
}

fn normal(mean: f64, sd: f64) -> Result<Normal<f64>> {
    Normal::new(mean, sd).map_err(|e| invalid(format!("normal({}, {}): {}", mean, sd, e)))
}

fn draw<D: Distribution<f64>, R: Rng + ?Sized>(dist: &D, n: usize, rng: &mut R) -> Vec<f64> {
    (0..n).map(|_| dist.sample(rng)).collect()
}

fn resample<R: Rng + ?Sized>(values: &[f64], jitter_sd: f64, n: usize, rng: &mut R) -> Result<Vec<f64>> {
    if values.is_empty() {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }
    let jitter = normal(0.0, jitter_sd)?;
    Ok((0..n)
        .map(|_| values[rng.random_range(0..values.len())] + jitter.sample(rng))
        .collect())
}

impl Component {
    /// Short label for logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            Component::Constant { .. } => "constant",
            Component::Normal { .. } => "normal",
            Component::LogNormal { .. } => "lognormal",
            Component::LogNormalQuartiles { .. } => "lognormal_quartiles",
            Component::TruncatedNormal { .. } => "truncated_normal",
            Component::Poisson { .. } => "poisson",
            Component::Triangular { .. } => "triangular",
            Component::Uniform { .. } => "uniform",
            Component::Bootstrap { .. } => "bootstrap",
            Component::Ar1 { .. } => "ar1",
            Component::LogitAr1 { .. } => "logit_ar1",
            Component::Analog { .. } => "analog",
            Component::LogReturn { .. } => "log_return",
            Component::Sum { .. } => "sum",
            Component::Product { .. } => "product",
        }
    }

    /// Draw `n` independent samples
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<f64>> {
        match self {
            Component::Constant { value } => Ok(vec![*value; n]),

            Component::Normal { mean, sd } => Ok(draw(&normal(*mean, *sd)?, n, rng)),

            Component::LogNormal { mu, sigma } => {
                let dist = LogNormal::new(*mu, *sigma)
                    .map_err(|e| invalid(format!("lognormal({}, {}): {}", mu, sigma, e)))?;
                Ok(draw(&dist, n, rng))
            }

            Component::LogNormalQuartiles { p25, p50, p75 } => {
                let (mu, sigma) = lognormal_from_quartiles(*p25, *p50, *p75)?;
                Component::LogNormal { mu, sigma }.sample(n, rng)
            }

            Component::TruncatedNormal { mean, sd, lower, upper } => {
                if let (Some(lo), Some(hi)) = (lower, upper) {
                    if lo > hi {
                        return Err(invalid(format!("truncated normal bounds inverted: {} > {}", lo, hi)));
                    }
                }
                let mut values = draw(&normal(*mean, *sd)?, n, rng);
                clip(&mut values, *lower, *upper);
                Ok(values)
            }

            Component::Poisson { lambda } => {
                if *lambda < 0.0 || !lambda.is_finite() {
                    return Err(invalid(format!("poisson lambda must be non-negative, got {}", lambda)));
                }
                if *lambda == 0.0 {
                    return Ok(vec![0.0; n]);
                }
                let dist = Poisson::new(*lambda)
                    .map_err(|e| invalid(format!("poisson({}): {}", lambda, e)))?;
                Ok(draw(&dist, n, rng))
            }

            Component::Triangular { low, mode, high } => {
                let dist = Triangular::new(*low, *high, *mode)
                    .map_err(|e| invalid(format!("triangular({}, {}, {}): {}", low, mode, high, e)))?;
                Ok(draw(&dist, n, rng))
            }

            Component::Uniform { low, high } => {
                if low > high {
                    return Err(invalid(format!("uniform bounds inverted: {} > {}", low, high)));
                }
                let width = high - low;
                Ok((0..n).map(|_| low + width * rng.random::<f64>()).collect())
            }

            Component::Bootstrap { values, jitter_sd } => resample(values, *jitter_sd, n, rng),

            Component::Ar1 { history, steps } => {
                let fit = fit_ar1(history)?;
                let last = history[history.len() - 1];
                tracing::debug!(a = fit.a, b = fit.b, sigma = fit.sigma, "ar1 fit");
                fit.simulate(last, *steps, n, rng)
            }

            Component::LogitAr1 { history, scale } => {
                if *scale <= 0.0 {
                    return Err(invalid(format!("logit_ar1 scale must be positive, got {}", scale)));
                }
                let fractions: Vec<f64> = history.iter().map(|v| v / scale).collect();
                let fit = fit_logit_ar1(&fractions)?;
                let last = fractions[fractions.len() - 1];
                tracing::debug!(
                    intercept = fit.intercept,
                    slope = fit.slope,
                    sigma = fit.sigma,
                    "logit ar1 fit"
                );
                Ok(fit.step(last, n, rng)?.into_iter().map(|p| p * scale).collect())
            }

            Component::Analog { history, band, jitter_sd, fallback_sd } => {
                let Some(&last) = history.last() else {
                    return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
                };
                let next = analog_transitions(history, *band);
                if next.len() >= 2 {
                    resample(&next, *jitter_sd, n, rng)
                } else {
                    tracing::debug!(analogs = next.len(), "too few analogs, using fallback normal");
                    Ok(draw(&normal(last, *fallback_sd)?, n, rng))
                }
            }

            Component::LogReturn { start, mu, sd, steps } => {
                if *steps < 0.0 {
                    return Err(invalid(format!("log_return steps must be non-negative, got {}", steps)));
                }
                let dist = normal(mu * steps, sd * steps.sqrt())?;
                Ok((0..n).map(|_| start * dist.sample(rng).exp()).collect())
            }

            Component::Sum { terms } => combine(terms, n, rng, 0.0, |acc, v| acc + v),

            Component::Product { factors } => combine(factors, n, rng, 1.0, |acc, v| acc * v),
        }
    }
}

fn combine<R: Rng + ?Sized>(
    parts: &[Component],
    n: usize,
    rng: &mut R,
    identity: f64,
    op: impl Fn(f64, f64) -> f64,
) -> Result<Vec<f64>> {
    if parts.is_empty() {
        return Err(invalid("sum/product needs at least one term"));
    }
    let mut out = vec![identity; n];
    for part in parts {
        let draws = part.sample(n, rng)?;
        for (acc, v) in out.iter_mut().zip(draws) {
            *acc = op(*acc, v);
        }
    }
    Ok(out)
}

/// Clamp every value into the optional bounds
pub fn clip(values: &mut [f64], lower: Option<f64>, upper: Option<f64>) {
    for v in values.iter_mut() {
        if let Some(lo) = lower {
            *v = v.max(lo);
        }
        if let Some(hi) = upper {
            *v = v.min(hi);
        }
    }
}

/// Mean of a component's draws, for summaries
pub(crate) fn sample_mean(values: &[f64]) -> f64 {
    stats::mean(values).unwrap_or(f64::NAN)
}
