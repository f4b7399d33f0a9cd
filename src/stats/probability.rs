//! Closed-form probability helpers

use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate, Weekday};

/// Standard normal quantile at 0.75
const Z75: f64 = 0.6744897501960817;

/// P(X >= k) for X ~ Poisson(lambda)
pub fn poisson_sf(k: u64, lambda: f64) -> Result<f64> {
    if !(lambda >= 0.0) {
        return Err(ForecastError::InvalidDistribution(format!(
            "poisson lambda must be non-negative, got {}",
            lambda
        )));
    }
    if k == 0 {
        return Ok(1.0);
    }
    if lambda == 0.0 {
        return Ok(0.0);
    }

    // cdf(k - 1), pmf terms accumulated in log space
    let mut log_pmf = -lambda;
    let mut cdf = log_pmf.exp();
    for i in 1..k {
        log_pmf += lambda.ln() - (i as f64).ln();
        cdf += log_pmf.exp();
    }
    Ok((1.0 - cdf).clamp(0.0, 1.0))
}

/// Posterior P(H | E) from a prior and the two likelihoods, in odds form
pub fn bayesian_update(prior: f64, p_e_given_true: f64, p_e_given_false: f64) -> Result<f64> {
    if !(prior > 0.0 && prior < 1.0) {
        return Err(ForecastError::InvalidForecast(prior));
    }
    if p_e_given_false <= 0.0 {
        return Err(ForecastError::InvalidDistribution(
            "likelihood under the alternative must be positive".into(),
        ));
    }
    let prior_odds = prior / (1.0 - prior);
    let posterior_odds = prior_odds * (p_e_given_true / p_e_given_false);
    Ok(posterior_odds / (1.0 + posterior_odds))
}

/// Lognormal (mu, sigma) whose quartiles match p25 / p50 / p75
pub fn lognormal_from_quartiles(p25: f64, p50: f64, p75: f64) -> Result<(f64, f64)> {
    if !(p25 > 0.0 && p25 < p50 && p50 < p75) {
        return Err(ForecastError::InvalidDistribution(format!(
            "lognormal quartiles must satisfy 0 < p25 < p50 < p75, got {} / {} / {}",
            p25, p50, p75
        )));
    }
    let mu = p50.ln();
    let sigma = (p75.ln() - p25.ln()) / (2.0 * Z75);
    Ok((mu, sigma))
}

/// Weekdays in [start, end)
pub fn business_days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    if end <= start {
        return 0;
    }
    start
        .iter_days()
        .take_while(|d| *d < end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .count() as i64
}
