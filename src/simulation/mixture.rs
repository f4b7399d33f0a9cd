//! Mixture sampling by inverse CDF over the component weights

use crate::error::{ForecastError, Result};
use rand::Rng;

/// Normalise weights to sum to one. Negative, non-finite or all-zero
/// weights are rejected.
pub fn normalize_weights(weights: &[f64]) -> Result<Vec<f64>> {
    if weights.is_empty() {
        return Err(ForecastError::InvalidDistribution("mixture has no components".into()));
    }
    if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(ForecastError::InvalidDistribution(format!(
            "mixture weight {} is not a non-negative number",
            bad
        )));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(ForecastError::InvalidDistribution("mixture weights sum to zero".into()));
    }
    Ok(weights.iter().map(|w| w / total).collect())
}

/// Component index for each of `n` draws.
///
/// Draw i takes component k when cdf[k-1] <= u < cdf[k]; u at or past
/// the final cdf value goes to the last component.
pub fn assign_components<R: Rng + ?Sized>(weights: &[f64], n: usize, rng: &mut R) -> Result<Vec<usize>> {
    let normalized = normalize_weights(weights)?;
    let cdf: Vec<f64> = normalized
        .iter()
        .scan(0.0, |acc, w| {
            *acc += w;
            Some(*acc)
        })
        .collect();
    let last = cdf.len() - 1;

    Ok((0..n)
        .map(|_| {
            let u: f64 = rng.random();
            cdf.iter().position(|c| u < *c).unwrap_or(last)
        })
        .collect())
}

/// Pick, per draw, the value of the component chosen by weight
pub fn mixture_sample<R: Rng + ?Sized>(
    components: &[Vec<f64>],
    weights: &[f64],
    rng: &mut R,
) -> Result<Vec<f64>> {
    if components.len() != weights.len() {
        return Err(ForecastError::InvalidDistribution(format!(
            "{} components but {} weights",
            components.len(),
            weights.len()
        )));
    }
    let Some(first) = components.first() else {
        return Err(ForecastError::InvalidDistribution("mixture has no components".into()));
    };
    let n = first.len();
    if components.iter().any(|c| c.len() != n) {
        return Err(ForecastError::InvalidDistribution(
            "mixture components have different sample counts".into(),
        ));
    }

    let choice = assign_components(weights, n, rng)?;
    Ok(choice
        .iter()
        .enumerate()
        .map(|(i, k)| components[*k][i])
        .collect())
}
