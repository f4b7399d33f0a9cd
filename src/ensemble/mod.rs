//! Point-estimate ensembles
//!
//! Combines independent estimates by weight, scores multi-outcome
//! questions from weighted factors, and blends model and crowd
//! probabilities.


use crate::config::{EnsembleConfig, FactorConfig};
use crate::error::{ForecastError, Result};
use crate::types::Percentiles;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One model's estimate and its weight in the ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedEstimate {
    pub name: String,
    pub value: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnsembleEstimate {
    pub value: f64,
    pub total_weight: f64,
    /// name -> value * normalised weight
    pub contributions: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<Percentiles>,
}

/// Weighted mean of the estimates; weights that do not sum to one are normalised
pub fn combine(estimates: &[WeightedEstimate]) -> Result<EnsembleEstimate> {
    if estimates.is_empty() {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }
    if let Some(bad) = estimates.iter().find(|e| e.weight < 0.0 || !e.weight.is_finite()) {
        return Err(ForecastError::Config(format!(
            "estimate {} has invalid weight {}",
            bad.name, bad.weight
        )));
    }
    let total_weight: f64 = estimates.iter().map(|e| e.weight).sum();
    if total_weight <= 0.0 {
        return Err(ForecastError::Config("ensemble weights sum to zero".into()));
    }
    if (total_weight - 1.0).abs() > 1e-6 {
        tracing::warn!(total_weight, "Ensemble weights do not sum to 1, normalising");
    }

    let contributions: BTreeMap<String, f64> = estimates
        .iter()
        .map(|e| (e.name.clone(), e.value * e.weight / total_weight))
        .collect();

    Ok(EnsembleEstimate {
        value: contributions.values().sum(),
        total_weight,
        contributions,
        interval: None,
    })
}

/// Combine the configured estimates and attach a (widened) normal interval when `sd` is set
pub fn combine_config(config: &EnsembleConfig) -> Result<EnsembleEstimate> {
    let mut estimate = combine(&config.estimates)?;
    if let Some(sd) = config.sd {
        estimate.interval = Some(Percentiles::from_normal(estimate.value, sd * config.widen));
    }
    Ok(estimate)
}

/// Additive factor scoring for multi-outcome questions
#[derive(Debug, Clone)]
pub struct FactorModel {
    pub base: f64,
    pub weights: BTreeMap<String, f64>,
    pub floor: f64,
    pub ceiling: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FactorScore {
    pub raw: f64,
    pub clamped: f64,
    /// factor -> weight * value, for factors with a known weight
    pub contributions: BTreeMap<String, f64>,
}

impl FactorModel {
    pub fn from_config(config: &FactorConfig) -> Self {
        Self {
            base: config.base,
            weights: config.weights.clone(),
            floor: config.floor,
            ceiling: config.ceiling,
        }
    }

    /// base + sum(weight * value), clamped to [floor, ceiling]
    pub fn score(&self, factors: &BTreeMap<String, f64>) -> FactorScore {
        let mut contributions = BTreeMap::new();
        for (factor, value) in factors {
            match self.weights.get(factor) {
                Some(w) => {
                    contributions.insert(factor.clone(), w * value);
                }
                None => tracing::debug!(factor = %factor, "No weight for factor, ignoring"),
            }
        }
        let raw = self.base + contributions.values().sum::<f64>();
        FactorScore {
            raw,
            clamped: raw.clamp(self.floor, self.ceiling),
            contributions,
        }
    }

    /// Clamped scores rescaled to sum to one
    pub fn normalized(
        &self,
        candidates: &BTreeMap<String, BTreeMap<String, f64>>,
    ) -> Result<BTreeMap<String, f64>> {
        let scores: BTreeMap<String, f64> = candidates
            .iter()
            .map(|(name, factors)| (name.clone(), self.score(factors).clamped))
            .collect();
        normalize(scores)
    }
}

fn normalize(map: BTreeMap<String, f64>) -> Result<BTreeMap<String, f64>> {
    let total: f64 = map.values().sum();
    if total <= 0.0 {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }
    Ok(map.into_iter().map(|(k, v)| (k, v / total)).collect())
}

/// Weighted average of two outcome distributions, renormalised.
/// Outcomes missing on one side count as zero there.
pub fn blend_outcomes(
    model: &BTreeMap<String, f64>,
    community: &BTreeMap<String, f64>,
    model_weight: f64,
) -> Result<BTreeMap<String, f64>> {
    if !(0.0..=1.0).contains(&model_weight) {
        return Err(ForecastError::Config(format!(
            "model_weight must be within [0, 1], got {}",
            model_weight
        )));
    }
    let mut blended = BTreeMap::new();
    for name in model.keys().chain(community.keys()) {
        let m = model.get(name).copied().unwrap_or(0.0);
        let c = community.get(name).copied().unwrap_or(0.0);
        blended.insert(name.clone(), model_weight * m + (1.0 - model_weight) * c);
    }
    normalize(blended)
}

/// Result of the `ensemble` command
#[derive(Debug, Clone, Serialize)]
pub struct EnsembleReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<EnsembleEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_probabilities: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blended_probabilities: Option<BTreeMap<String, f64>>,
}

pub fn run(config: &EnsembleConfig) -> Result<EnsembleReport> {
    let point = if config.estimates.is_empty() {
        None
    } else {
        Some(combine_config(config)?)
    };

    let (model_probabilities, blended_probabilities) = match &config.factors {
        Some(factors) => {
            let model = FactorModel::from_config(factors).normalized(&factors.candidates)?;
            let blended = if factors.community.is_empty() {
                None
            } else {
                Some(blend_outcomes(&model, &factors.community, factors.model_weight)?)
            };
            (Some(model), blended)
        }
        None => (None, None),
    };

    if point.is_none() && model_probabilities.is_none() {
        return Err(ForecastError::Config("ensemble needs estimates or factors".into()));
    }

    Ok(EnsembleReport {
        point,
        model_probabilities,
        blended_probabilities,
    })
}
