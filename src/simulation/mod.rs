//! Monte Carlo ensemble simulation
//!
//! A question's model is a weighted mixture of component distributions.
//! Each component is sampled in full, one component is picked per draw by
//! weight, the mixture is clipped to its bounds and summarised by
//! percentiles, mean and tail probabilities.

pub mod component;
pub mod events;
pub mod mixture;

#[cfg(test)]
mod tests;

pub use component::{clip, Component};
pub use events::{any_event, sensitivity, winner_shares, AnyEventReport, Contender, EventCandidate};
pub use mixture::{assign_components, mixture_sample, normalize_weights};

use crate::config::SimulationConfig;
use crate::error::{ForecastError, Result};
use crate::stats::{self, fraction_above, fraction_below};
use crate::types::Percentiles;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const OUTPUT_JSON: &str = "forecast_output.json";
pub const OUTPUT_CSV: &str = "forecast_percentiles.csv";

/// A weighted, named mixture component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedComponent {
    pub name: String,
    pub weight: f64,
    pub distribution: Component,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentSummary {
    pub name: String,
    pub kind: String,
    /// Normalised weight
    pub weight: f64,
    /// Share of draws actually taken from this component
    pub realized_share: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MixtureSummary {
    pub forecast_percentiles: Percentiles,
    pub forecast_mean: f64,
    pub forecast_std: f64,
    pub tail_probs: BTreeMap<String, f64>,
    pub components: Vec<ComponentSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub as_of_utc: DateTime<Utc>,
    pub target: String,
    pub samples: usize,
    pub seed: u64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mixture: Option<MixtureSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any_event: Option<AnyEventReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_shares: Option<BTreeMap<String, f64>>,
}

/// Seeded Monte Carlo runner
pub struct Simulator {
    samples: usize,
    seed: u64,
}

impl Simulator {
    pub fn new(samples: usize, seed: u64) -> Self {
        Self { samples, seed }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.samples, config.seed)
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Run the mixture and any configured event simulations
    pub fn run(&self, config: &SimulationConfig) -> Result<SimulationReport> {
        if config.components.is_empty() && config.candidates.is_empty() && config.contenders.is_empty() {
            return Err(ForecastError::Config(
                "simulation needs components, candidates or contenders".into(),
            ));
        }
        if self.samples == 0 {
            return Err(ForecastError::Config("simulation.samples must be positive".into()));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        tracing::info!(
            quantity = %config.target,
            samples = self.samples,
            seed = self.seed,
            "Running simulation"
        );

        let mixture = if config.components.is_empty() {
            None
        } else {
            Some(self.run_mixture(config, &mut rng)?)
        };

        let (any, sens) = if config.candidates.is_empty() {
            (None, None)
        } else {
            let report = any_event(&config.candidates, self.samples, &mut rng)?;
            let sens = sensitivity(&config.candidates, self.samples, self.seed)?;
            (Some(report), Some(sens))
        };

        let winners = if config.contenders.is_empty() {
            None
        } else {
            Some(winner_shares(&config.contenders, self.samples, &mut rng)?)
        };

        Ok(SimulationReport {
            as_of_utc: Utc::now(),
            target: config.target.clone(),
            samples: self.samples,
            seed: self.seed,
            lower: config.lower,
            upper: config.upper,
            mixture,
            any_event: any,
            sensitivity: sens,
            winner_shares: winners,
        })
    }

    fn run_mixture(&self, config: &SimulationConfig, rng: &mut StdRng) -> Result<MixtureSummary> {
        let mut draws = Vec::with_capacity(config.components.len());
        for named in &config.components {
            let values = named.distribution.sample(self.samples, rng).map_err(|e| match e {
                ForecastError::InvalidDistribution(msg) => {
                    ForecastError::InvalidDistribution(format!("{}: {}", named.name, msg))
                }
                other => other,
            })?;
            draws.push(values);
        }

        let raw_weights: Vec<f64> = config.components.iter().map(|c| c.weight).collect();
        let weights = normalize_weights(&raw_weights)?;
        let choice = assign_components(&weights, self.samples, rng)?;

        let mut counts = vec![0usize; draws.len()];
        let mut mixed: Vec<f64> = choice
            .iter()
            .enumerate()
            .map(|(i, k)| {
                counts[*k] += 1;
                draws[*k][i]
            })
            .collect();
        clip(&mut mixed, config.lower, config.upper);

        let components = config
            .components
            .iter()
            .zip(&draws)
            .zip(weights.iter().zip(&counts))
            .map(|((named, values), (w, count))| ComponentSummary {
                name: named.name.clone(),
                kind: named.distribution.kind().to_string(),
                weight: *w,
                realized_share: *count as f64 / self.samples as f64,
                mean: component::sample_mean(values),
            })
            .collect();

        let mut tail_probs = BTreeMap::new();
        for x in &config.tails_below {
            tail_probs.insert(tail_label("lt", *x), fraction_below(&mixed, *x));
        }
        for x in &config.tails_above {
            tail_probs.insert(tail_label("gt", *x), fraction_above(&mixed, *x));
        }

        Ok(MixtureSummary {
            forecast_percentiles: Percentiles::from_samples(&mixed)?,
            forecast_mean: stats::mean(&mixed)?,
            forecast_std: stats::std(&mixed, 0)?,
            tail_probs,
            components,
        })
    }
}

/// `p_lt_49`, `p_gt_56_5`, `p_lt_m1`
pub fn tail_label(op: &str, x: f64) -> String {
    let value = if x.fract() == 0.0 {
        format!("{}", x as i64)
    } else {
        format!("{}", x)
    };
    format!("p_{}_{}", op, value.replace('.', "_").replace('-', "m"))
}

/// Write forecast_output.json and, when a mixture ran, forecast_percentiles.csv
pub fn write_outputs(report: &SimulationReport, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let json_path = dir.join(OUTPUT_JSON);
    std::fs::write(&json_path, serde_json::to_string_pretty(report)?)?;
    let mut written = vec![json_path];

    if let Some(mixture) = &report.mixture {
        let csv_path = dir.join(OUTPUT_CSV);
        let mut writer = csv::Writer::from_path(&csv_path)?;
        writer.write_record(["percentile", "value"])?;
        for (label, value) in mixture.forecast_percentiles.entries() {
            writer.write_record([label.to_string(), value.to_string()])?;
        }
        writer.flush()?;
        written.push(csv_path);
    }

    Ok(written)
}
