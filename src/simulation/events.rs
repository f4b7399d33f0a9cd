//! Event-style simulations: "will any of these happen" and "who finishes first"

use crate::error::{ForecastError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Triangular};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An actor that may trigger the event, with a triangular belief over its probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCandidate {
    pub name: String,
    pub low: f64,
    pub mode: f64,
    pub high: f64,
}

impl EventCandidate {
    fn belief(&self) -> Result<Belief> {
        let in_unit = |p: f64| (0.0..=1.0).contains(&p);
        if !(in_unit(self.low) && in_unit(self.mode) && in_unit(self.high)) {
            return Err(ForecastError::InvalidDistribution(format!(
                "candidate {} probabilities must lie in [0, 1]",
                self.name
            )));
        }
        if !(self.low <= self.mode && self.mode <= self.high) {
            return Err(ForecastError::InvalidDistribution(format!(
                "candidate {} needs low <= mode <= high",
                self.name
            )));
        }
        if self.low == self.high {
            return Ok(Belief::Fixed(self.low));
        }
        Triangular::new(self.low, self.high, self.mode)
            .map(Belief::Spread)
            .map_err(|e| ForecastError::InvalidDistribution(format!("candidate {}: {}", self.name, e)))
    }

    fn neutralized(&self) -> Self {
        Self {
            name: self.name.clone(),
            low: 0.0,
            mode: 0.001,
            high: 0.001,
        }
    }
}

enum Belief {
    Fixed(f64),
    Spread(Triangular<f64>),
}

impl Belief {
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Belief::Fixed(p) => *p,
            Belief::Spread(dist) => dist.sample(rng),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnyEventReport {
    pub probability: f64,
    pub std: f64,
    /// Share of runs in which each candidate fired
    pub contributions: BTreeMap<String, f64>,
    pub samples: usize,
}

/// P(at least one candidate fires), each firing with a freshly drawn probability per run
pub fn any_event<R: Rng + ?Sized>(candidates: &[EventCandidate], n: usize, rng: &mut R) -> Result<AnyEventReport> {
    if candidates.is_empty() || n == 0 {
        return Err(ForecastError::InsufficientData {
            needed: 1,
            got: candidates.len().min(n),
        });
    }
    let beliefs = candidates
        .iter()
        .map(EventCandidate::belief)
        .collect::<Result<Vec<_>>>()?;

    let mut fired = vec![0usize; candidates.len()];
    let mut any = 0usize;
    for _ in 0..n {
        let mut hit = false;
        for (i, belief) in beliefs.iter().enumerate() {
            let p = belief.draw(rng);
            if rng.random::<f64>() < p {
                fired[i] += 1;
                hit = true;
            }
        }
        if hit {
            any += 1;
        }
    }

    let probability = any as f64 / n as f64;
    let contributions = candidates
        .iter()
        .zip(&fired)
        .map(|(c, count)| (c.name.clone(), *count as f64 / n as f64))
        .collect();

    Ok(AnyEventReport {
        probability,
        std: (probability * (1.0 - probability)).sqrt(),
        contributions,
        samples: n,
    })
}

/// Drop in P(any) when each candidate is neutralised in turn.
///
/// Every run reuses `seed`, so differences reflect the candidate only.
pub fn sensitivity(candidates: &[EventCandidate], n: usize, seed: u64) -> Result<BTreeMap<String, f64>> {
    let base = any_event(candidates, n, &mut StdRng::seed_from_u64(seed))?.probability;

    let mut out = BTreeMap::new();
    for (idx, target) in candidates.iter().enumerate() {
        let modified: Vec<EventCandidate> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| if i == idx { c.neutralized() } else { c.clone() })
            .collect();
        let p = any_event(&modified, n, &mut StdRng::seed_from_u64(seed))?.probability;
        out.insert(target.name.clone(), base - p);
    }
    Ok(out)
}

/// A competitor whose score is N(mean, sd) clipped at zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contender {
    pub name: String,
    pub mean: f64,
    pub sd: f64,
}

/// Share of draws in which each contender has the top score.
/// Ties go to the alphabetically first name.
pub fn winner_shares<R: Rng + ?Sized>(contenders: &[Contender], n: usize, rng: &mut R) -> Result<BTreeMap<String, f64>> {
    if contenders.is_empty() || n == 0 {
        return Err(ForecastError::InsufficientData {
            needed: 1,
            got: contenders.len().min(n),
        });
    }

    let mut sorted: Vec<&Contender> = contenders.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    let dists = sorted
        .iter()
        .map(|c| {
            Normal::new(c.mean, c.sd).map_err(|e| {
                ForecastError::InvalidDistribution(format!("contender {}: {}", c.name, e))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut wins = vec![0usize; sorted.len()];
    for _ in 0..n {
        let mut best = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (i, dist) in dists.iter().enumerate() {
            let score = dist.sample(rng).max(0.0);
            if score > best_score {
                best = i;
                best_score = score;
            }
        }
        wins[best] += 1;
    }

    Ok(sorted
        .iter()
        .zip(&wins)
        .map(|(c, w)| (c.name.clone(), *w as f64 / n as f64))
        .collect())
}
