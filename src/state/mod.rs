//! Persisted question state
//!
//! A question keeps one JSON file holding its forecast, history, events,
//! cumulative count and the monitor's dedup and value memory.


use crate::error::{ForecastError, Result};
use crate::types::{ForecastEntry, TrackedEvent};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::Path;
use tracing::debug;

/// Read a JSON file, or the default when it does not exist yet
pub async fn load_json<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No state file, starting fresh");
            return Ok(T::default());
        }
        Err(e) => {
            return Err(ForecastError::State {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        }
    };

    serde_json::from_str(&content).map_err(|e| ForecastError::State {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Write pretty JSON via a sibling temp file and rename
pub async fn save_json<T, P>(path: P, value: &T) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tokio::fs::write(&tmp, json.as_bytes()).await?;
    tokio::fs::rename(&tmp, path).await?;

    debug!(path = %path.display(), "Saved state");
    Ok(())
}

/// Insertion-ordered set of content hashes, keeping the newest `cap`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeenSet {
    order: VecDeque<String>,
    index: HashSet<String>,
}

impl SeenSet {
    pub fn contains(&self, hash: &str) -> bool {
        self.index.contains(hash)
    }

    /// Returns false when the hash was already present
    pub fn insert(&mut self, hash: String) -> bool {
        if self.index.contains(&hash) {
            return false;
        }
        self.index.insert(hash.clone());
        self.order.push_back(hash);
        true
    }

    /// Drop the oldest hashes beyond `cap`
    pub fn truncate(&mut self, cap: usize) {
        while self.order.len() > cap {
            if let Some(old) = self.order.pop_front() {
                self.index.remove(&old);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }
}

impl Serialize for SeenSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.order.iter())
    }
}

impl<'de> Deserialize<'de> for SeenSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hashes = Vec::<String>::deserialize(deserializer)?;
        let mut set = SeenSet::default();
        for hash in hashes {
            set.insert(hash);
        }
        Ok(set)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionStatus {
    #[default]
    Active,
    ResolvedYes,
    ResolvedNo,
}

/// Everything remembered about one question between runs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionState {
    /// None until the first forecast is recorded; callers seed it from config
    pub forecast: Option<f64>,
    pub status: QuestionStatus,
    pub events: Vec<TrackedEvent>,
    pub forecast_history: Vec<ForecastEntry>,
    pub cumulative_count: u64,
    pub seen: SeenSet,
    pub last_values: BTreeMap<String, f64>,
    pub last_run: Option<DateTime<Utc>>,
}

impl QuestionState {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_json(path).await
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_json(path, self).await
    }

    /// Stored forecast, or `initial` when none has been recorded
    pub fn current_forecast(&self, initial: f64) -> f64 {
        self.forecast.unwrap_or(initial)
    }
}
