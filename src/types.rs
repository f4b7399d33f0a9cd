//! Shared value types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The five reported quantiles of a forecast distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

impl Percentiles {
    /// (label, value) pairs in ascending order
    pub fn entries(&self) -> [(&'static str, f64); 5] {
        [
            ("p5", self.p5),
            ("p25", self.p25),
            ("p50", self.p50),
            ("p75", self.p75),
            ("p95", self.p95),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    #[default]
    News,
    Feed,
    Tracker,
}

/// A single article or feed entry pulled from a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub source: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub published: Option<String>,
    #[serde(default)]
    pub kind: ItemKind,
}

impl NewsItem {
    /// Dedup key: first 16 hex chars of SHA-256(title + url)
    pub fn content_hash(&self) -> String {
        content_hash(&format!("{}{}", self.title, self.url))
    }

    /// Lowercased title and description, used for keyword matching
    pub fn search_text(&self) -> String {
        format!("{} {}", self.title, self.description).to_lowercase()
    }
}

pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(16);
    hex
}

/// Alert raised by a monitoring run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub alert_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Alert {
    pub fn update(name: &str, prev: Option<f64>, new: f64) -> Self {
        Self {
            alert_type: format!("{}_update", name),
            prev,
            new: Some(new),
            delta: None,
            detail: None,
        }
    }

    pub fn large_move(name: &str, delta: f64) -> Self {
        Self {
            alert_type: format!("{}_large_move", name),
            prev: None,
            new: None,
            delta: Some(delta),
            detail: None,
        }
    }

    pub fn news(item: &NewsItem) -> Self {
        Self {
            alert_type: "high_relevance_news".to_string(),
            prev: None,
            new: None,
            delta: None,
            detail: Some(format!("{} ({})", item.title, item.url)),
        }
    }
}

/// One recorded forecast change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub date: DateTime<Utc>,
    pub forecast: f64,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cumulative: Option<u64>,
}

/// Manually or automatically logged question event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEvent {
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub description: String,
    #[serde(default)]
    pub source: String,
}
