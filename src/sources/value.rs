//! Numeric value watches
//!
//! A watch fetches one document and pulls a single number out of it,
//! which the monitor diffs against the previous run.

use crate::config::ValueWatchConfig;
use crate::error::{ForecastError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

fn default_window() -> usize {
    200
}

/// How to find the number in a fetched document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Extractor {
    /// RFC 6901 pointer into a JSON body, e.g. `/observations/0/value`
    JsonPointer { pointer: String },
    /// Last numeric cell of a named CSV column
    CsvColumn { column: String },
    /// First number within `window` chars after `marker` (case-insensitive)
    TextAfter {
        marker: String,
        #[serde(default = "default_window")]
        window: usize,
    },
}

impl Extractor {
    pub fn extract(&self, body: &str) -> Result<f64> {
        match self {
            Extractor::JsonPointer { pointer } => {
                let doc: serde_json::Value = serde_json::from_str(body)?;
                let value = doc
                    .pointer(pointer)
                    .ok_or_else(|| ForecastError::Extraction(format!("no value at {}", pointer)))?;
                match value {
                    serde_json::Value::Number(n) => n.as_f64(),
                    serde_json::Value::String(s) => parse_number(s),
                    _ => None,
                }
                .ok_or_else(|| ForecastError::Extraction(format!("{} is not numeric: {}", pointer, value)))
            }
            Extractor::CsvColumn { column } => {
                let mut reader = csv::Reader::from_reader(body.as_bytes());
                let idx = reader
                    .headers()?
                    .iter()
                    .position(|h| h.trim() == column)
                    .ok_or_else(|| ForecastError::Extraction(format!("no column {}", column)))?;

                let mut last = None;
                for record in reader.records() {
                    if let Some(v) = record?.get(idx).and_then(parse_number) {
                        last = Some(v);
                    }
                }
                last.ok_or_else(|| ForecastError::Extraction(format!("column {} has no numbers", column)))
            }
            Extractor::TextAfter { marker, window } => {
                let lower = body.to_lowercase();
                let needle = marker.to_lowercase();
                let at = lower
                    .find(&needle)
                    .ok_or_else(|| ForecastError::Extraction(format!("marker {:?} not found", marker)))?;
                let tail: String = lower[at + needle.len()..].chars().take(*window).collect();
                first_number(&tail)
                    .ok_or_else(|| ForecastError::Extraction(format!("no number after {:?}", marker)))
            }
        }
    }
}

/// Parse "1,234.5", " 48.2 " or "12%"
fn parse_number(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

fn first_number(text: &str) -> Option<f64> {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let starts_negative = chars[i] == '-' && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit());
        if chars[i].is_ascii_digit() || starts_negative {
            let mut j = i + 1;
            while j < chars.len() && (chars[j].is_ascii_digit() || chars[j] == '.' || chars[j] == ',') {
                j += 1;
            }
            let token: String = chars[i..j].iter().collect();
            return parse_number(token.trim_end_matches(['.', ',']));
        }
        i += 1;
    }
    None
}

/// Something the monitor can poll for a single number
#[async_trait]
pub trait ValueProbe: Send + Sync {
    fn name(&self) -> &str;

    /// Absolute change that counts as a large move
    fn large_move(&self) -> f64;

    /// None when the fetch or the extraction failed this run
    async fn fetch_value(&self) -> Option<f64>;
}

pub struct ValueWatch {
    name: String,
    url: String,
    extractor: Extractor,
    large_move: f64,
    http: reqwest::Client,
}

impl ValueWatch {
    pub fn from_config(config: &ValueWatchConfig, http: reqwest::Client) -> Self {
        Self {
            name: config.name.clone(),
            url: config.url.clone(),
            extractor: config.extractor.clone(),
            large_move: config.large_move,
            http,
        }
    }

    async fn try_fetch(&self) -> Result<f64> {
        let response = self.http.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(ForecastError::Api(format!("{} returned {}", self.url, response.status())));
        }
        let body = response.text().await?;
        self.extractor.extract(&body)
    }
}

#[async_trait]
impl ValueProbe for ValueWatch {
    fn name(&self) -> &str {
        &self.name
    }

    fn large_move(&self) -> f64 {
        self.large_move
    }

    async fn fetch_value(&self) -> Option<f64> {
        match self.try_fetch().await {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Value {} unavailable: {}", self.name, e);
                None
            }
        }
    }
}
