//! Configuration management
//!
//! One TOML file describes one forecasting question: its dates and triggers,
//! the sources the monitor polls, and the Monte Carlo / ensemble models.

use crate::ensemble::WeightedEstimate;
use crate::simulation::{Contender, EventCandidate, NamedComponent};
use crate::sources::{Extractor, MarketProvider};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub question: QuestionConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    pub simulation: Option<SimulationConfig>,
    pub ensemble: Option<EnsembleConfig>,
    pub llm: Option<LlmConfig>,
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionConfig {
    /// Short identifier, used as the journal key
    pub id: String,
    /// Full question text
    pub title: String,
    /// Initial forecast probability (0-1)
    pub forecast: f64,
    /// Counting window start, for threshold questions
    pub start_date: Option<NaiveDate>,
    /// Counting window end
    pub end_date: Option<NaiveDate>,
    pub resolution_date: Option<NaiveDate>,
    /// Count needed for YES, for threshold questions
    pub threshold: Option<u64>,
    /// Named dates shown with countdowns in `status`
    #[serde(default)]
    pub key_dates: BTreeMap<String, NaiveDate>,
    /// Pre-committed forecast updates
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    pub name: String,
    pub condition: String,
    pub new_forecast: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// JSON state file, read at start and overwritten at the end of a run
    #[serde(default = "default_state_file")]
    pub state_file: String,
    /// Directory for MONITORING_REPORT_<date>.md
    #[serde(default = "default_dir")]
    pub report_dir: String,
    /// Number of content hashes kept for dedup
    #[serde(default = "default_seen_cap")]
    pub seen_cap: usize,
    /// Max entries taken from each feed per run
    #[serde(default = "default_item_limit")]
    pub item_limit: usize,
    /// Google News / NewsAPI search window
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    /// Topic keywords (e.g. "layoff", "job cuts")
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Entities of interest (e.g. company names)
    #[serde(default)]
    pub watchlist: Vec<String>,
    /// Secondary keywords that upgrade a topic match to MEDIUM
    #[serde(default)]
    pub context_keywords: Vec<String>,
    /// Google News search queries
    #[serde(default)]
    pub queries: Vec<String>,
    /// Plain RSS feeds
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    /// Pages scanned for watchlist mentions (layoff trackers and the like)
    #[serde(default)]
    pub trackers: Vec<FeedConfig>,
    /// Numeric values diffed against the previous run
    #[serde(default)]
    pub values: Vec<ValueWatchConfig>,
    /// Prediction markets scanned for related questions
    #[serde(default)]
    pub markets: Vec<MarketConfig>,
    /// NewsAPI key; falls back to NEWS_API_KEY
    pub news_api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValueWatchConfig {
    pub name: String,
    pub url: String,
    pub extractor: Extractor,
    /// Absolute change that raises a `<name>_large_move` alert
    #[serde(default = "default_large_move")]
    pub large_move: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    pub name: String,
    pub provider: MarketProvider,
    /// Overrides the provider's default endpoint
    pub url: Option<String>,
    /// Search term, for providers with a search endpoint
    pub term: Option<String>,
    /// Market titles must contain one of these (case-insensitive)
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Yes-price change (0-1) that raises a `<name>_large_move` alert
    #[serde(default = "default_market_move")]
    pub large_move: f64,
    /// Max matching markets kept per scan
    #[serde(default = "default_market_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Human-readable description of the simulated quantity
    pub target: String,
    #[serde(default = "default_samples")]
    pub samples: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Clip bounds applied to the mixture
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    #[serde(default = "default_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub components: Vec<NamedComponent>,
    /// Thresholds reported as P(x < t)
    #[serde(default)]
    pub tails_below: Vec<f64>,
    /// Thresholds reported as P(x > t)
    #[serde(default)]
    pub tails_above: Vec<f64>,
    /// "Will any of these happen" candidates
    #[serde(default)]
    pub candidates: Vec<EventCandidate>,
    /// "Who comes first" contenders
    #[serde(default)]
    pub contenders: Vec<Contender>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnsembleConfig {
    #[serde(default)]
    pub estimates: Vec<WeightedEstimate>,
    /// Spread of the combined estimate, for the normal interval
    pub sd: Option<f64>,
    /// Multiplier on `sd`
    #[serde(default = "default_widen")]
    pub widen: f64,
    pub factors: Option<FactorConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FactorConfig {
    pub base: f64,
    pub weights: BTreeMap<String, f64>,
    #[serde(default = "default_floor")]
    pub floor: f64,
    #[serde(default = "default_ceiling")]
    pub ceiling: f64,
    /// candidate -> factor -> value
    pub candidates: BTreeMap<String, BTreeMap<String, f64>>,
    /// Crowd / market probabilities to blend with
    #[serde(default)]
    pub community: BTreeMap<String, f64>,
    #[serde(default = "default_model_weight")]
    pub model_weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// LLM provider (anthropic, openai, deepseek, ollama, compatible)
    pub provider: String,
    /// API key; falls back to ANTHROPIC_API_KEY for anthropic
    #[serde(default)]
    pub api_key: String,
    /// Model name
    pub model: Option<String>,
    /// Base URL for OpenAI-compatible providers
    pub base_url: Option<String>,
}

fn default_state_file() -> String {
    "monitor_state.json".to_string()
}

fn default_dir() -> String {
    ".".to_string()
}

fn default_seen_cap() -> usize {
    500
}

fn default_item_limit() -> usize {
    15
}

fn default_lookback_days() -> u32 {
    3
}

fn default_large_move() -> f64 {
    0.7
}

fn default_market_move() -> f64 {
    0.05
}

fn default_market_limit() -> usize {
    10
}

fn default_samples() -> usize {
    300_000
}

fn default_seed() -> u64 {
    42
}

fn default_widen() -> f64 {
    1.0
}

fn default_floor() -> f64 {
    0.05
}

fn default_ceiling() -> f64 {
    0.95
}

fn default_model_weight() -> f64 {
    0.5
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            report_dir: default_dir(),
            seen_cap: default_seen_cap(),
            item_limit: default_item_limit(),
            lookback_days: default_lookback_days(),
            keywords: Vec::new(),
            watchlist: Vec::new(),
            context_keywords: Vec::new(),
            queries: Vec::new(),
            feeds: Vec::new(),
            trackers: Vec::new(),
            values: Vec::new(),
            markets: Vec::new(),
            news_api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from file, with FORECAST_* environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        // .env is optional; it only supplies API keys
        let _ = dotenvy::dotenv();

        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix("FORECAST").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config.finish()?)
    }

    /// Parse a TOML document directly (no file, no environment)
    pub fn from_toml_str(toml: &str) -> crate::error::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.finish()
    }

    /// Load from default locations
    pub fn load_default() -> anyhow::Result<Self> {
        let paths = ["question.toml", "forecast.toml", "~/.config/forecast-desk/question.toml"];

        for path in paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::load(expanded.as_ref());
            }
        }

        anyhow::bail!("No configuration file found")
    }

    fn finish(mut self) -> crate::error::Result<Self> {
        self.monitor.state_file = expand(&self.monitor.state_file);
        self.monitor.report_dir = expand(&self.monitor.report_dir);
        if let Some(sim) = self.simulation.as_mut() {
            sim.output_dir = expand(&sim.output_dir);
        }
        if let Some(db) = self.database.as_mut() {
            db.path = expand(&db.path);
        }
        if self.monitor.news_api_key.is_none() {
            self.monitor.news_api_key = std::env::var("NEWS_API_KEY").ok().filter(|k| !k.is_empty());
        }
        if let Some(llm) = self.llm.as_mut() {
            if llm.api_key.is_empty() {
                let var = match llm.provider.to_lowercase().as_str() {
                    "openai" | "gpt" => "OPENAI_API_KEY",
                    "deepseek" => "DEEPSEEK_API_KEY",
                    _ => "ANTHROPIC_API_KEY",
                };
                llm.api_key = std::env::var(var).unwrap_or_default();
            }
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> crate::error::Result<()> {
        use crate::error::ForecastError;

        if !(0.0..=1.0).contains(&self.question.forecast) {
            return Err(ForecastError::Config(format!(
                "question.forecast must be within [0, 1], got {}",
                self.question.forecast
            )));
        }
        for trigger in &self.question.triggers {
            if !(0.0..=1.0).contains(&trigger.new_forecast) {
                return Err(ForecastError::Config(format!(
                    "trigger {} has new_forecast {} outside [0, 1]",
                    trigger.name, trigger.new_forecast
                )));
            }
        }
        if let (Some(start), Some(end)) = (self.question.start_date, self.question.end_date) {
            if end <= start {
                return Err(ForecastError::Config("question.end_date must be after start_date".into()));
            }
        }
        if let Some(sim) = &self.simulation {
            if let (Some(lo), Some(hi)) = (sim.lower, sim.upper) {
                if lo > hi {
                    return Err(ForecastError::Config(format!(
                        "simulation bounds inverted: lower {} > upper {}",
                        lo, hi
                    )));
                }
            }
            if sim.samples == 0 {
                return Err(ForecastError::Config("simulation.samples must be positive".into()));
            }
        }
        Ok(())
    }

    pub fn trigger(&self, name: &str) -> Option<&TriggerConfig> {
        self.question.triggers.iter().find(|t| t.name == name)
    }
}

fn expand(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}
