//! Monitoring runs
//!
//! One run:
//! 1. Load question state
//! 2. Fetch news (skipped with `values_only`)
//! 3. Drop items already seen
//! 4. Classify relevance (LLM, falling back to keywords)
//! 5. Fetch and diff watched values and market prices
//! 6. Raise alerts, update state, write the report
//!
//! A dry run does all the fetching and classification but writes nothing.
//! A quick check skips fetching entirely: the LLM is asked directly about
//! recent developments and nothing is persisted.

pub mod alerts;
pub mod report;


pub use alerts::{diff_values, news_alerts};
pub use report::{render_markdown, write_report};

use crate::classify::{self, Classifier, ClassifiedItem, ClassifyContext, ForecastRecommendation, KeywordClassifier, LlmClassifier};
use crate::config::{Config, MonitorConfig, QuestionConfig};
use crate::error::{ForecastError, Result};
use crate::sources::{self, MarketFeed, MarketQuote, Source, ValueProbe};
use crate::state::QuestionState;
use crate::storage::Journal;
use crate::tracker::{ThresholdProgress, Tracker};
use crate::types::{Alert, NewsItem};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Fetch and classify, but persist nothing
    pub dry_run: bool,
    /// Values only, no news sources
    pub values_only: bool,
}

/// JSON summary of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: DateTime<Utc>,
    pub question_id: String,
    pub question: String,
    pub dry_run: bool,
    pub values_only: bool,
    pub items_checked: usize,
    pub new_items: usize,
    pub relevant: Vec<ClassifiedItem>,
    pub method: String,
    pub total_new_count: u64,
    pub cumulative_count: u64,
    pub forecast: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ThresholdProgress>,
    pub values: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub markets: Vec<MarketQuote>,
    pub alerts: Vec<Alert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<ForecastRecommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
}

/// Answer of a quick check; never written to state
#[derive(Debug, Clone, Serialize)]
pub struct QuickCheckReport {
    pub timestamp: DateTime<Utc>,
    pub question_id: String,
    pub question: String,
    pub classifier: String,
    pub forecast: f64,
    pub cumulative_count: u64,
    pub findings: String,
}

pub struct Monitor {
    question: QuestionConfig,
    settings: MonitorConfig,
    sources: Vec<Arc<dyn Source>>,
    probes: Vec<Arc<dyn ValueProbe>>,
    markets: Vec<Arc<dyn MarketFeed>>,
    llm: Option<Box<dyn Classifier>>,
    keywords: KeywordClassifier,
    journal: Option<Journal>,
}

impl Monitor {
    /// A monitor with no sources attached
    pub fn new(question: QuestionConfig, settings: MonitorConfig) -> Self {
        let keywords = KeywordClassifier::from_config(&settings);
        Self {
            question,
            settings,
            sources: Vec::new(),
            probes: Vec::new(),
            markets: Vec::new(),
            llm: None,
            keywords,
            journal: None,
        }
    }

    /// Build sources, value watches and the LLM classifier from config
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = sources::http_client()?;
        let llm: Option<Box<dyn Classifier>> = match &config.llm {
            Some(llm_config) => match LlmClassifier::from_config(llm_config) {
                Ok(classifier) => Some(Box::new(classifier)),
                Err(e) => {
                    warn!("LLM unavailable, using keyword analysis: {}", e);
                    None
                }
            },
            None => None,
        };

        let mut monitor = Self::new(config.question.clone(), config.monitor.clone())
            .with_sources(sources::news_sources(&config.monitor, &http))
            .with_probes(sources::value_probes(&config.monitor, &http))
            .with_markets(sources::market_scans(&config.monitor, &http));
        monitor.llm = llm;
        Ok(monitor)
    }

    pub fn with_sources(mut self, sources: Vec<Arc<dyn Source>>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_probes(mut self, probes: Vec<Arc<dyn ValueProbe>>) -> Self {
        self.probes = probes;
        self
    }

    pub fn with_markets(mut self, markets: Vec<Arc<dyn MarketFeed>>) -> Self {
        self.markets = markets;
        self
    }

    pub fn with_classifier(mut self, classifier: Box<dyn Classifier>) -> Self {
        self.llm = Some(classifier);
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Ask the LLM about recent developments without fetching any sources
    pub async fn quick_check(&self) -> Result<QuickCheckReport> {
        let llm = self.llm.as_deref().ok_or_else(|| {
            ForecastError::Config("quick check needs an [llm] section with a usable API key".into())
        })?;
        let state = QuestionState::load(&self.settings.state_file).await?;
        let tracker = Tracker::new(self.question.clone(), state);

        let context = ClassifyContext {
            question: self.question.title.clone(),
            forecast: tracker.forecast(),
            cumulative: tracker.state().cumulative_count,
            threshold: self.question.threshold,
            watchlist: self.settings.watchlist.clone(),
        };
        info!(question = %self.question.id, classifier = llm.name(), "Quick check starting");
        let findings = llm.review(&context).await?;

        Ok(QuickCheckReport {
            timestamp: Utc::now(),
            question_id: self.question.id.clone(),
            question: self.question.title.clone(),
            classifier: llm.name().to_string(),
            forecast: context.forecast,
            cumulative_count: context.cumulative,
            findings,
        })
    }

    pub async fn run(&self, options: RunOptions) -> Result<RunReport> {
        let now = Utc::now();
        info!(
            question = %self.question.id,
            dry_run = options.dry_run,
            values_only = options.values_only,
            "Monitor run starting"
        );

        let state = QuestionState::load(&self.settings.state_file).await?;
        let previous_values = state.last_values.clone();
        let mut tracker = Tracker::new(self.question.clone(), state);

        let items = if options.values_only {
            Vec::new()
        } else {
            sources::collect(&self.sources).await
        };
        let items_checked = items.len();
        let fresh = dedup(tracker.state_mut(), items);
        info!(checked = items_checked, new = fresh.len(), "Deduplicated items");

        let context = ClassifyContext {
            question: self.question.title.clone(),
            forecast: tracker.forecast(),
            cumulative: tracker.state().cumulative_count,
            threshold: self.question.threshold,
            watchlist: self.settings.watchlist.clone(),
        };
        let classification = classify::classify(&fresh, &context, self.llm.as_deref(), &self.keywords).await;

        if classification.total_new_count > 0 {
            let total = tracker.add_count(classification.total_new_count);
            info!(added = classification.total_new_count, total, "Cumulative count updated");
        }

        let mut current = BTreeMap::new();
        let mut thresholds = BTreeMap::new();
        for probe in &self.probes {
            thresholds.insert(probe.name().to_string(), probe.large_move());
            if let Some(value) = probe.fetch_value().await {
                current.insert(probe.name().to_string(), value);
            }
        }

        let mut markets = Vec::new();
        for feed in &self.markets {
            match feed.fetch_quotes().await {
                Ok(quotes) => {
                    for quote in &quotes {
                        if let Some(price) = quote.yes_price {
                            let name = quote.value_name();
                            thresholds.insert(name.clone(), feed.large_move());
                            current.insert(name, price);
                        }
                    }
                    markets.extend(quotes);
                }
                Err(e) => warn!("Market scan {} failed: {}", feed.name(), e),
            }
        }

        let mut alerts = diff_values(&previous_values, &current, &thresholds);
        alerts.extend(news_alerts(&classification));
        for alert in &alerts {
            info!(alert = %alert.alert_type, "Alert raised");
        }

        let history_before = tracker.state().forecast_history.len();
        if !classification.relevant.is_empty() {
            tracker.note_forecast(&format!(
                "Monitor: {} relevant items ({})",
                classification.relevant.len(),
                classification.method
            ));
        }

        {
            let state = tracker.state_mut();
            state.last_values.extend(current.clone());
            state.seen.truncate(self.settings.seen_cap);
            state.last_run = Some(now);
        }

        let mut report = RunReport {
            timestamp: now,
            question_id: self.question.id.clone(),
            question: self.question.title.clone(),
            dry_run: options.dry_run,
            values_only: options.values_only,
            items_checked,
            new_items: fresh.len(),
            relevant: classification.relevant,
            method: classification.method,
            total_new_count: classification.total_new_count,
            cumulative_count: tracker.state().cumulative_count,
            forecast: tracker.forecast(),
            progress: tracker.progress(now.date_naive()),
            values: current,
            markets,
            alerts,
            recommendation: classification.recommendation,
            report_path: None,
        };

        if options.dry_run {
            info!("Dry run, nothing persisted");
            return Ok(report);
        }

        tracker.state().save(&self.settings.state_file).await?;

        let watched: Vec<String> = self.probes.iter().map(|p| p.name().to_string()).collect();
        let path = write_report(&self.settings.report_dir, &report, &watched).await?;
        report.report_path = Some(path.display().to_string());

        if let Some(journal) = &self.journal {
            let run_id = journal.record_run(&report).await?;
            for alert in &report.alerts {
                journal.record_alert(&run_id, alert).await?;
            }
            for entry in &tracker.state().forecast_history[history_before..] {
                journal.record_forecast(&self.question.id, entry).await?;
            }
        }

        info!(
            relevant = report.relevant.len(),
            alerts = report.alerts.len(),
            "Monitor run complete"
        );
        Ok(report)
    }
}

/// Items whose content hash was not seen before, marking them seen
fn dedup(state: &mut QuestionState, items: Vec<NewsItem>) -> Vec<NewsItem> {
    items
        .into_iter()
        .filter(|item| state.seen.insert(item.content_hash()))
        .collect()
}
