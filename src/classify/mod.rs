//! Relevance classification of fetched news
//!
//! Items are graded HIGH / MEDIUM / LOW against the question. An LLM does
//! the grading when one is configured; the keyword classifier is always
//! available and takes over whenever the LLM call fails.

pub mod llm;


pub use llm::{LlmClassifier, LlmProvider};

use crate::error::{ForecastError, Result};
use crate::types::NewsItem;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Relevance {
    High,
    Medium,
    Low,
}

impl Relevance {
    pub fn is_relevant(self) -> bool {
        matches!(self, Relevance::High | Relevance::Medium)
    }
}

impl std::fmt::Display for Relevance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Relevance::High => "HIGH",
            Relevance::Medium => "MEDIUM",
            Relevance::Low => "LOW",
        };
        f.write_str(label)
    }
}

/// Why an item was judged relevant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub relevance: Relevance,
    /// Watchlist entity the item is about, when known
    #[serde(default)]
    pub entity: Option<String>,
    /// Count the item contributes (e.g. people laid off)
    #[serde(default)]
    pub estimated_count: Option<u64>,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedItem {
    #[serde(flatten)]
    pub item: NewsItem,
    pub analysis: Assessment,
}

/// Suggested forecast move returned by the LLM
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecommendation {
    /// UP / DOWN / UNCHANGED
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub new_probability: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Outcome of classifying one batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct Classification {
    /// HIGH and MEDIUM items only
    pub relevant: Vec<ClassifiedItem>,
    pub total_new_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<ForecastRecommendation>,
    /// Which classifier produced this ("keyword" or the LLM provider)
    pub method: String,
}

impl Classification {
    pub fn high(&self) -> impl Iterator<Item = &ClassifiedItem> {
        self.relevant
            .iter()
            .filter(|c| c.analysis.relevance == Relevance::High)
    }
}

/// What the classifier is told about the question
#[derive(Debug, Clone, Default)]
pub struct ClassifyContext {
    pub question: String,
    pub forecast: f64,
    pub cumulative: u64,
    pub threshold: Option<u64>,
    pub watchlist: Vec<String>,
}

/// Relevance classifier trait
#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(&self, items: &[NewsItem], context: &ClassifyContext) -> Result<Classification>;

    /// Free-text review of recent developments, without fetched items
    async fn review(&self, _context: &ClassifyContext) -> Result<String> {
        Err(ForecastError::Config(format!("{} does not support quick checks", self.name())))
    }
}

/// Substring matching on lowercased title + description
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier {
    watchlist: Vec<String>,
    keywords: Vec<String>,
    context_keywords: Vec<String>,
}

impl KeywordClassifier {
    pub fn new(watchlist: &[String], keywords: &[String], context_keywords: &[String]) -> Self {
        let lower = |v: &[String]| v.iter().map(|s| s.to_lowercase()).collect::<Vec<_>>();
        Self {
            watchlist: watchlist.to_vec(),
            keywords: lower(keywords),
            context_keywords: lower(context_keywords),
        }
    }

    pub fn from_config(config: &crate::config::MonitorConfig) -> Self {
        Self::new(&config.watchlist, &config.keywords, &config.context_keywords)
    }

    pub fn assess(&self, item: &NewsItem) -> Assessment {
        let text = item.search_text();
        let entity = self
            .watchlist
            .iter()
            .find(|e| text.contains(&e.to_lowercase()))
            .cloned();
        let topic = self.keywords.iter().any(|k| text.contains(k.as_str()));
        let context = self.context_keywords.iter().any(|k| text.contains(k.as_str()));

        let (relevance, reasoning) = match (&entity, topic) {
            (Some(e), true) => (Relevance::High, format!("Mentions {} and topic keywords", e)),
            (None, true) if context || self.context_keywords.is_empty() => {
                (Relevance::Medium, "Mentions topic and context keywords".to_string())
            }
            (Some(e), false) if self.keywords.is_empty() => {
                (Relevance::Medium, format!("Mentions {}", e))
            }
            _ => (Relevance::Low, String::new()),
        };

        Assessment {
            relevance,
            entity,
            estimated_count: None,
            reasoning,
        }
    }

    pub fn classify_items(&self, items: &[NewsItem]) -> Classification {
        let relevant: Vec<ClassifiedItem> = items
            .iter()
            .map(|item| ClassifiedItem {
                item: item.clone(),
                analysis: self.assess(item),
            })
            .filter(|c| c.analysis.relevance.is_relevant())
            .collect();

        tracing::info!(relevant = relevant.len(), "Keyword analysis complete");
        Classification {
            relevant,
            total_new_count: 0,
            recommendation: None,
            method: "keyword".to_string(),
        }
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn classify(&self, items: &[NewsItem], _context: &ClassifyContext) -> Result<Classification> {
        Ok(self.classify_items(items))
    }
}

/// Classify with the LLM when present, falling back to keywords on any failure
pub async fn classify(
    items: &[NewsItem],
    context: &ClassifyContext,
    llm: Option<&dyn Classifier>,
    keywords: &KeywordClassifier,
) -> Classification {
    if items.is_empty() {
        return Classification {
            method: keywords.name().to_string(),
            ..Default::default()
        };
    }

    if let Some(llm) = llm {
        match llm.classify(items, context).await {
            Ok(result) => return result,
            Err(e) => tracing::warn!("{} analysis failed, using keywords: {}", llm.name(), e),
        }
    }

    keywords.classify_items(items)
}
