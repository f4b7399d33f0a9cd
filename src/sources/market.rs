//! Prediction market scans
//!
//! Pulls market listings from Polymarket's CLOB or Manifold's search API,
//! keeps the ones whose title matches the configured keywords, and reports
//! each market's yes-price so the monitor can diff it like any other value.

use crate::config::MarketConfig;
use crate::error::{ForecastError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const POLYMARKET_URL: &str = "https://clob.polymarket.com/markets";
pub const MANIFOLD_URL: &str = "https://api.manifold.markets/v0/search-markets";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketProvider {
    Polymarket,
    Manifold,
}

/// One matching market at the time of the scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    /// Name of the scan that found it
    pub scan: String,
    /// Provider slug, stable across runs
    pub key: String,
    pub title: String,
    pub url: String,
    /// Probability of YES (0-1)
    pub yes_price: Option<f64>,
    pub liquidity: Option<f64>,
    pub volume_24h: Option<f64>,
}

impl MarketQuote {
    /// Name under which the yes-price is diffed between runs
    pub fn value_name(&self) -> String {
        format!("{}/{}", self.scan, self.key)
    }
}

/// Something the monitor can poll for market quotes
#[async_trait]
pub trait MarketFeed: Send + Sync {
    fn name(&self) -> &str;

    /// Yes-price change that counts as a large move
    fn large_move(&self) -> f64;

    async fn fetch_quotes(&self) -> Result<Vec<MarketQuote>>;
}

// ============ Response types ============

#[derive(Debug, Deserialize)]
struct ClobPage {
    #[serde(default)]
    data: Vec<ClobMarket>,
}

#[derive(Debug, Deserialize)]
struct ClobMarket {
    #[serde(default)]
    question: String,
    #[serde(default, alias = "slug")]
    market_slug: Option<String>,
    #[serde(default)]
    closed: Option<bool>,
    #[serde(default, alias = "outcomes")]
    tokens: Vec<ClobToken>,
    #[serde(default)]
    liquidity: Option<Value>,
    #[serde(default, rename = "volume24hr")]
    volume_24h: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ClobToken {
    #[serde(default)]
    outcome: Option<String>,
    #[serde(default)]
    price: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifoldMarket {
    #[serde(default)]
    id: String,
    #[serde(default)]
    question: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    creator_username: Option<String>,
    #[serde(default)]
    probability: Option<f64>,
    #[serde(default)]
    is_resolved: bool,
    #[serde(default)]
    total_liquidity: Option<f64>,
    #[serde(default, rename = "volume24Hours")]
    volume_24_hours: Option<f64>,
}

pub struct MarketScan {
    name: String,
    provider: MarketProvider,
    url: Option<String>,
    term: Option<String>,
    keywords: Vec<String>,
    large_move: f64,
    limit: usize,
    http: reqwest::Client,
}

impl MarketScan {
    pub fn from_config(config: &MarketConfig, http: reqwest::Client) -> Self {
        Self {
            name: config.name.clone(),
            provider: config.provider,
            url: config.url.clone(),
            term: config.term.clone(),
            keywords: config.keywords.clone(),
            large_move: config.large_move,
            limit: config.limit,
            http,
        }
    }

    async fn get(&self, request: reqwest::RequestBuilder) -> Result<String> {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ForecastError::Api(format!("{} returned {}", self.name, response.status())));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl MarketFeed for MarketScan {
    fn name(&self) -> &str {
        &self.name
    }

    fn large_move(&self) -> f64 {
        self.large_move
    }

    async fn fetch_quotes(&self) -> Result<Vec<MarketQuote>> {
        let mut quotes = match self.provider {
            MarketProvider::Polymarket => {
                let request = match &self.url {
                    Some(url) => self.http.get(url),
                    None => self
                        .http
                        .get(POLYMARKET_URL)
                        .query(&[("limit", "200"), ("active", "true")]),
                };
                parse_polymarket(&self.get(request).await?, &self.name, &self.keywords)?
            }
            MarketProvider::Manifold => {
                let term = self.term.clone().unwrap_or_else(|| self.keywords.join(" "));
                let request = self
                    .http
                    .get(self.url.as_deref().unwrap_or(MANIFOLD_URL))
                    .query(&[("term", term.as_str())]);
                parse_manifold(&self.get(request).await?, &self.name, &self.keywords)?
            }
        };
        quotes.truncate(self.limit);
        tracing::info!(scan = %self.name, matched = quotes.len(), "Scanned markets");
        Ok(quotes)
    }
}

/// Open Polymarket CLOB markets whose question matches a keyword
pub(crate) fn parse_polymarket(body: &str, scan: &str, keywords: &[String]) -> Result<Vec<MarketQuote>> {
    let page: ClobPage = serde_json::from_str(body)?;
    let keywords = lowercase(keywords);

    Ok(page
        .data
        .into_iter()
        .filter(|m| m.closed != Some(true) && matches_keywords(&m.question, &keywords))
        .map(|m| {
            // The YES token when labelled, otherwise the first outcome
            let yes = m
                .tokens
                .iter()
                .find(|t| t.outcome.as_deref().is_some_and(|o| o.eq_ignore_ascii_case("yes")))
                .or_else(|| m.tokens.first());
            let key = m.market_slug.clone().unwrap_or_else(|| slugify(&m.question));
            MarketQuote {
                scan: scan.to_string(),
                url: format!("https://polymarket.com/event/{}", key),
                key,
                title: m.question,
                yes_price: yes.and_then(|t| number(t.price.as_ref())),
                liquidity: number(m.liquidity.as_ref()),
                volume_24h: number(m.volume_24h.as_ref()),
            }
        })
        .collect())
}

/// Unresolved Manifold markets whose question matches a keyword
pub(crate) fn parse_manifold(body: &str, scan: &str, keywords: &[String]) -> Result<Vec<MarketQuote>> {
    let markets: Vec<ManifoldMarket> = serde_json::from_str(body)?;
    let keywords = lowercase(keywords);

    Ok(markets
        .into_iter()
        .filter(|m| !m.is_resolved && matches_keywords(&m.question, &keywords))
        .map(|m| {
            let slug = m.slug.clone().unwrap_or_else(|| m.id.clone());
            let url = m.url.clone().unwrap_or_else(|| {
                format!(
                    "https://manifold.markets/{}/{}",
                    m.creator_username.as_deref().unwrap_or_default(),
                    slug
                )
            });
            MarketQuote {
                scan: scan.to_string(),
                key: slug,
                title: m.question,
                url,
                yes_price: m.probability,
                liquidity: m.total_liquidity,
                volume_24h: m.volume_24_hours,
            }
        })
        .collect())
}

fn lowercase(keywords: &[String]) -> Vec<String> {
    keywords.iter().map(|k| k.to_lowercase()).collect()
}

/// No keywords matches everything
fn matches_keywords(title: &str, keywords: &[String]) -> bool {
    let title = title.to_lowercase();
    keywords.is_empty() || keywords.iter().any(|k| title.contains(k.as_str()))
}

/// CLOB numbers arrive either as JSON numbers or as strings
fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
