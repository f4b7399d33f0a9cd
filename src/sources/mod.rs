//! News and value sources polled by the monitor
//!
//! Collects items from:
//! - Google News RSS searches
//! - Plain RSS / Atom feeds
//! - NewsAPI (when a key is configured)
//! - Tracker pages scanned for watchlist mentions
//!
//! Numeric values (indices, prices, shares) are fetched separately by
//! [`ValueWatch`], and prediction market prices by [`MarketScan`].

pub mod market;
pub mod newsapi;
pub mod page;
pub mod rss;
pub mod value;

#[cfg(test)]
mod tests;

pub use market::{MarketFeed, MarketProvider, MarketQuote, MarketScan};
pub use newsapi::NewsApi;
pub use page::TrackerPage;
pub use rss::{parse_feed, FeedEntry, GoogleNews, RssFeed};
pub use value::{Extractor, ValueProbe, ValueWatch};

use crate::config::MonitorConfig;
use crate::error::Result;
use crate::types::NewsItem;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// News source trait
#[async_trait]
pub trait Source: Send + Sync {
    /// Source name, used in logs and item attribution
    fn name(&self) -> &str;

    /// Fetch the current batch of items
    async fn fetch(&self) -> Result<Vec<NewsItem>>;
}

/// HTTP client shared by all sources
pub fn http_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent("Mozilla/5.0 (compatible; forecast-desk)")
        .build()?;
    Ok(client)
}

/// Fetch every source in turn. A failing source is logged and skipped.
pub async fn collect(sources: &[Arc<dyn Source>]) -> Vec<NewsItem> {
    let mut items = Vec::new();
    for source in sources {
        match source.fetch().await {
            Ok(batch) => {
                tracing::info!(source = source.name(), count = batch.len(), "Fetched items");
                items.extend(batch);
            }
            Err(e) => {
                tracing::warn!("Source {} failed: {}", source.name(), e);
            }
        }
    }
    items
}

/// News sources described by the monitor config
pub fn news_sources(config: &MonitorConfig, http: &reqwest::Client) -> Vec<Arc<dyn Source>> {
    let mut sources: Vec<Arc<dyn Source>> = Vec::new();

    for query in &config.queries {
        sources.push(Arc::new(GoogleNews::new(
            query.clone(),
            config.lookback_days,
            config.item_limit,
            http.clone(),
        )));
    }

    for feed in &config.feeds {
        sources.push(Arc::new(RssFeed::new(
            feed.name.clone(),
            feed.url.clone(),
            config.item_limit,
            http.clone(),
        )));
    }

    match &config.news_api_key {
        Some(key) => {
            for query in &config.queries {
                sources.push(Arc::new(NewsApi::new(
                    query.clone(),
                    key.clone(),
                    config.lookback_days,
                    http.clone(),
                )));
            }
        }
        None if !config.queries.is_empty() => {
            tracing::warn!("NEWS_API_KEY not set, skipping NewsAPI");
        }
        None => {}
    }

    for page in &config.trackers {
        sources.push(Arc::new(TrackerPage::new(
            page.name.clone(),
            page.url.clone(),
            config.watchlist.clone(),
            http.clone(),
        )));
    }

    sources
}

/// Value watches described by the monitor config
pub fn value_probes(config: &MonitorConfig, http: &reqwest::Client) -> Vec<Arc<dyn ValueProbe>> {
    config
        .values
        .iter()
        .map(|v| Arc::new(ValueWatch::from_config(v, http.clone())) as Arc<dyn ValueProbe>)
        .collect()
}

/// Market scans described by the monitor config
pub fn market_scans(config: &MonitorConfig, http: &reqwest::Client) -> Vec<Arc<dyn MarketFeed>> {
    config
        .markets
        .iter()
        .map(|m| Arc::new(MarketScan::from_config(m, http.clone())) as Arc<dyn MarketFeed>)
        .collect()
}

/// Cut `text` to at most `max` characters
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Decode the handful of entities feeds actually use
pub fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Drop markup and collapse whitespace
pub fn strip_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&nbsp;", " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
