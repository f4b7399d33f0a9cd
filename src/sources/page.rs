//! Tracker pages scanned for watchlist mentions

use super::{strip_html, Source};
use crate::error::{ForecastError, Result};
use crate::types::{ItemKind, NewsItem};
use async_trait::async_trait;
use chrono::Utc;

/// A web page (e.g. a layoffs tracker) where a watchlist name showing up is news
pub struct TrackerPage {
    name: String,
    url: String,
    watchlist: Vec<String>,
    http: reqwest::Client,
}

impl TrackerPage {
    pub fn new(name: String, url: String, watchlist: Vec<String>, http: reqwest::Client) -> Self {
        Self {
            name,
            url,
            watchlist,
            http,
        }
    }

    /// One item per watchlist entity mentioned in the page
    pub fn mentions(&self, html: &str) -> Vec<NewsItem> {
        let text = strip_html(html).to_lowercase();
        let today = Utc::now().format("%Y-%m-%d").to_string();

        self.watchlist
            .iter()
            .filter(|entity| text.contains(&entity.to_lowercase()))
            .map(|entity| NewsItem {
                source: self.name.clone(),
                title: format!("Potential mention: {}", entity),
                description: format!("Found mention of {} on {}", entity, self.name),
                url: self.url.clone(),
                published: Some(today.clone()),
                kind: ItemKind::Tracker,
            })
            .collect()
    }
}

#[async_trait]
impl Source for TrackerPage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<NewsItem>> {
        let response = self.http.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(ForecastError::Api(format!(
                "{} returned {}",
                self.url,
                response.status()
            )));
        }
        let html = response.text().await?;
        Ok(self.mentions(&html))
    }
}
