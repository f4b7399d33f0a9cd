//! NewsAPI `/v2/everything` search

use super::{strip_html, truncate_chars, Source, DESCRIPTION_MAX_CHARS, TITLE_MAX_CHARS};
use crate::error::{ForecastError, Result};
use crate::types::{ItemKind, NewsItem};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;

const EVERYTHING_URL: &str = "https://newsapi.org/v2/everything";
const PAGE_SIZE: u32 = 20;

pub struct NewsApi {
    query: String,
    api_key: String,
    days: u32,
    name: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    #[serde(default)]
    source: Option<ArticleSource>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

impl NewsApi {
    pub fn new(query: String, api_key: String, days: u32, http: reqwest::Client) -> Self {
        let name = format!("newsapi:{}", query);
        Self {
            query,
            api_key,
            days,
            name,
            http,
        }
    }
}

/// Map a NewsAPI response body to items; a non-"ok" status is an error
pub(crate) fn parse_everything(body: &str) -> Result<Vec<NewsItem>> {
    let response: EverythingResponse = serde_json::from_str(body)?;
    if response.status != "ok" {
        return Err(ForecastError::Api(format!(
            "NewsAPI: {}",
            response.message.unwrap_or(response.status)
        )));
    }

    Ok(response
        .articles
        .into_iter()
        .filter_map(|a| {
            let title = a.title.filter(|t| !t.is_empty())?;
            Some(NewsItem {
                source: format!(
                    "NewsAPI - {}",
                    a.source.and_then(|s| s.name).unwrap_or_else(|| "Unknown".into())
                ),
                title: truncate_chars(&title, TITLE_MAX_CHARS),
                description: truncate_chars(
                    &strip_html(&a.description.unwrap_or_default()),
                    DESCRIPTION_MAX_CHARS,
                ),
                url: a.url.unwrap_or_default(),
                published: a.published_at,
                kind: ItemKind::News,
            })
        })
        .collect())
}

#[async_trait]
impl Source for NewsApi {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<NewsItem>> {
        let from = (Utc::now() - Duration::days(i64::from(self.days)))
            .format("%Y-%m-%d")
            .to_string();
        let page_size = PAGE_SIZE.to_string();

        let body = self
            .http
            .get(EVERYTHING_URL)
            .query(&[
                ("q", self.query.as_str()),
                ("from", from.as_str()),
                ("language", "en"),
                ("sortBy", "publishedAt"),
                ("apiKey", self.api_key.as_str()),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await?
            .text()
            .await?;

        parse_everything(&body)
    }
}
