//! RSS / Atom feeds and Google News search

use super::{decode_entities, strip_html, truncate_chars, Source, DESCRIPTION_MAX_CHARS, TITLE_MAX_CHARS};
use crate::error::{ForecastError, Result};
use crate::types::{ItemKind, NewsItem};
use async_trait::async_trait;

const GOOGLE_NEWS_SEARCH: &str = "https://news.google.com/rss/search";

/// One entry pulled out of a feed document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub description: String,
    pub link: String,
    pub published: Option<String>,
    /// Publisher named by a `<source>` element (Google News)
    pub publisher: Option<String>,
}

/// Extract up to `limit` entries from an RSS 2.0 or Atom document.
///
/// The scanner is tolerant: attributes, CDATA sections, escaped HTML
/// and missing fields are all accepted.
pub fn parse_feed(xml: &str, limit: usize) -> Vec<FeedEntry> {
    let mut blocks = element_bodies(xml, "item");
    if blocks.is_empty() {
        blocks = element_bodies(xml, "entry");
    }

    blocks
        .into_iter()
        .take(limit)
        .filter_map(|block| {
            let title = tag_text(block, "title").map(|t| strip_html(&t))?;
            let description = tag_text(block, "description")
                .or_else(|| tag_text(block, "summary"))
                .or_else(|| tag_text(block, "content"))
                .map(|d| strip_html(&d))
                .unwrap_or_default();
            let link = tag_text(block, "link")
                .filter(|l| !l.is_empty())
                .or_else(|| tag_attr(block, "link", "href"))
                .unwrap_or_default();
            let published = tag_text(block, "pubDate")
                .or_else(|| tag_text(block, "published"))
                .or_else(|| tag_text(block, "updated"));

            Some(FeedEntry {
                title: truncate_chars(&title, TITLE_MAX_CHARS),
                description: truncate_chars(&description, DESCRIPTION_MAX_CHARS),
                link,
                published,
                publisher: tag_text(block, "source"),
            })
        })
        .collect()
}

/// Position of the next `<tag` opening (not `<tagfoo`) at or after `from`
fn find_open(xml: &str, tag: &str, from: usize) -> Option<usize> {
    let needle = format!("<{}", tag);
    let mut pos = from;
    while let Some(rel) = xml[pos..].find(&needle) {
        let start = pos + rel;
        let after = start + needle.len();
        match xml[after..].chars().next() {
            Some(c) if c == '>' || c == '/' || c.is_whitespace() => return Some(start),
            _ => pos = after,
        }
    }
    None
}

/// Inner text of every `<tag ...>...</tag>` element
fn element_bodies<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let close = format!("</{}>", tag);
    let mut bodies = Vec::new();
    let mut pos = 0;

    while let Some(start) = find_open(xml, tag, pos) {
        let Some(open_end) = xml[start..].find('>').map(|i| start + i + 1) else {
            break;
        };
        if xml[..open_end].ends_with("/>") {
            pos = open_end;
            continue;
        }
        let Some(end) = xml[open_end..].find(&close).map(|i| open_end + i) else {
            break;
        };
        bodies.push(&xml[open_end..end]);
        pos = end + close.len();
    }

    bodies
}

/// Decoded text of the first `<tag>` element in `block`
fn tag_text(block: &str, tag: &str) -> Option<String> {
    let raw = element_bodies(block, tag).into_iter().next()?;
    let raw = raw.trim();
    let inner = raw
        .strip_prefix("<![CDATA[")
        .and_then(|r| r.strip_suffix("]]>"))
        .unwrap_or(raw);
    Some(decode_entities(inner).trim().to_string())
}

/// Value of `attr` on the first `<tag>` element in `block`
fn tag_attr(block: &str, tag: &str, attr: &str) -> Option<String> {
    let start = find_open(block, tag, 0)?;
    let open_end = start + block[start..].find('>')?;
    let open = &block[start..open_end];

    let needle = format!("{}=", attr);
    let at = open.find(&needle)? + needle.len();
    let rest = &open[at..];
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    let end = value.find(quote)?;
    Some(decode_entities(&value[..end]))
}

async fn fetch_text(http: &reqwest::Client, url: &str) -> Result<String> {
    let response = http.get(url).send().await?;
    if !response.status().is_success() {
        return Err(ForecastError::Api(format!("{} returned {}", url, response.status())));
    }
    Ok(response.text().await?)
}

/// A plain RSS or Atom feed
pub struct RssFeed {
    name: String,
    url: String,
    limit: usize,
    http: reqwest::Client,
}

impl RssFeed {
    pub fn new(name: String, url: String, limit: usize, http: reqwest::Client) -> Self {
        Self { name, url, limit, http }
    }
}

#[async_trait]
impl Source for RssFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<NewsItem>> {
        let body = fetch_text(&self.http, &self.url).await?;
        Ok(parse_feed(&body, self.limit)
            .into_iter()
            .map(|entry| NewsItem {
                source: self.name.clone(),
                title: entry.title,
                description: entry.description,
                url: entry.link,
                published: entry.published,
                kind: ItemKind::Feed,
            })
            .collect())
    }
}

/// Google News RSS search restricted to the last `days` days
pub struct GoogleNews {
    query: String,
    days: u32,
    limit: usize,
    name: String,
    http: reqwest::Client,
}

impl GoogleNews {
    pub fn new(query: String, days: u32, limit: usize, http: reqwest::Client) -> Self {
        let name = format!("google_news:{}", query);
        Self {
            query,
            days,
            limit,
            name,
            http,
        }
    }

    pub fn search_url(&self) -> Result<reqwest::Url> {
        reqwest::Url::parse_with_params(
            GOOGLE_NEWS_SEARCH,
            &[
                ("q", format!("{} when:{}d", self.query, self.days)),
                ("hl", "en-US".to_string()),
                ("gl", "US".to_string()),
                ("ceid", "US:en".to_string()),
            ],
        )
        .map_err(|e| ForecastError::Config(format!("bad search url: {}", e)))
    }
}

#[async_trait]
impl Source for GoogleNews {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<NewsItem>> {
        let url = self.search_url()?;
        let body = fetch_text(&self.http, url.as_str()).await?;
        Ok(parse_feed(&body, self.limit)
            .into_iter()
            .map(|entry| NewsItem {
                source: format!(
                    "Google News - {}",
                    entry.publisher.as_deref().unwrap_or("Unknown")
                ),
                title: entry.title,
                description: entry.description,
                url: entry.link,
                published: entry.published,
                kind: ItemKind::News,
            })
            .collect())
    }
}
