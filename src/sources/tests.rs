//! Unit tests for sources

use super::market::{parse_manifold, parse_polymarket};
use super::newsapi::parse_everything;
use super::*;
use crate::types::ItemKind;

const GOOGLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>"AI layoffs" - Google News</title>
<item>
  <title>Scale AI cuts 14% of staff - Reuters</title>
  <link>https://news.google.com/rss/articles/abc</link>
  <pubDate>Mon, 12 Jan 2026 10:00:00 GMT</pubDate>
  <description>&lt;a href="https://x"&gt;Scale AI cuts&lt;/a&gt;&amp;nbsp;&lt;font&gt;Reuters&lt;/font&gt;</description>
  <source url="https://www.reuters.com">Reuters</source>
</item>
<item><title><![CDATA[Startup trims <b>AI</b> team]]></title><link>https://example.com/2</link></item>
</channel></rss>"#;

const ATOM: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom">
<title>Blog</title>
<entry>
  <title type="html">Pricing update</title>
  <link rel="alternate" href="https://openai.com/blog/pricing"/>
  <updated>2026-01-20T00:00:00Z</updated>
  <summary>New &amp; cheaper tiers</summary>
</entry>
</feed>"#;

#[test]
fn test_parse_rss_items() {
    let entries = parse_feed(GOOGLE_RSS, 15);
    assert_eq!(entries.len(), 2);

    let first = &entries[0];
    assert_eq!(first.title, "Scale AI cuts 14% of staff - Reuters");
    assert_eq!(first.link, "https://news.google.com/rss/articles/abc");
    assert_eq!(first.publisher.as_deref(), Some("Reuters"));
    assert_eq!(first.description, "Scale AI cuts Reuters");
    assert!(first.published.as_deref().unwrap().starts_with("Mon, 12 Jan 2026"));

    assert_eq!(entries[1].title, "Startup trims AI team");
    assert!(entries[1].description.is_empty());
}

#[test]
fn test_parse_feed_respects_limit() {
    assert_eq!(parse_feed(GOOGLE_RSS, 1).len(), 1);
    assert!(parse_feed("<html>not a feed</html>", 10).is_empty());
}

#[test]
fn test_parse_atom_entries() {
    let entries = parse_feed(ATOM, 10);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].title, "Pricing update");
    assert_eq!(entries[0].link, "https://openai.com/blog/pricing");
    assert_eq!(entries[0].description, "New & cheaper tiers");
    assert_eq!(entries[0].published.as_deref(), Some("2026-01-20T00:00:00Z"));
}

#[test]
fn test_title_truncated() {
    let long = "x".repeat(450);
    let xml = format!("<rss><item><title>{}</title><link>u</link></item></rss>", long);
    let entries = parse_feed(&xml, 5);
    assert_eq!(entries[0].title.chars().count(), TITLE_MAX_CHARS);
}

#[test]
fn test_truncate_chars_multibyte() {
    assert_eq!(truncate_chars("héllo", 2), "hé");
    assert_eq!(truncate_chars("abc", 10), "abc");
}

#[test]
fn test_google_news_url() {
    let source = GoogleNews::new("AI startup layoffs".into(), 3, 15, reqwest::Client::new());
    let url = source.search_url().unwrap();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    assert_eq!(url.host_str(), Some("news.google.com"));
    assert!(pairs.contains(&("q".into(), "AI startup layoffs when:3d".into())));
    assert!(pairs.contains(&("ceid".into(), "US:en".into())));
}

#[test]
fn test_parse_newsapi_response() {
    let body = r#"{"status":"ok","totalResults":2,"articles":[
        {"source":{"id":null,"name":"The Verge"},"title":"Grok now ranks the feed","description":"<p>xAI model</p>","url":"https://v/1","publishedAt":"2026-01-10T12:00:00Z"},
        {"source":{"name":"Blank"},"title":null,"url":"https://v/2"}
    ]}"#;
    let items = parse_everything(body).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].source, "NewsAPI - The Verge");
    assert_eq!(items[0].description, "xAI model");
    assert_eq!(items[0].kind, ItemKind::News);
}

#[test]
fn test_newsapi_error_status() {
    let body = r#"{"status":"error","code":"apiKeyInvalid","message":"Your API key is invalid"}"#;
    let err = parse_everything(body).unwrap_err();
    assert!(err.to_string().contains("API key is invalid"));
}

#[test]
fn test_tracker_page_mentions() {
    let page = TrackerPage::new(
        "TrueUp Layoffs".into(),
        "https://www.trueup.io/layoffs".into(),
        vec!["Scale AI".into(), "Inflection AI".into()],
        reqwest::Client::new(),
    );
    let items = page.mentions("<table><tr><td>SCALE AI</td><td>200</td></tr></table>");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kind, ItemKind::Tracker);
    assert!(items[0].title.contains("Scale AI"));
}

#[test]
fn test_json_pointer_extractor() {
    let extractor = Extractor::JsonPointer {
        pointer: "/observations/0/value".into(),
    };
    let body = r#"{"observations":[{"date":"2026-01-01","value":"48.4"}]}"#;
    assert_eq!(extractor.extract(body).unwrap(), 48.4);

    let missing = Extractor::JsonPointer { pointer: "/nope".into() };
    assert!(missing.extract(body).is_err());
}

#[test]
fn test_csv_column_extractor_takes_last_number() {
    let extractor = Extractor::CsvColumn { column: "share".into() };
    let body = "quarter,share\n2025Q2,27.0\n2025Q3,42.0\n2025Q4,\n";
    assert_eq!(extractor.extract(body).unwrap(), 42.0);

    let wrong = Extractor::CsvColumn { column: "missing".into() };
    assert!(wrong.extract(body).is_err());
}

#[test]
fn test_text_after_extractor() {
    let extractor = Extractor::TextAfter {
        marker: "Manufacturing PMI".into(),
        window: 50,
    };
    let body = "<p>The ISM manufacturing PMI® registered 47.9 percent in January</p>";
    assert_eq!(extractor.extract(body).unwrap(), 47.9);

    let far = Extractor::TextAfter {
        marker: "registered".into(),
        window: 0,
    };
    assert!(far.extract(body).is_err());
}

#[test]
fn test_extractor_config_shape() {
    let extractor: Extractor =
        serde_json::from_str(r#"{"kind":"text_after","marker":"Revenue"}"#).unwrap();
    assert_eq!(
        extractor,
        Extractor::TextAfter {
            marker: "Revenue".into(),
            window: 200
        }
    );
}

const CLOB_MARKETS: &str = r#"{
  "limit": 200,
  "next_cursor": "MjAw",
  "data": [
    {
      "question": "Will OpenAI raise ChatGPT Plus pricing by June 30?",
      "market_slug": "openai-raises-chatgpt-plus-price",
      "closed": false,
      "tokens": [
        {"token_id": "1", "outcome": "No", "price": 0.81},
        {"token_id": "2", "outcome": "Yes", "price": 0.19}
      ],
      "liquidity": "15234.5",
      "volume24hr": 812.25
    },
    {
      "question": "Will Anthropic cut Claude API prices?",
      "market_slug": "anthropic-price-cut",
      "closed": true,
      "tokens": [{"outcome": "Yes", "price": "0.40"}]
    },
    {
      "question": "Bitcoin above 100k on Friday?",
      "market_slug": "btc-100k",
      "tokens": [{"outcome": "Yes", "price": 0.5}]
    },
    {
      "question": "OpenAI GPT-5 pricing above $30?",
      "slug": "gpt5-pricing",
      "outcomes": [{"price": "0.62"}]
    }
  ]
}"#;

const MANIFOLD_SEARCH: &str = r#"[
  {
    "id": "abc123",
    "question": "Will OpenAI increase API pricing in 2026?",
    "slug": "will-openai-increase-api-pricing",
    "creatorUsername": "forecaster",
    "probability": 0.27,
    "isResolved": false,
    "totalLiquidity": 1000,
    "volume24Hours": 42.5
  },
  {
    "id": "def456",
    "question": "Will OpenAI pricing change before March?",
    "slug": "openai-pricing-march",
    "url": "https://manifold.markets/other/openai-pricing-march",
    "probability": 0.9,
    "isResolved": true
  },
  {
    "id": "ghi789",
    "question": "Will it snow in Paris?",
    "probability": 0.1
  }
]"#;

#[test]
fn test_parse_polymarket_markets() {
    let keywords = vec!["OpenAI".to_string(), "gpt".to_string()];
    let quotes = parse_polymarket(CLOB_MARKETS, "poly", &keywords).unwrap();
    assert_eq!(quotes.len(), 2);

    let first = &quotes[0];
    assert_eq!(first.scan, "poly");
    assert_eq!(first.key, "openai-raises-chatgpt-plus-price");
    assert_eq!(first.url, "https://polymarket.com/event/openai-raises-chatgpt-plus-price");
    assert_eq!(first.yes_price, Some(0.19));
    assert_eq!(first.liquidity, Some(15234.5));
    assert_eq!(first.volume_24h, Some(812.25));
    assert_eq!(first.value_name(), "poly/openai-raises-chatgpt-plus-price");

    // unlabelled outcomes fall back to the first price, string prices parse
    assert_eq!(quotes[1].key, "gpt5-pricing");
    assert_eq!(quotes[1].yes_price, Some(0.62));
    assert_eq!(quotes[1].liquidity, None);
}

#[test]
fn test_parse_polymarket_without_keywords_keeps_open_markets() {
    let quotes = parse_polymarket(CLOB_MARKETS, "poly", &[]).unwrap();
    assert_eq!(quotes.len(), 3);
    assert!(parse_polymarket("not json", "poly", &[]).is_err());
}

#[test]
fn test_parse_manifold_search() {
    let quotes = parse_manifold(MANIFOLD_SEARCH, "manifold", &["openai".to_string()]).unwrap();
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0].key, "will-openai-increase-api-pricing");
    assert_eq!(
        quotes[0].url,
        "https://manifold.markets/forecaster/will-openai-increase-api-pricing"
    );
    assert_eq!(quotes[0].yes_price, Some(0.27));
    assert_eq!(quotes[0].liquidity, Some(1000.0));
    assert_eq!(quotes[0].volume_24h, Some(42.5));

    let all = parse_manifold(MANIFOLD_SEARCH, "manifold", &[]).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].key, "ghi789");
}

struct StubSource {
    name: String,
    fail: bool,
}

#[async_trait::async_trait]
impl Source for StubSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> crate::error::Result<Vec<crate::types::NewsItem>> {
        if self.fail {
            return Err(crate::error::ForecastError::Api("boom".into()));
        }
        Ok(vec![crate::types::NewsItem {
            source: self.name.clone(),
            title: "t".into(),
            description: String::new(),
            url: "u".into(),
            published: None,
            kind: ItemKind::News,
        }])
    }
}

#[tokio::test]
async fn test_collect_skips_failing_sources() {
    let sources: Vec<std::sync::Arc<dyn Source>> = vec![
        std::sync::Arc::new(StubSource { name: "ok".into(), fail: false }),
        std::sync::Arc::new(StubSource { name: "bad".into(), fail: true }),
        std::sync::Arc::new(StubSource { name: "ok2".into(), fail: false }),
    ];
    let items = collect(&sources).await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].source, "ok2");
}
