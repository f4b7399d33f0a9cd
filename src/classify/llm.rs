//! LLM relevance classifier
//!
//! Supports multiple LLM providers: Anthropic, DeepSeek, OpenAI, and OpenAI-compatible APIs.

use super::{
    Assessment, ClassifiedItem, Classification, Classifier, ClassifyContext, ForecastRecommendation,
    Relevance,
};
use crate::config::LlmConfig;
use crate::error::{ForecastError, Result};
use crate::types::NewsItem;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Items sent in one prompt
pub const MAX_PROMPT_ITEMS: usize = 15;

pub struct LlmClassifier {
    http: Client,
    provider: LlmProvider,
}

#[derive(Debug, Clone)]
pub enum LlmProvider {
    DeepSeek {
        api_key: String,
        model: String,
    },
    Anthropic {
        api_key: String,
        model: String,
    },
    OpenAI {
        api_key: String,
        model: String,
        base_url: String,
    },
    /// OpenAI-compatible API (Ollama, vLLM, etc.)
    Compatible {
        api_key: Option<String>,
        model: String,
        base_url: String,
    },
}

// ============ Request/Response types ============

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: String,
}

/// Shape the model is asked to answer in
#[derive(Debug, Deserialize)]
struct AnalysisReply {
    #[serde(default)]
    analyses: Vec<ItemAnalysis>,
    #[serde(default)]
    total_new_count: Option<f64>,
    #[serde(default)]
    forecast_recommendation: Option<ForecastRecommendation>,
}

#[derive(Debug, Deserialize)]
struct ItemAnalysis {
    /// 1-based item number from the prompt
    #[serde(default)]
    item: Option<usize>,
    relevance: Relevance,
    #[serde(default)]
    entity: Option<String>,
    #[serde(default)]
    estimated_count: Option<f64>,
    #[serde(default)]
    reasoning: String,
}

impl LlmClassifier {
    pub fn new(provider: LlmProvider) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self { http, provider })
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let provider = match config.provider.to_lowercase().as_str() {
            "deepseek" => LlmProvider::DeepSeek {
                api_key: config.api_key.clone(),
                model: config.model.clone().unwrap_or_else(|| "deepseek-chat".to_string()),
            },
            "anthropic" | "claude" => LlmProvider::Anthropic {
                api_key: config.api_key.clone(),
                model: config.model.clone().unwrap_or_else(|| "claude-sonnet-4-20250514".to_string()),
            },
            "openai" | "gpt" => LlmProvider::OpenAI {
                api_key: config.api_key.clone(),
                model: config.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string()),
                base_url: config.base_url.clone().unwrap_or_else(|| "https://api.openai.com".to_string()),
            },
            "ollama" => LlmProvider::Compatible {
                api_key: None,
                model: config.model.clone().unwrap_or_else(|| "qwen2.5:14b".to_string()),
                base_url: config.base_url.clone().unwrap_or_else(|| "http://localhost:11434".to_string()),
            },
            "compatible" | "custom" => LlmProvider::Compatible {
                api_key: if config.api_key.is_empty() { None } else { Some(config.api_key.clone()) },
                model: config.model.clone().ok_or_else(|| ForecastError::Config("model required for compatible provider".into()))?,
                base_url: config.base_url.clone().ok_or_else(|| ForecastError::Config("base_url required for compatible provider".into()))?,
            },
            _ => return Err(ForecastError::Config(format!("Unknown LLM provider: {}", config.provider))),
        };

        if let LlmProvider::Anthropic { api_key, .. }
        | LlmProvider::DeepSeek { api_key, .. }
        | LlmProvider::OpenAI { api_key, .. } = &provider
        {
            if api_key.is_empty() {
                return Err(ForecastError::Config(format!("no API key for {}", config.provider)));
            }
        }

        Self::new(provider)
    }

    pub fn build_prompt(&self, items: &[NewsItem], context: &ClassifyContext) -> String {
        let items_text = items
            .iter()
            .take(MAX_PROMPT_ITEMS)
            .enumerate()
            .map(|(i, item)| {
                format!(
                    "ITEM {}:\nSource: {}\nTitle: {}\nDescription: {}",
                    i + 1,
                    item.source,
                    item.title,
                    if item.description.is_empty() { "N/A" } else { item.description.as_str() }
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let tracking = match context.threshold {
            Some(threshold) => format!(
                "- Cumulative count so far: {}\n- Threshold needed: {}\n",
                context.cumulative, threshold
            ),
            None => String::new(),
        };

        format!(
            r#"You are analyzing news for a forecasting question.

QUESTION: "{}"

Current tracking:
{}- Current forecast: {:.0}%

Entities to watch: {}

Analyze these news items:
{}

For EACH item, determine:
1. Does it bear directly on how the question resolves?
2. If yes, which entity is involved and what count (if any) it adds
3. Relevance: HIGH (confirmed, directly relevant) / MEDIUM (possible/rumored) / LOW (not relevant)

Respond with ONLY a JSON object in this exact format:
{{
  "analyses": [
    {{"item": 1, "relevance": "HIGH/MEDIUM/LOW", "entity": "name or null",
      "estimated_count": number or null, "reasoning": "..."}}
  ],
  "total_new_count": number,
  "forecast_recommendation": {{
    "direction": "UP/DOWN/UNCHANGED",
    "new_probability": number or null,
    "reasoning": "..."
  }}
}}
"#,
            context.question,
            tracking,
            context.forecast * 100.0,
            context.watchlist.iter().take(15).cloned().collect::<Vec<_>>().join(", "),
            items_text,
        )
    }

    /// Prompt for a quick check: the model reports what it knows of recent
    /// developments and says whether the count or forecast should move.
    pub fn build_quick_prompt(&self, context: &ClassifyContext) -> String {
        let tracking = match context.threshold {
            Some(threshold) => format!(
                "Current cumulative count: {}\nThreshold needed: {}\n",
                context.cumulative, threshold
            ),
            None => String::new(),
        };
        let watchlist = if context.watchlist.is_empty() {
            String::new()
        } else {
            format!(
                "Entities to watch: {}\n",
                context.watchlist.iter().take(15).cloned().collect::<Vec<_>>().join(", ")
            )
        };

        format!(
            r#"Search for recent news relevant to this forecasting question.

QUESTION: "{}"

{}Current forecast: {:.0}%
{}
List any new findings with the entity, the number involved, the date and the source.
Then update the cumulative count if one is tracked, and tell me whether the forecast should change and why.
"#,
            context.question,
            tracking,
            context.forecast * 100.0,
            watchlist,
        )
    }

    async fn call_openai_compatible(
        &self,
        base_url: &str,
        api_key: Option<&str>,
        model: &str,
        prompt: &str,
    ) -> Result<String> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let mut req = self
            .http
            .post(format!("{}/v1/chat/completions", base_url))
            .header("content-type", "application/json");

        if let Some(key) = api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.json(&request).send().await?;
        let text = resp.text().await?;
        tracing::debug!("LLM raw response: {}", preview(&text, 500));

        let response: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            ForecastError::Api(format!("JSON parse error: {} - response: {}", e, preview(&text, 200)))
        })?;

        response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| ForecastError::Api("Empty response from LLM".into()))
    }

    async fn call_anthropic(&self, api_key: &str, model: &str, prompt: &str) -> Result<String> {
        let request = AnthropicRequest {
            model: model.to_string(),
            max_tokens: 3000,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let resp = self
            .http
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ForecastError::Api(format!("Anthropic returned {}: {}", status, preview(&body, 200))));
        }

        let response: AnthropicResponse = resp.json().await?;
        response
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| ForecastError::Api("Empty response from Anthropic".into()))
    }

    async fn call_llm(&self, prompt: &str) -> Result<String> {
        match &self.provider {
            LlmProvider::DeepSeek { api_key, model } => {
                self.call_openai_compatible("https://api.deepseek.com", Some(api_key), model, prompt)
                    .await
            }
            LlmProvider::Anthropic { api_key, model } => {
                self.call_anthropic(api_key, model, prompt).await
            }
            LlmProvider::OpenAI { api_key, model, base_url } => {
                self.call_openai_compatible(base_url, Some(api_key), model, prompt)
                    .await
            }
            LlmProvider::Compatible { api_key, model, base_url } => {
                self.call_openai_compatible(base_url, api_key.as_deref(), model, prompt)
                    .await
            }
        }
    }

    /// Map the model's JSON answer back onto the prompted items
    pub fn parse_response(&self, response: &str, items: &[NewsItem]) -> Result<Classification> {
        let json_str = extract_json(response)
            .ok_or_else(|| ForecastError::Api("No JSON object in LLM response".into()))?;
        let reply: AnalysisReply = serde_json::from_str(json_str)
            .map_err(|e| ForecastError::Api(format!("Failed to parse LLM response: {}", e)))?;

        let prompted = items.len().min(MAX_PROMPT_ITEMS);
        let mut relevant = Vec::new();
        for (position, analysis) in reply.analyses.into_iter().enumerate() {
            if !analysis.relevance.is_relevant() {
                continue;
            }
            let idx = analysis.item.map(|n| n.saturating_sub(1)).unwrap_or(position);
            let Some(item) = items.get(idx).filter(|_| idx < prompted) else {
                tracing::debug!(item = idx + 1, "LLM referenced an item that was not sent");
                continue;
            };
            relevant.push(ClassifiedItem {
                item: item.clone(),
                analysis: Assessment {
                    relevance: analysis.relevance,
                    entity: analysis.entity,
                    estimated_count: analysis.estimated_count.map(|c| c.max(0.0).round() as u64),
                    reasoning: analysis.reasoning,
                },
            });
        }

        Ok(Classification {
            relevant,
            total_new_count: reply.total_new_count.map(|c| c.max(0.0).round() as u64).unwrap_or(0),
            recommendation: reply.forecast_recommendation,
            method: self.name().to_string(),
        })
    }
}

/// Slice from the first '{' to the last '}'
pub fn extract_json(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

fn preview(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    fn name(&self) -> &str {
        match &self.provider {
            LlmProvider::DeepSeek { .. } => "DeepSeek",
            LlmProvider::Anthropic { .. } => "Claude",
            LlmProvider::OpenAI { .. } => "GPT",
            LlmProvider::Compatible { model, .. } => model,
        }
    }

    async fn classify(&self, items: &[NewsItem], context: &ClassifyContext) -> Result<Classification> {
        let prompt = self.build_prompt(items, context);
        let response = self.call_llm(&prompt).await?;
        let result = self.parse_response(&response, items)?;
        tracing::info!(
            classifier = self.name(),
            relevant = result.relevant.len(),
            "LLM analysis complete"
        );
        Ok(result)
    }

    async fn review(&self, context: &ClassifyContext) -> Result<String> {
        let prompt = self.build_quick_prompt(context);
        let response = self.call_llm(&prompt).await?;
        tracing::info!(classifier = self.name(), chars = response.len(), "Quick check complete");
        Ok(response)
    }
}
