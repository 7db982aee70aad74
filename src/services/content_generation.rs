use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::Settings;
use crate::services::errors::UpstreamError;

/// Sends one system + user prompt pair to a text-generation service.
#[async_trait]
pub(crate) trait ContentGenerator: Send + Sync {
    async fn send(&self, system_prompt: &str, user_prompt: &str) -> Result<String, UpstreamError>;
}

/// Client for an OpenAI-compatible `chat/completions` endpoint (OpenRouter by default).
/// One request per call, no retries.
#[derive(Debug, Clone)]
pub(crate) struct OpenRouterClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
}

impl OpenRouterClient {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let ai = settings.ai();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(ai.request_timeout))
            .build()
            .map_err(|err| anyhow::anyhow!(err).context("Failed to build HTTP client"))?;

        Ok(Self {
            client,
            api_key: ai.api_key.clone(),
            base_url: ai.base_url.trim_end_matches('/').to_string(),
            model: ai.model.clone(),
            temperature: ai.temperature,
        })
    }
}

#[async_trait]
impl ContentGenerator for OpenRouterClient {
    async fn send(&self, system_prompt: &str, user_prompt: &str) -> Result<String, UpstreamError> {
        let timer = Instant::now();
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "temperature": self.temperature,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let response =
            self.client.post(&url).bearer_auth(&self.api_key).json(&payload).send().await?;

        let status = response.status();
        let body = response.text().await?;
        metrics::histogram!("content_generation_request_seconds")
            .record(timer.elapsed().as_secs_f64());

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), model = %self.model, "Content service rejected request");
            return Err(UpstreamError::Status { status: status.as_u16(), body: truncate(&body, 512) });
        }

        let parsed: Value = serde_json::from_str(&body)
            .map_err(|err| UpstreamError::UnreadableBody(err.to_string()))?;

        let content = parsed
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|value| value.as_str())
            .map(str::trim)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(UpstreamError::EmptyAnswer);
        }

        tracing::debug!(
            model = %self.model,
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "Content service answered"
        );
        Ok(content.to_string())
    }
}

/// Removes markdown code fences and a `\boxed{...}` wrapper that models
/// sometimes put around a JSON answer.
pub(crate) fn clean_response(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(inner) = text.strip_prefix("\\boxed{").and_then(|rest| rest.strip_suffix('}')) {
        text = inner.trim();
    }

    if let Some(rest) = text.strip_prefix("```") {
        // drop the info string (`json`, `JSON`, ...) up to the first newline
        text = match rest.split_once('\n') {
            Some((info, body)) if !info.trim_start().starts_with('{') => body,
            _ => rest,
        };
        text = text.trim_end();
        text = text.strip_suffix("```").unwrap_or(text);
    }

    text.trim()
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
