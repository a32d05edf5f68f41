//! A concrete [`LlmClient`] talking to an OpenAI-compatible chat completions
//! endpoint. Collectors depend only on the `LlmClient` trait; this is the
//! implementation the scheduling binaries wire in at startup.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use pe_core::error::{AppError, AppResult};

use crate::llm::{CostObserver, LlmClient, LlmRequest, LlmResponse, NoopCostObserver};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    cost_observer: Arc<dyn CostObserver>,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String) -> AppResult<Self> {
        Self::with_cost_observer(api_key, model, Arc::new(NoopCostObserver))
    }

    /// Same as [`Self::new`], but reports every call's token usage to
    /// `cost_observer` rather than discarding it (§6, §9 design note on the
    /// persister→LLM-client cycle).
    pub fn with_cost_observer(
        api_key: String,
        model: String,
        cost_observer: Arc<dyn CostObserver>,
    ) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::config(format!("failed to build LLM HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model,
            cost_observer,
        })
    }

    /// Points at a self-hosted or proxy endpoint instead of the default
    /// OpenAI URL, for Azure-style deployments or local inference servers.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: LlmRequest) -> AppResult<LlmResponse> {
        let purpose = request.purpose;
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system,
                },
                ChatMessage {
                    role: "user",
                    content: request.user,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request.json_mode.then_some(ResponseFormat { kind: "json_object" }),
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::transient(format!("LLM request for {purpose:?}: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::transient(format!("reading LLM response body: {e}")))?;

        if !status.is_success() {
            let snippet: String = text.chars().take(500).collect();
            return Err(AppError::fatal(format!(
                "LLM request for {purpose:?} returned {status}: {snippet}"
            )));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| AppError::parse(format!("invalid LLM response JSON: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();
        let prompt_tokens = parsed.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0);
        let completion_tokens = parsed.usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0);

        self.cost_observer.record_usage(purpose, prompt_tokens, completion_tokens);

        Ok(LlmResponse {
            content,
            prompt_tokens,
            completion_tokens,
        })
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Deserialize)]
struct ChatMessageOut {
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}
