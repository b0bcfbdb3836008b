use crate::config::{Config, ProviderKind};
use crate::error::{ConfigurationError, ModelError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Message in conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Request to send to LLM
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub messages: Vec<LlmMessage>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    pub fn new(messages: Vec<LlmMessage>) -> Self {
        Self {
            messages,
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Split off the system instruction, joining several if present.
    fn split_system(&self) -> (Option<String>, Vec<&LlmMessage>) {
        let system: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect();
        let rest = self.messages.iter().filter(|m| m.role != "system").collect();
        let system = if system.is_empty() {
            None
        } else {
            Some(system.join("\n\n"))
        };
        (system, rest)
    }
}

/// A hosted model that turns a message list into one reply
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(&self, request: &LlmRequest) -> Result<String, ModelError>;

    fn model_id(&self) -> &str;
}

/// Build the configured backend, wrapped in [`LoggingBackend`].
pub fn build_backend(
    config: &Config,
    api_key: String,
) -> Result<Arc<dyn ModelBackend>, ConfigurationError> {
    let model = config.model_name()?;
    let base_url = config.api_base_url()?;
    let timeout = Duration::from_secs(config.request_timeout_secs);

    let inner: Arc<dyn ModelBackend> = match config.provider_kind()? {
        ProviderKind::Google => Arc::new(GeminiBackend::new(base_url, model, api_key, timeout)),
        ProviderKind::OpenAi => Arc::new(OpenAiBackend::new(base_url, model, api_key, timeout)),
    };
    Ok(Arc::new(LoggingBackend::new(inner)))
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Google Gemini `generateContent`
pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(base_url: String, model: String, api_key: String, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url,
            model,
            api_key,
        }
    }

    fn translate_request(request: &LlmRequest) -> GeminiRequest {
        let (system, messages) = request.split_system();

        // Gemini wants alternating roles; consecutive same-role messages share one content.
        let mut contents: Vec<GeminiContent> = Vec::new();
        for msg in messages {
            let role = if msg.role == "assistant" { "model" } else { "user" };
            let part = GeminiPart {
                text: msg.content.clone(),
            };
            match contents.last_mut() {
                Some(last) if last.role.as_deref() == Some(role) => last.parts.push(part),
                _ => contents.push(GeminiContent {
                    role: Some(role.to_string()),
                    parts: vec![part],
                }),
            }
        }

        GeminiRequest {
            contents,
            system_instruction: system.map(|text| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text }],
            }),
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }

    fn extract_text(response: GeminiResponse) -> Result<String, ModelError> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::malformed("no candidates in response"))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
            return Err(ModelError::malformed(format!(
                "empty response (finish reason: {})",
                reason
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn generate(&self, request: &LlmRequest) -> Result<String, ModelError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let payload = Self::translate_request(request);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await
            .map_err(|e| ModelError::from_reqwest(e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::from_reqwest(e.without_url()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ModelError::from_status(
                status.as_u16(),
                format!("Google API error: {}", message),
            ));
        }

        let parsed: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::malformed(format!("failed to parse response: {}", e)))?;
        Self::extract_text(parsed)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// OpenAI-compatible `/chat/completions` (OpenAI, OpenRouter, xAI, Mistral)
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiBackend {
    pub fn new(base_url: String, model: String, api_key: String, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url,
            model,
            api_key,
        }
    }

    fn payload(&self, request: &LlmRequest) -> serde_json::Value {
        let mut payload = serde_json::json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            payload["max_tokens"] = serde_json::json!(max_tokens);
        }
        payload
    }

    fn extract_text(body: &serde_json::Value) -> Result<String, ModelError> {
        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| ModelError::malformed("response has no message content"))
    }
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    async fn generate(&self, request: &LlmRequest) -> Result<String, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.payload(request))
            .send()
            .await
            .map_err(ModelError::from_reqwest)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::from_reqwest(e.without_url()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ModelError::from_status(
                status.as_u16(),
                format!("OpenAI API error: {}", message),
            ));
        }

        let parsed: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| ModelError::malformed(format!("failed to parse response: {}", e)))?;
        Self::extract_text(&parsed)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Logging wrapper around any backend
pub struct LoggingBackend {
    inner: Arc<dyn ModelBackend>,
    model_id: String,
}

impl LoggingBackend {
    pub fn new(inner: Arc<dyn ModelBackend>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl ModelBackend for LoggingBackend {
    async fn generate(&self, request: &LlmRequest) -> Result<String, ModelError> {
        let start = Instant::now();
        let result = self.inner.generate(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(text) => tracing::info!(
                model = %self.model_id,
                duration_ms = %duration.as_millis(),
                messages = request.messages.len(),
                response_chars = text.chars().count(),
                "model request completed"
            ),
            Err(e) => tracing::error!(
                model = %self.model_id,
                duration_ms = %duration.as_millis(),
                kind = ?e.kind,
                error = %e.message,
                "model request failed"
            ),
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
