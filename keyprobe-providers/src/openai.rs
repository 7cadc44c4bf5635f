//! OpenAI ChatGPT provider.

use std::fmt;

use async_trait::async_trait;
use hyper::body::to_bytes;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Body, Request, Uri};
use serde::Serialize;
use serde_json::Value;
use tokio::time::timeout;
use tracing::debug;

use crate::http_client::{HttpsClient, https_client};
use crate::traits::{
    PROBE_PROMPT, PROBE_TIMEOUT, Provider, ProviderError, ProviderKind, ProviderMetadata,
    ProviderResult, probe_status_is_valid,
};

/// Model and token budget for the key probe.
const PROBE_MODEL: &str = "gpt-3.5-turbo";
const PROBE_MAX_TOKENS: u32 = 5;

/// Defaults for the real prompt request.
const CHAT_MODEL: &str = "gpt-4";
const CHAT_MAX_TOKENS: u32 = 100;

/// Configuration for the ChatGPT provider.
#[derive(Clone, Debug)]
pub struct ChatGptConfig {
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl ChatGptConfig {
    /// Creates a configuration with the default model and endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_key: None,
            model: CHAT_MODEL.to_owned(),
            base_url: "https://api.openai.com/".to_owned(),
        }
    }

    /// Overrides the base URL used for API calls.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] if the supplied URL is invalid.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> ProviderResult<Self> {
        let sanitized = sanitize_base_url(base_url.as_ref())?;
        self.base_url = sanitized;
        Ok(self)
    }

    /// Overrides the model used for prompt requests. The probe always uses the
    /// cheap probe model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Supplies the API key for this run.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

impl Default for ChatGptConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// ChatGPT provider backed by the official chat completions API.
pub struct ChatGptProvider {
    client: HttpsClient,
    endpoint: Uri,
    metadata: ProviderMetadata,
    api_key: String,
}

impl fmt::Debug for ChatGptProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatGptProvider")
            .field("model", &self.metadata.model())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl ChatGptProvider {
    /// Constructs a new provider with the supplied configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] if the API key is missing or
    /// the endpoint cannot be built.
    pub fn new(config: ChatGptConfig) -> ProviderResult<Self> {
        let api_key = config
            .api_key
            .ok_or_else(|| ProviderError::configuration("ChatGPT provider requires an API key"))?;

        let endpoint = format!("{}v1/chat/completions", config.base_url)
            .parse::<Uri>()
            .map_err(|err| {
                ProviderError::configuration(format!("invalid ChatGPT endpoint: {err}"))
            })?;

        Ok(Self {
            client: https_client(),
            endpoint,
            metadata: ProviderMetadata::new(ProviderKind::ChatGpt, config.model),
            api_key,
        })
    }

    fn post_json(&self, payload: &ChatCompletionRequest) -> ProviderResult<Request<Body>> {
        let body = serde_json::to_vec(payload).map_err(|err| {
            ProviderError::invalid_request(format!("failed to encode ChatGPT request: {err}"))
        })?;

        Request::post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .body(Body::from(body))
            .map_err(|err| {
                ProviderError::transport(format!("failed to build ChatGPT request: {err}"))
            })
    }
}

#[async_trait]
impl Provider for ChatGptProvider {
    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    async fn validate_key(&self) -> ProviderResult<bool> {
        let payload = request_body(PROBE_MODEL, PROBE_PROMPT, PROBE_MAX_TOKENS);
        let request = self.post_json(&payload)?;

        let response = timeout(PROBE_TIMEOUT, self.client.request(request))
            .await
            .map_err(|_| ProviderError::transport("ChatGPT key probe timed out"))?
            .map_err(|err| ProviderError::transport(format!("ChatGPT key probe failed: {err}")))?;

        debug!(status = %response.status(), "chatgpt key probe answered");
        Ok(probe_status_is_valid(response.status()))
    }

    async fn fetch(&self, prompt: &str) -> ProviderResult<Value> {
        let payload = request_body(self.metadata.model(), prompt, CHAT_MAX_TOKENS);
        let request = self.post_json(&payload)?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|err| ProviderError::transport(format!("ChatGPT request failed: {err}")))?;

        // Decoded regardless of status; a non-JSON error body surfaces as a
        // decode failure.
        let bytes = to_bytes(response.into_body()).await.map_err(|err| {
            ProviderError::transport(format!("failed to read ChatGPT response: {err}"))
        })?;

        serde_json::from_slice(&bytes).map_err(|err| {
            ProviderError::response(format!("failed to decode ChatGPT response: {err}"))
        })
    }

    fn primary_text(&self, body: &Value) -> ProviderResult<String> {
        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                ProviderError::response("ChatGPT response is missing choices[0].message.content")
            })
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

fn request_body(model: &str, text: &str, max_tokens: u32) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: model.to_owned(),
        messages: vec![ChatMessage {
            role: "user".to_owned(),
            content: text.to_owned(),
        }],
        max_tokens,
    }
}

fn sanitize_base_url(input: &str) -> ProviderResult<String> {
    let mut base = input.trim().to_owned();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(ProviderError::configuration(
            "ChatGPT base URL must start with http:// or https://",
        ));
    }
    if !base.ends_with('/') {
        base.push('/');
    }
    base.parse::<Uri>()
        .map_err(|err| ProviderError::configuration(format!("invalid ChatGPT base URL: {err}")))?;
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> ChatGptProvider {
        ChatGptProvider::new(ChatGptConfig::new().with_api_key("test_key")).expect("provider")
    }

    #[test]
    fn base_url_requires_scheme() {
        let err = ChatGptConfig::new()
            .with_base_url("api.openai.com")
            .expect_err("missing scheme should error");

        assert!(matches!(err, ProviderError::Configuration { .. }));
    }

    #[test]
    fn sanitize_appends_trailing_slash() {
        let cfg = ChatGptConfig::new()
            .with_base_url("https://example.com/openai")
            .expect("valid URL");
        assert_eq!(cfg.base_url, "https://example.com/openai/");
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let err = ChatGptProvider::new(ChatGptConfig::new()).expect_err("key required");
        assert!(matches!(err, ProviderError::Configuration { .. }));
    }

    #[test]
    fn endpoint_follows_base_url() {
        let cfg = ChatGptConfig::new()
            .with_api_key("k")
            .with_base_url("https://example.com")
            .unwrap();
        let provider = ChatGptProvider::new(cfg).unwrap();
        assert_eq!(
            provider.endpoint.to_string(),
            "https://example.com/v1/chat/completions"
        );
    }

    #[test]
    fn probe_body_uses_probe_settings() {
        let body = request_body(PROBE_MODEL, PROBE_PROMPT, PROBE_MAX_TOKENS);
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["model"], "gpt-3.5-turbo");
        assert_eq!(value["max_tokens"], 5);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "Hello");
    }

    #[test]
    fn prompt_body_round_trips_the_prompt() {
        let provider = provider();
        let body = request_body(
            provider.metadata.model(),
            "What is the capital of France?",
            CHAT_MAX_TOKENS,
        );
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(
            value["messages"][0]["content"],
            "What is the capital of France?"
        );
        assert_eq!(value["model"], "gpt-4");
        assert_eq!(value["max_tokens"], 100);
    }

    #[test]
    fn primary_text_extracts_content() {
        let body = json!({"choices": [{"message": {"content": "hi"}}]});
        assert_eq!(provider().primary_text(&body).unwrap(), "hi");
    }

    #[test]
    fn primary_text_reports_missing_path() {
        let err = provider()
            .primary_text(&json!({"error": "bad key"}))
            .expect_err("missing choices");
        assert!(matches!(err, ProviderError::Response { .. }));
    }
}
