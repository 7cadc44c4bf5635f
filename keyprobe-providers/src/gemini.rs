//! Google Gemini provider.
//!
//! Gemini authenticates through a `key` query parameter instead of a header,
//! and both the probe and the prompt request use the same body shape.

use std::fmt;

use async_trait::async_trait;
use hyper::body::to_bytes;
use hyper::header::CONTENT_TYPE;
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

const GEMINI_MODEL: &str = "gemini-pro";

/// Configuration for the Gemini provider.
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiConfig {
    /// Creates a configuration with the default model and endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_key: None,
            model: GEMINI_MODEL.to_owned(),
            base_url: "https://generativelanguage.googleapis.com/".to_owned(),
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

    /// Overrides the model named in the endpoint path.
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

impl Default for GeminiConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Gemini provider backed by the generative language API.
pub struct GeminiProvider {
    client: HttpsClient,
    base_endpoint: String,
    metadata: ProviderMetadata,
    api_key: String,
}

impl fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("model", &self.metadata.model())
            .field("base_endpoint", &self.base_endpoint)
            .finish_non_exhaustive()
    }
}

impl GeminiProvider {
    /// Constructs a new provider with the supplied configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] if the API key is missing.
    pub fn new(config: GeminiConfig) -> ProviderResult<Self> {
        let api_key = config
            .api_key
            .ok_or_else(|| ProviderError::configuration("Gemini provider requires an API key"))?;

        let base_endpoint = format!(
            "{}v1beta/models/{}:generateContent",
            config.base_url, config.model
        );

        Ok(Self {
            client: https_client(),
            base_endpoint,
            metadata: ProviderMetadata::new(ProviderKind::Gemini, config.model),
            api_key,
        })
    }

    // The credential rides in the query string, so the URI is rebuilt per
    // request rather than parsed once at construction.
    fn build_uri(&self) -> ProviderResult<Uri> {
        format!("{}?key={}", self.base_endpoint, self.api_key)
            .parse::<Uri>()
            .map_err(|err| ProviderError::configuration(format!("invalid Gemini endpoint: {err}")))
    }

    fn post_json(&self, payload: &GenerateContentRequest) -> ProviderResult<Request<Body>> {
        let body = serde_json::to_vec(payload).map_err(|err| {
            ProviderError::invalid_request(format!("failed to encode Gemini request: {err}"))
        })?;

        Request::post(self.build_uri()?)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .map_err(|err| {
                ProviderError::transport(format!("failed to build Gemini request: {err}"))
            })
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    async fn validate_key(&self) -> ProviderResult<bool> {
        let request = self.post_json(&request_body(PROBE_PROMPT))?;

        let response = timeout(PROBE_TIMEOUT, self.client.request(request))
            .await
            .map_err(|_| ProviderError::transport("Gemini key probe timed out"))?
            .map_err(|err| ProviderError::transport(format!("Gemini key probe failed: {err}")))?;

        debug!(status = %response.status(), "gemini key probe answered");
        Ok(probe_status_is_valid(response.status()))
    }

    async fn fetch(&self, prompt: &str) -> ProviderResult<Value> {
        let request = self.post_json(&request_body(prompt))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|err| ProviderError::transport(format!("Gemini request failed: {err}")))?;

        // Decoded regardless of status; a non-JSON error body surfaces as a
        // decode failure.
        let bytes = to_bytes(response.into_body()).await.map_err(|err| {
            ProviderError::transport(format!("failed to read Gemini response: {err}"))
        })?;

        serde_json::from_slice(&bytes).map_err(|err| {
            ProviderError::response(format!("failed to decode Gemini response: {err}"))
        })
    }

    fn primary_text(&self, body: &Value) -> ProviderResult<String> {
        body.pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                ProviderError::response(
                    "Gemini response is missing candidates[0].content.parts[0].text",
                )
            })
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

fn request_body(text: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![Part {
                text: text.to_owned(),
            }],
        }],
    }
}

fn sanitize_base_url(input: &str) -> ProviderResult<String> {
    let mut base = input.trim().to_owned();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(ProviderError::configuration(
            "Gemini base URL must start with http:// or https://",
        ));
    }
    if !base.ends_with('/') {
        base.push('/');
    }
    base.parse::<Uri>()
        .map_err(|err| ProviderError::configuration(format!("invalid Gemini base URL: {err}")))?;
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> GeminiProvider {
        GeminiProvider::new(GeminiConfig::new().with_api_key("test_key")).expect("provider")
    }

    #[test]
    fn base_url_requires_scheme() {
        let err = GeminiConfig::new()
            .with_base_url("generativelanguage.googleapis.com")
            .expect_err("missing scheme should error");

        assert!(matches!(err, ProviderError::Configuration { .. }));
    }

    #[test]
    fn uri_carries_the_key_as_query_parameter() {
        let uri = provider().build_uri().unwrap();
        assert_eq!(uri.query(), Some("key=test_key"));
        assert_eq!(uri.path(), "/v1beta/models/gemini-pro:generateContent");
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let err = GeminiProvider::new(GeminiConfig::new()).expect_err("key required");
        assert!(matches!(err, ProviderError::Configuration { .. }));
    }

    #[test]
    fn prompt_body_round_trips_the_prompt() {
        let body = request_body("What is the capital of France?");
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(
            value["contents"][0]["parts"][0]["text"],
            "What is the capital of France?"
        );
    }

    #[test]
    fn probe_body_carries_the_fixed_text() {
        let value = serde_json::to_value(request_body(PROBE_PROMPT)).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "Hello");
    }

    #[test]
    fn primary_text_extracts_candidate_text() {
        let body = json!({
            "candidates": [
                { "content": { "parts": [{ "text": "bonjour" }] } }
            ]
        });
        assert_eq!(provider().primary_text(&body).unwrap(), "bonjour");
    }

    #[test]
    fn primary_text_reports_missing_candidates() {
        let err = provider()
            .primary_text(&json!({"promptFeedback": {}}))
            .expect_err("missing candidates");
        assert!(matches!(err, ProviderError::Response { .. }));
    }
}
