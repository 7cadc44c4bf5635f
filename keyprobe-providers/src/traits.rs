//! Shared provider trait and data structures.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use hyper::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Result alias used by provider implementations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Fixed text sent by every key probe.
pub const PROBE_PROMPT: &str = "Hello";

/// Upper bound on the key probe round trip. The prompt request itself carries
/// no timeout.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type shared by provider implementations and the session driver.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested provider identifier is not one of the supported set.
    #[error("provider `{name}` is not supported")]
    Unsupported {
        /// The offending identifier string.
        name: String,
    },

    /// Provider is misconfigured or missing credentials.
    #[error("provider not configured: {reason}")]
    Configuration {
        /// Additional context for the failure.
        reason: String,
    },

    /// The outgoing request could not be constructed.
    #[error("invalid provider request: {reason}")]
    InvalidRequest {
        /// Reason describing why the request could not be built.
        reason: String,
    },

    /// Transport-level failures (connect, TLS, timeout).
    #[error("provider transport error: {reason}")]
    Transport {
        /// Additional context about the error.
        reason: String,
    },

    /// The provider returned a body that could not be decoded, or a decoded
    /// body missing an expected field.
    #[error("provider response error: {reason}")]
    Response {
        /// Additional context about the response failure.
        reason: String,
    },
}

impl ProviderError {
    /// Convenience constructor for unsupported provider identifiers.
    #[must_use]
    pub fn unsupported(name: impl Into<String>) -> Self {
        Self::Unsupported { name: name.into() }
    }

    /// Convenience constructor for configuration issues.
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for request construction failures.
    #[must_use]
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for transport failures.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for malformed responses.
    #[must_use]
    pub fn response(reason: impl Into<String>) -> Self {
        Self::Response {
            reason: reason.into(),
        }
    }
}

/// The supported providers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    /// OpenAI chat completions, bearer-token auth.
    ChatGpt,
    /// Google Gemini, key-in-query auth.
    Gemini,
}

impl ProviderKind {
    /// Returns the canonical identifier ("chatgpt" or "gemini").
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ChatGpt => "chatgpt",
            Self::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "chatgpt" => Ok(Self::ChatGpt),
            "gemini" => Ok(Self::Gemini),
            other => Err(ProviderError::unsupported(other)),
        }
    }
}

/// Minimal metadata describing a provider instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderMetadata {
    kind: ProviderKind,
    model: String,
}

impl ProviderMetadata {
    /// Creates metadata for the supplied provider and model identifier.
    #[must_use]
    pub fn new(kind: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
        }
    }

    /// Returns which provider this is.
    #[must_use]
    pub const fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Returns the model used for prompt requests.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Probe outcome for an HTTP status: the credential is valid iff the provider
/// answered 200 exactly. Redirects and other 2xx codes do not count.
#[must_use]
pub fn probe_status_is_valid(status: StatusCode) -> bool {
    status == StatusCode::OK
}

/// Trait implemented by all providers.
///
/// A provider owns its credential for the duration of the run; the probe and
/// the prompt request both go to the same endpoint with the same auth
/// placement.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns basic metadata describing the provider instance.
    fn metadata(&self) -> &ProviderMetadata;

    /// Sends the fixed probe request and reports whether the credential is
    /// valid. `Ok(true)` iff the provider answered HTTP 200 exactly.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Transport`] when the probe cannot complete
    /// within [`PROBE_TIMEOUT`] or the connection fails.
    async fn validate_key(&self) -> ProviderResult<bool>;

    /// Sends the real prompt request and returns the decoded response body.
    ///
    /// The body is decoded regardless of HTTP status; a non-JSON error body
    /// surfaces as [`ProviderError::Response`].
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Transport`] on connection failure and
    /// [`ProviderError::Response`] when the body is not JSON.
    async fn fetch(&self, prompt: &str) -> ProviderResult<Value>;

    /// Extracts the primary response text from a decoded body.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Response`] when the provider's documented
    /// field path is absent.
    fn primary_text(&self, body: &Value) -> ProviderResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_identifiers() {
        assert_eq!("chatgpt".parse::<ProviderKind>().unwrap(), ProviderKind::ChatGpt);
        assert_eq!("gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
    }

    #[test]
    fn rejects_unknown_identifier() {
        let err = "claude".parse::<ProviderKind>().expect_err("unsupported");
        assert!(matches!(err, ProviderError::Unsupported { ref name } if name == "claude"));
    }

    #[test]
    fn display_matches_canonical_name() {
        assert_eq!(ProviderKind::ChatGpt.to_string(), "chatgpt");
        assert_eq!(ProviderKind::Gemini.to_string(), "gemini");
    }

    #[test]
    fn only_exactly_200_validates() {
        assert!(probe_status_is_valid(StatusCode::OK));
        assert!(!probe_status_is_valid(StatusCode::CREATED));
        assert!(!probe_status_is_valid(StatusCode::UNAUTHORIZED));
        assert!(!probe_status_is_valid(StatusCode::FORBIDDEN));
        assert!(!probe_status_is_valid(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
