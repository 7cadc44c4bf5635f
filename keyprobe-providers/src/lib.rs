//! Provider adapters for the `keyprobe` CLI.
//!
//! Each module implements one provider behind the shared [`Provider`] trait
//! defined in [`traits`]: a fixed low-cost key probe, the real prompt request,
//! and extraction of the primary response text.

#![warn(missing_docs, clippy::pedantic)]

pub mod gemini;
pub mod openai;
pub mod traits;

mod http_client;

pub use traits::{
    PROBE_PROMPT, PROBE_TIMEOUT, Provider, ProviderError, ProviderKind, ProviderMetadata,
    ProviderResult,
};

use gemini::{GeminiConfig, GeminiProvider};
use openai::{ChatGptConfig, ChatGptProvider};

/// Builds the adapter for `kind`, which holds `api_key` for the rest of the
/// run.
///
/// # Errors
///
/// Returns [`ProviderError::Configuration`] if the provider rejects its
/// configuration.
pub fn build_provider(
    kind: ProviderKind,
    api_key: impl Into<String>,
) -> ProviderResult<Box<dyn Provider>> {
    match kind {
        ProviderKind::ChatGpt => Ok(Box::new(ChatGptProvider::new(
            ChatGptConfig::new().with_api_key(api_key),
        )?)),
        ProviderKind::Gemini => Ok(Box::new(GeminiProvider::new(
            GeminiConfig::new().with_api_key(api_key),
        )?)),
    }
}
