//! Linear session flow: resolve the provider, probe the key, fetch the
//! response, render the report.

use keyprobe_providers::{
    Provider, ProviderError, ProviderKind, ProviderResult, build_provider,
};
use serde_json::Value;
use tracing::warn;

/// Everything one run needs, collected up front.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Provider identifier ("chatgpt" or "gemini").
    pub provider: String,
    /// API key, held in memory only for this run.
    pub credential: String,
    /// Free-form prompt forwarded after a successful probe.
    pub prompt: String,
}

/// Runs a full session and returns the rendered report, or `None` when the
/// run ended early (unsupported provider, invalid key, failed fetch). Early
/// endings print their own console message.
///
/// # Errors
///
/// Returns an error when the provider cannot be constructed, or when a
/// ChatGPT response decodes but is missing its primary text path.
pub async fn execute(config: &SessionConfig) -> ProviderResult<Option<String>> {
    let kind = match config.provider.parse::<ProviderKind>() {
        Ok(kind) => kind,
        Err(err) => {
            println!("Error: {err}");
            return Ok(None);
        }
    };

    let provider = build_provider(kind, config.credential.clone())?;
    let Some(body) = dispatch(provider.as_ref(), &config.prompt).await else {
        return Ok(None);
    };

    render_report(provider.as_ref(), &body).map(Some)
}

/// Probes the key, then fetches the prompt response.
///
/// A probe that answers anything but valid — including a probe that errors —
/// short-circuits before any prompt request is sent.
pub async fn dispatch(provider: &dyn Provider, prompt: &str) -> Option<Value> {
    let kind = provider.metadata().kind();

    let valid = match provider.validate_key().await {
        Ok(valid) => valid,
        Err(err) => {
            warn!(provider = %kind, error = %err, "key probe failed");
            println!("Error validating {kind} API key: {err}");
            false
        }
    };

    if !valid {
        println!("Invalid {kind} API key");
        return None;
    }

    match provider.fetch(prompt).await {
        Ok(body) => Some(body),
        Err(err) => {
            warn!(provider = %kind, error = %err, "prompt request failed");
            println!("Error getting response from {kind}: {err}");
            None
        }
    }
}

/// Renders the printed report for a decoded response body: the full body as
/// formatted JSON, the primary response text, and for ChatGPT the model and
/// token-usage details.
///
/// # Errors
///
/// Returns [`ProviderError::Response`] when a ChatGPT body is missing its
/// primary text path. Gemini extraction failures are rendered into the report
/// instead of propagating.
pub fn render_report(provider: &dyn Provider, body: &Value) -> ProviderResult<String> {
    let pretty = serde_json::to_string_pretty(body)
        .map_err(|err| ProviderError::response(format!("failed to format response body: {err}")))?;

    let mut report = String::new();
    report.push_str("\n--- Full Response ---\n");
    report.push_str(&pretty);
    report.push_str("\n\n--- Main Response ---\n");

    match provider.metadata().kind() {
        ProviderKind::ChatGpt => {
            report.push_str(&provider.primary_text(body)?);
            report.push('\n');
            report.push_str(&usage_details(body));
        }
        ProviderKind::Gemini => match provider.primary_text(body) {
            Ok(text) => {
                report.push_str(&text);
                report.push('\n');
            }
            Err(_) => report.push_str("Could not parse Gemini response\n"),
        },
    }

    Ok(report)
}

// Absent usage fields fall back to zero, an absent model to "Not available".
fn usage_details(body: &Value) -> String {
    let model = body
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or("Not available");
    let tokens = |field: &str| {
        body.pointer(&format!("/usage/{field}"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    };

    format!(
        "\n--- Usage Details ---\nModel used: {model}\nTokens used:\n  Input: {}\n  Output: {}\n  Total: {}\n",
        tokens("prompt_tokens"),
        tokens("completion_tokens"),
        tokens("total_tokens"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn usage_details_reads_counters() {
        let body = json!({
            "model": "gpt-4",
            "usage": {"prompt_tokens": 9, "completion_tokens": 12, "total_tokens": 21}
        });

        let details = usage_details(&body);
        assert!(details.contains("Model used: gpt-4"));
        assert!(details.contains("Input: 9"));
        assert!(details.contains("Output: 12"));
        assert!(details.contains("Total: 21"));
    }

    #[test]
    fn usage_details_defaults_when_fields_missing() {
        let details = usage_details(&json!({}));
        assert!(details.contains("Model used: Not available"));
        assert!(details.contains("Input: 0"));
        assert!(details.contains("Output: 0"));
        assert!(details.contains("Total: 0"));
    }
}
