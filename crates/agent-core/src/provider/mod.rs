//! Reasoning-service abstraction
//!
//! A [`Provider`] turns the conversation so far plus the tool catalogue into one
//! [`Decision`]. Adapters own their wire format; they never validate tool names or
//! parameters, so that policy stays with the tool registry.

mod anthropic;
mod ollama;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;

use async_trait::async_trait;
use std::time::Duration;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::ProviderError;
use crate::message::{Decision, Message};
use crate::tools::ToolSpec;

/// A backend capable of deciding the next step of a run
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Produce the decision for the next turn
    async fn decide(
        &self,
        history: &[Message],
        tools: &[ToolSpec],
    ) -> Result<Decision, ProviderError>;
}

/// Build the backend selected by `config`
pub fn from_config(config: &ProviderConfig) -> Result<Box<dyn Provider>, ProviderError> {
    match config.kind {
        ProviderKind::Anthropic => Ok(Box::new(AnthropicProvider::new(config)?)),
        ProviderKind::Ollama => Ok(Box::new(OllamaProvider::new(config)?)),
    }
}

pub(crate) fn http_client(limit: Option<Duration>) -> Result<reqwest::Client, ProviderError> {
    let mut builder = reqwest::Client::builder();
    if let Some(limit) = limit {
        builder = builder.timeout(limit);
    }
    builder
        .build()
        .map_err(|e| ProviderError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a non-success HTTP response into the matching error
pub(crate) async fn check_status(
    resp: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(status_error(status.as_u16(), body))
}

pub(crate) fn status_error(status: u16, body: String) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Auth(body),
        _ => ProviderError::Http { status, body },
    }
}

/// Deserialize a response body, reporting schema mismatches as malformed decisions
pub(crate) fn parse_body<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError::MalformedDecision(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(status_error(401, "no".into()), ProviderError::Auth(_)));
        assert!(matches!(status_error(403, "no".into()), ProviderError::Auth(_)));
        assert!(matches!(
            status_error(529, "overloaded".into()),
            ProviderError::Http { status: 529, .. }
        ));
    }

    #[test]
    fn test_from_config_requires_key_for_anthropic() {
        let config = ProviderConfig::new(ProviderKind::Anthropic);
        assert!(matches!(from_config(&config), Err(ProviderError::Config(_))));

        let config = ProviderConfig::new(ProviderKind::Anthropic).with_api_key("sk-test");
        assert_eq!(from_config(&config).unwrap().name(), "anthropic");

        let config = ProviderConfig::new(ProviderKind::Ollama);
        assert_eq!(from_config(&config).unwrap().name(), "ollama");
    }
}
