//! Hosted oracle providers
//!
//! OpenAI-compatible chat completions, Anthropic messages, and local
//! OpenAI-compatible servers. The HTTP client lives behind the `http` feature;
//! configuration is always available so the CLI can report what it found.

use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
    Local,
}

/// Provider configuration loaded from environment variables.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderConfigError {
    #[error("no oracle provider configured; set OPENAI_API_KEY, ANTHROPIC_API_KEY or LOCAL_LLM_URL")]
    NoProviderConfigured,
    #[error("invalid provider configuration: {0}")]
    Invalid(String),
}

impl ProviderConfig {
    /// OpenAI, then Anthropic, then a local server, first match wins.
    pub fn from_env() -> Result<Self, ProviderConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ProviderConfigError> {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            return Ok(Self {
                provider: ProviderKind::OpenAI,
                api_key: key,
                model: lookup("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
                base_url: lookup("OPENAI_BASE_URL"),
                timeout_secs: 60,
            });
        }

        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            return Ok(Self {
                provider: ProviderKind::Anthropic,
                api_key: key,
                model: lookup("ANTHROPIC_MODEL")
                    .unwrap_or_else(|| "claude-3-5-haiku-latest".to_string()),
                base_url: lookup("ANTHROPIC_BASE_URL"),
                timeout_secs: 60,
            });
        }

        if let Some(url) = lookup("LOCAL_LLM_URL") {
            if url.trim().is_empty() {
                return Err(ProviderConfigError::Invalid("LOCAL_LLM_URL is empty".into()));
            }
            return Ok(Self::local(
                &url,
                &lookup("LOCAL_LLM_MODEL").unwrap_or_else(|| "default".to_string()),
            ));
        }

        Err(ProviderConfigError::NoProviderConfigured)
    }

    pub fn openai(api_key: &str, model: &str) -> Self {
        Self {
            provider: ProviderKind::OpenAI,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: None,
            timeout_secs: 60,
        }
    }

    pub fn anthropic(api_key: &str, model: &str) -> Self {
        Self {
            provider: ProviderKind::Anthropic,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: None,
            timeout_secs: 60,
        }
    }

    pub fn local(url: &str, model: &str) -> Self {
        Self {
            provider: ProviderKind::Local,
            api_key: String::new(),
            model: model.to_string(),
            base_url: Some(url.trim_end_matches('/').to_string()),
            timeout_secs: 120,
        }
    }

    #[cfg(feature = "http")]
    fn endpoint(&self) -> String {
        match self.provider {
            ProviderKind::OpenAI | ProviderKind::Local => format!(
                "{}/chat/completions",
                self.base_url
                    .as_deref()
                    .unwrap_or("https://api.openai.com/v1")
            ),
            ProviderKind::Anthropic => format!(
                "{}/v1/messages",
                self.base_url
                    .as_deref()
                    .unwrap_or("https://api.anthropic.com")
            ),
        }
    }
}

// ============================================================================
// HTTP oracle
// ============================================================================

#[cfg(feature = "http")]
pub use http::HttpOracle;

#[cfg(feature = "http")]
mod http {
    use super::{ProviderConfig, ProviderKind};
    use crate::protocol::PromptTemplates;
    use crate::{OracleError, OracleRequest, OracleResponse, TextOracle};
    use async_trait::async_trait;
    use reqwest::{Client, StatusCode};
    use std::time::Duration;

    pub struct HttpOracle {
        client: Client,
        config: ProviderConfig,
        name: String,
    }

    impl HttpOracle {
        pub fn new(config: ProviderConfig) -> Result<Self, OracleError> {
            let client = Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .map_err(|e| OracleError::Network(format!("failed to create HTTP client: {e}")))?;
            let name = format!("{:?}:{}", config.provider, config.model).to_lowercase();
            Ok(Self {
                client,
                config,
                name,
            })
        }

        fn body(&self, request: &OracleRequest) -> serde_json::Value {
            let system = PromptTemplates::system_prompt(request.role);
            match self.config.provider {
                ProviderKind::OpenAI | ProviderKind::Local => serde_json::json!({
                    "model": self.config.model,
                    "temperature": 0.0,
                    "response_format": {"type": "json_object"},
                    "messages": [
                        {"role": "system", "content": system},
                        {"role": "user", "content": request.payload},
                    ],
                }),
                ProviderKind::Anthropic => serde_json::json!({
                    "model": self.config.model,
                    "max_tokens": 4096,
                    "temperature": 0.0,
                    "system": system,
                    "messages": [
                        {"role": "user", "content": request.payload},
                    ],
                }),
            }
        }

        fn content(&self, data: &serde_json::Value) -> Option<String> {
            let content = match self.config.provider {
                ProviderKind::OpenAI | ProviderKind::Local => {
                    data["choices"][0]["message"]["content"].as_str()
                }
                ProviderKind::Anthropic => data["content"][0]["text"].as_str(),
            };
            content.map(str::to_string)
        }
    }

    #[async_trait]
    impl TextOracle for HttpOracle {
        async fn call(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
            let mut builder = self
                .client
                .post(self.config.endpoint())
                .header("Content-Type", "application/json");
            builder = match self.config.provider {
                ProviderKind::OpenAI => {
                    builder.header("Authorization", format!("Bearer {}", self.config.api_key))
                }
                ProviderKind::Anthropic => builder
                    .header("x-api-key", &self.config.api_key)
                    .header("anthropic-version", "2023-06-01"),
                ProviderKind::Local => builder,
            };

            let response = builder.json(&self.body(request)).send().await.map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout(Duration::from_secs(self.config.timeout_secs))
                } else {
                    OracleError::Network(e.to_string())
                }
            })?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(30);
                return Err(OracleError::RateLimited {
                    retry_after_ms: retry_after * 1000,
                });
            }
            if status.is_server_error() {
                return Err(OracleError::Network(format!("server error {status}")));
            }
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(OracleError::Api(format!("{status}: {text}")));
            }

            let data: serde_json::Value = response
                .json()
                .await
                .map_err(|e| OracleError::Malformed(e.to_string()))?;
            self.content(&data)
                .map(OracleResponse::new)
                .ok_or_else(|| OracleError::Malformed("response carried no text content".into()))
        }

        fn name(&self) -> &str {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn openai_takes_precedence() {
        let config = ProviderConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-1"),
            ("ANTHROPIC_API_KEY", "ak-1"),
        ]))
        .unwrap();
        assert_eq!(config.provider, ProviderKind::OpenAI);
    }

    #[test]
    fn local_server_uses_its_own_url() {
        let config = ProviderConfig::from_lookup(lookup(&[
            ("LOCAL_LLM_URL", "http://localhost:8080/v1/"),
            ("LOCAL_LLM_MODEL", "mistral"),
        ]))
        .unwrap();
        assert_eq!(config.provider, ProviderKind::Local);
        assert_eq!(config.model, "mistral");
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080/v1"));
    }

    #[cfg(feature = "http")]
    #[test]
    fn endpoints_follow_provider_and_base_url() {
        let openai = ProviderConfig::openai("sk-1", "m");
        assert_eq!(openai.endpoint(), "https://api.openai.com/v1/chat/completions");
        let anthropic = ProviderConfig::anthropic("ak-1", "m");
        assert_eq!(anthropic.endpoint(), "https://api.anthropic.com/v1/messages");
        let local = ProviderConfig::local("http://localhost:8080/v1/", "mistral");
        assert_eq!(local.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn nothing_configured_is_an_error() {
        let err = ProviderConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ProviderConfigError::NoProviderConfigured));
    }

    #[test]
    fn debug_output_hides_the_key() {
        let config = ProviderConfig::anthropic("secret-key", "m");
        assert!(!format!("{config:?}").contains("secret-key"));
    }
}
