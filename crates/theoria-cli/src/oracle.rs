//! Choosing the text oracle behind a run.

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use std::sync::Arc;
use theoria_oracle::{HeuristicOracle, ProviderConfig, ProviderConfigError, ProviderKind, TextOracle};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderChoice {
    /// A hosted provider if one is configured in the environment, else heuristic
    Auto,
    /// Offline pattern-based oracle
    Heuristic,
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
    /// OpenAI-compatible server at `LOCAL_LLM_URL`
    Local,
}

impl ProviderChoice {
    fn kind(self) -> Option<ProviderKind> {
        match self {
            ProviderChoice::OpenAI => Some(ProviderKind::OpenAI),
            ProviderChoice::Anthropic => Some(ProviderKind::Anthropic),
            ProviderChoice::Local => Some(ProviderKind::Local),
            ProviderChoice::Auto | ProviderChoice::Heuristic => None,
        }
    }
}

pub fn build(choice: ProviderChoice) -> Result<Arc<dyn TextOracle>> {
    build_with(choice, |key| std::env::var(key).ok())
}

fn build_with(
    choice: ProviderChoice,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn TextOracle>> {
    if choice == ProviderChoice::Heuristic {
        return heuristic();
    }

    let config = match (choice, ProviderConfig::from_lookup(&lookup)) {
        (ProviderChoice::Auto, Err(ProviderConfigError::NoProviderConfigured)) => {
            info!("no hosted provider configured; using the heuristic oracle");
            return heuristic();
        }
        (_, Err(err)) => return Err(err.into()),
        (ProviderChoice::Auto, Ok(config)) => config,
        (requested, Ok(config)) => {
            let wanted = requested.kind();
            if wanted == Some(config.provider) {
                config
            } else {
                explicit(requested, &lookup)?
            }
        }
    };
    hosted(config)
}

/// Configuration for a specific provider, ignoring higher-priority ones.
fn explicit(choice: ProviderChoice, lookup: &impl Fn(&str) -> Option<String>) -> Result<ProviderConfig> {
    let missing = |var: &str| anyhow!("--provider {choice:?} needs {var}");
    match choice {
        ProviderChoice::OpenAI => {
            let key = lookup("OPENAI_API_KEY").ok_or_else(|| missing("OPENAI_API_KEY"))?;
            let mut config = ProviderConfig::openai(
                &key,
                &lookup("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            );
            config.base_url = lookup("OPENAI_BASE_URL");
            Ok(config)
        }
        ProviderChoice::Anthropic => {
            let key = lookup("ANTHROPIC_API_KEY").ok_or_else(|| missing("ANTHROPIC_API_KEY"))?;
            let mut config = ProviderConfig::anthropic(
                &key,
                &lookup("ANTHROPIC_MODEL").unwrap_or_else(|| "claude-3-5-haiku-latest".to_string()),
            );
            config.base_url = lookup("ANTHROPIC_BASE_URL");
            Ok(config)
        }
        ProviderChoice::Local => {
            let url = lookup("LOCAL_LLM_URL").ok_or_else(|| missing("LOCAL_LLM_URL"))?;
            Ok(ProviderConfig::local(
                &url,
                &lookup("LOCAL_LLM_MODEL").unwrap_or_else(|| "default".to_string()),
            ))
        }
        ProviderChoice::Auto | ProviderChoice::Heuristic => {
            Err(anyhow!("{choice:?} is not a hosted provider"))
        }
    }
}

fn heuristic() -> Result<Arc<dyn TextOracle>> {
    Ok(Arc::new(HeuristicOracle::new()?))
}

#[cfg(feature = "llm-http")]
fn hosted(config: ProviderConfig) -> Result<Arc<dyn TextOracle>> {
    info!(provider = ?config.provider, model = %config.model, "using hosted oracle");
    Ok(Arc::new(theoria_oracle::HttpOracle::new(config)?))
}

#[cfg(not(feature = "llm-http"))]
fn hosted(config: ProviderConfig) -> Result<Arc<dyn TextOracle>> {
    tracing::warn!(provider = ?config.provider, "built without `llm-http`");
    Err(anyhow!(
        "{:?} needs the `llm-http` feature; rebuild with it or pass --provider heuristic",
        config.provider
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn auto_falls_back_to_heuristic() {
        let oracle = build_with(ProviderChoice::Auto, env(&[])).unwrap();
        assert_eq!(oracle.name(), "heuristic");
    }

    #[test]
    fn explicit_provider_requires_its_key() {
        let err = build_with(ProviderChoice::Anthropic, env(&[("OPENAI_API_KEY", "sk")]))
            .err()
            .unwrap();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn explicit_provider_skips_higher_priority_ones() {
        let config = explicit(
            ProviderChoice::Local,
            &env(&[("OPENAI_API_KEY", "sk"), ("LOCAL_LLM_URL", "http://localhost:8080/v1/")]),
        )
        .unwrap();
        assert_eq!(config.provider, ProviderKind::Local);
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080/v1"));
    }
}
