//! Parsing for `"provider/model"`-style specifier strings (e.g.
//! `"ollama/llama3.1:8b"`, `"openai/gpt-4o-mini"`), with an optional base
//! URL override for self-hosted/compatible endpoints.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use newsgraph_core::error::CoreError;

/// A parsed `provider/model` specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpecifier {
    pub provider: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
}

impl ModelSpecifier {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            provider: None,
            model: model.into(),
            base_url: None,
        }
    }

    pub fn with_provider(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            model: model.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(
        provider: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            provider: Some(provider.into()),
            model: model.into(),
            base_url: Some(base_url.into()),
        }
    }

    /// Parses `"model"`, `"provider/model"`, or `"provider/subprovider/model"`.
    pub fn parse(spec: &str) -> Result<Self, CoreError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(CoreError::configuration("model specification cannot be empty"));
        }

        let parts: Vec<&str> = spec.split('/').collect();
        match parts.len() {
            1 => Ok(Self::new(parts[0])),
            n => {
                let provider = parts[..n - 1].join("/");
                let model = parts[n - 1];
                Ok(Self::with_provider(provider, model))
            }
        }
    }

    pub fn parse_with_base_url(spec: &str, base_url: Option<&str>) -> Result<Self, CoreError> {
        let mut model_spec = Self::parse(spec)?;
        model_spec.base_url = base_url.map(ToString::to_string);
        Ok(model_spec)
    }

    pub fn provider_or_default<'a>(&'a self, default: &'a str) -> &'a str {
        self.provider.as_deref().unwrap_or(default)
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn has_base_url(&self) -> bool {
        self.base_url.is_some()
    }
}

impl FromStr for ModelSpecifier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ModelSpecifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "{provider}/{}", self.model),
            None => write!(f, "{}", self.model),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_only() {
        let spec = ModelSpecifier::parse("gpt-4").unwrap();
        assert_eq!(spec.model, "gpt-4");
        assert!(!spec.has_provider());
    }

    #[test]
    fn parses_provider_and_model() {
        let spec = ModelSpecifier::parse("ollama/llama3.1:8b").unwrap();
        assert_eq!(spec.model, "llama3.1:8b");
        assert_eq!(spec.provider, Some("ollama".to_string()));
    }

    #[test]
    fn parses_nested_provider() {
        let spec = ModelSpecifier::parse("openrouter/deepseek/model").unwrap();
        assert_eq!(spec.model, "model");
        assert_eq!(spec.provider, Some("openrouter/deepseek".to_string()));
    }

    #[test]
    fn rejects_empty_spec() {
        assert!(ModelSpecifier::parse("").is_err());
        assert!(ModelSpecifier::parse("   ").is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let spec = ModelSpecifier::with_provider("openai", "gpt-4o-mini");
        assert_eq!(spec.to_string(), "openai/gpt-4o-mini");
        assert_eq!(ModelSpecifier::parse(&spec.to_string()).unwrap(), spec);
    }
}
