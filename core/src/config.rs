//! Client configuration.
//!
//! There is no built-in base URL: a `Client` only prefixes paths when the
//! configuration says so. Values can come from JSON, from the environment,
//! or be set directly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const ENV_BASE_URL: &str = "NETTASK_BASE_URL";
pub const ENV_USER_AGENT: &str = "NETTASK_USER_AGENT";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Prefix for relative request paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Headers added to every request before its own headers.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub default_headers: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Defaults overridden by `NETTASK_BASE_URL` / `NETTASK_USER_AGENT`.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(base_url) = lookup(ENV_BASE_URL).filter(|v| !v.is_empty()) {
            self.base_url = Some(base_url);
        }
        if let Some(user_agent) = lookup(ENV_USER_AGENT).filter(|v| !v.is_empty()) {
            self.user_agent = Some(user_agent);
        }
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_default_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_base_url() {
        let config = ClientConfig::default();
        assert!(config.base_url.is_none());
        assert!(config.default_headers.is_empty());
    }

    #[test]
    fn parses_json() {
        let config = ClientConfig::from_json(
            r#"{"base_url":"https://api.example.com","default_headers":{"Accept":"application/json"}}"#,
        )
        .unwrap();
        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(
            config.default_headers.get("Accept").map(String::as_str),
            Some("application/json")
        );
        assert!(config.user_agent.is_none());
    }

    #[test]
    fn empty_json_is_default() {
        assert_eq!(ClientConfig::from_json("{}").unwrap(), ClientConfig::default());
    }

    #[test]
    fn env_overrides_apply() {
        let config = ClientConfig::default()
            .with_base_url("http://old")
            .with_env_overrides(|key| match key {
                ENV_BASE_URL => Some("http://new".to_string()),
                ENV_USER_AGENT => Some(String::new()),
                _ => None,
            });
        assert_eq!(config.base_url.as_deref(), Some("http://new"));
        assert!(config.user_agent.is_none());
    }

    #[test]
    fn serializes_without_empty_fields() {
        let json = serde_json::to_value(ClientConfig::default().with_user_agent("t/1")).unwrap();
        assert_eq!(json, serde_json::json!({"user_agent": "t/1"}));
    }
}
