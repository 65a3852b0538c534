//! Runtime configuration
//!
//! Resolved once at startup by the binaries and shared as `Arc<Config>`.

use std::path::PathBuf;

pub const US_BASE_URL: &str = "https://us.posthog.com";
pub const EU_BASE_URL: &str = "https://eu.posthog.com";
pub const MCP_DOCS_URL: &str = "https://posthog.com/docs/model-context-protocol";
pub const INKEEP_API_URL: &str = "https://api.inkeep.com/v1/chat/completions";

/// Personal API keys issued by the platform carry this prefix.
pub const PERSONAL_API_KEY_PREFIX: &str = "phx_";

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Fixed API host (self-hosted instances). Disables region detection.
    pub custom_base_url: Option<String>,
    /// Enables the `docs-search` tool.
    pub inkeep_api_key: Option<String>,
    /// Feature groups to expose. Empty means every tool.
    pub features: Vec<String>,
    /// Credential used when no per-request header is available (stdio).
    pub api_token: Option<String>,
    /// Durable state database. In-memory state when unset.
    pub state_db: Option<PathBuf>,
}

impl Config {
    /// Parse a comma separated feature list, dropping blanks.
    pub fn parse_features(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }

    pub fn custom_base_url(&self) -> Option<&str> {
        self.custom_base_url
            .as_deref()
            .map(|s| s.trim_end_matches('/'))
            .filter(|s| !s.is_empty())
    }

    pub fn docs_search_enabled(&self) -> bool {
        self.inkeep_api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_features() {
        assert_eq!(
            Config::parse_features(" flags, dashboards ,,insights"),
            vec!["flags", "dashboards", "insights"]
        );
        assert!(Config::parse_features("").is_empty());
    }

    #[test]
    fn test_custom_base_url_normalised() {
        let config = Config {
            custom_base_url: Some("https://posthog.internal/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.custom_base_url(), Some("https://posthog.internal"));

        let blank = Config {
            custom_base_url: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(blank.custom_base_url(), None);
    }
}
