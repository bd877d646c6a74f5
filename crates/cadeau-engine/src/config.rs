//! Engine configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the engine can run with zero
//! configuration for local development.

use cadeau_shared::constants::{DEFAULT_LINK_BASE_URL, RECEIVER_PLACEHOLDER_ALIAS};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL prepended to acceptance link tokens when building the
    /// shareable link for an external receiver.
    /// Env: `CADEAU_LINK_BASE_URL`
    /// Default: `https://cadeau.app/g`
    pub link_base_url: String,

    /// Alias seeded for the receiver side of a freshly opened anonymous
    /// conversation.
    /// Env: `CADEAU_RECEIVER_ALIAS`
    /// Default: `"Gift recipient"`
    pub receiver_alias: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            link_base_url: DEFAULT_LINK_BASE_URL.to_string(),
            receiver_alias: RECEIVER_PLACEHOLDER_ALIAS.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("CADEAU_LINK_BASE_URL") {
            if !url.is_empty() {
                config.link_base_url = url.trim_end_matches('/').to_string();
            }
        }

        if let Ok(alias) = std::env::var("CADEAU_RECEIVER_ALIAS") {
            if !alias.trim().is_empty() {
                config.receiver_alias = alias;
            }
        }

        config
    }

    /// The shareable acceptance link for a minted token.
    pub fn acceptance_link(&self, token: &str) -> String {
        format!("{}/{}", self.link_base_url, token)
    }
}
