//! Configuration for the Vigil pipeline.
//!
//! Uses `figment` for layered configuration: built-in defaults -> optional
//! `vigil.toml` -> `VIGIL_`-prefixed environment variables. Nested fields
//! use double underscores in the environment, e.g.
//! `VIGIL_SUPPORT_DESK__API_TOKEN`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VigilConfig {
    pub support_desk: SupportDeskConfig,
    pub evaluation: EvaluationConfig,
}

/// Connection settings for the external support-desk system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportDeskConfig {
    /// Base URL of the support desk, e.g. `https://desk.example.com`.
    pub base_url: String,
    /// Account id under which conversations are created.
    pub account_id: u64,
    /// Static API token sent on every request.
    pub api_token: String,
    /// Inbox that receives escalated conversations.
    pub inbox_id: u64,
    /// HMAC secret for inbound webhooks. When unset, signature verification
    /// is bypassed (development only; see `handoff::webhook`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
    /// Bound on every outbound request.
    pub request_timeout_secs: u64,
}

impl Default for SupportDeskConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            account_id: 0,
            api_token: String::new(),
            inbox_id: 0,
            webhook_secret: None,
            request_timeout_secs: 15,
        }
    }
}

/// Settings for the evaluation-run engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Degradation threshold for regression classification.
    pub regression_threshold: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            regression_threshold: 0.05,
        }
    }
}

impl VigilConfig {
    /// Load configuration from defaults, an optional TOML file, and the
    /// environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(VigilConfig::default()));
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed("VIGIL_").split("__"))
            .extract()
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
    }

    /// Check the fields the handoff client cannot run without.
    pub fn validate_support_desk(&self) -> Result<(), ConfigError> {
        let desk = &self.support_desk;
        if desk.base_url.is_empty() {
            return Err(ConfigError::MissingField {
                field: "support_desk.base_url".into(),
            });
        }
        if desk.api_token.is_empty() {
            return Err(ConfigError::MissingField {
                field: "support_desk.api_token".into(),
            });
        }
        if desk.account_id == 0 {
            return Err(ConfigError::MissingField {
                field: "support_desk.account_id".into(),
            });
        }
        if desk.inbox_id == 0 {
            return Err(ConfigError::MissingField {
                field: "support_desk.inbox_id".into(),
            });
        }
        Ok(())
    }
}
