//! Configuration loading

use crate::RequestPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("`{url}` is not a valid {expected} url")]
    InvalidUrl { url: String, expected: &'static str }
}

/// The GraphQL service the client talks to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    pub name: String,
    /// HTTP endpoint for queries and mutations.
    pub url: String
}

/// Client settings that usually live in a config file rather than in code.
///
/// ```
/// use hermes::{ClientConfig, RequestPolicy};
///
/// let config = ClientConfig::from_yaml_str(r#"
/// service:
///   name: my-app
///   url: http://localhost:4000/graphql
/// subscriptions_url: ws://localhost:4000/graphql
/// "#).unwrap();
///
/// assert_eq!(config.service.name, "my-app");
/// assert_eq!(config.request_policy, RequestPolicy::CacheFirst);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    pub service: ServiceConfig,
    /// WebSocket endpoint for subscriptions, if the service has one.
    #[serde(default)]
    pub subscriptions_url: Option<String>,
    #[serde(default)]
    pub request_policy: RequestPolicy
}

impl ClientConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.service.url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl {
                url: url.clone(),
                expected: "http"
            });
        }
        if let Some(ref url) = self.subscriptions_url {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(ConfigError::InvalidUrl {
                    url: url.clone(),
                    expected: "websocket"
                });
            }
        }
        Ok(())
    }
}
