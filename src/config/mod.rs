/// Application configuration module
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;

/// One backend entry: where it lives and how to authenticate. `user` left
/// empty means unauthenticated access.
#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    pub server_url: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
}

/// The set of backends to aggregate, keyed by logical name. The logical
/// name is what shows up in collision renames and error maps.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub servers: HashMap<String, ServerConfig>,
}

impl AppConfig {
    /// Load configuration from the YAML file named by `MONPROXY_CONFIG`
    /// (default `monproxy.yaml`), with `.env` applied first.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let path = env::var("MONPROXY_CONFIG").unwrap_or_else(|_| "monproxy.yaml".to_string());
        Self::from_yaml_file(path)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&raw)
    }

    /// Parse a configuration document.
    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }
}
