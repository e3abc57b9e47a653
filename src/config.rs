//! Configuration Management
//!
//! Handles persistent configuration storage for provider-bridge: endpoint
//! overrides per service and where state files live.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable holding the API bearer token
pub const TOKEN_ENV: &str = "PROVIDER_BRIDGE_TOKEN";

/// Built-in endpoint of a service
pub fn default_endpoint(service: &str) -> Option<&'static str> {
    match service {
        "pipeline" => Some("https://api.us-south.devops.cloud.ibm.com/pipeline/v2"),
        "event_notifications" => {
            Some("https://us-south.event-notifications.cloud.ibm.com/event-notifications")
        }
        _ => None,
    }
}

/// `PROVIDER_BRIDGE_<SERVICE>_ENDPOINT`
pub fn endpoint_env(service: &str) -> String {
    format!("PROVIDER_BRIDGE_{}_ENDPOINT", service.to_uppercase())
}

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Endpoint overrides keyed by service name
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
    /// Directory for state files when `--state` is not given
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("provider-bridge").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from `path`; a missing or unreadable file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config {:?}", path))?;

        Ok(())
    }

    /// Get effective endpoint (CLI > environment > config > built-in default)
    pub fn effective_endpoint(&self, service: &str, flag: Option<&str>) -> Result<String> {
        let from_env = std::env::var(endpoint_env(service)).ok();
        self.resolve_endpoint(service, flag, from_env)
            .with_context(|| format!("No endpoint known for service {}", service))
    }

    fn resolve_endpoint(
        &self,
        service: &str,
        flag: Option<&str>,
        from_env: Option<String>,
    ) -> Option<String> {
        flag.map(str::to_string)
            .or(from_env.filter(|v| !v.is_empty()))
            .or_else(|| self.endpoints.get(service).cloned())
            .or_else(|| default_endpoint(service).map(str::to_string))
    }

    /// Get effective token (CLI > environment)
    pub fn effective_token(flag: Option<&str>) -> Result<String> {
        flag.map(str::to_string)
            .or_else(|| std::env::var(TOKEN_ENV).ok().filter(|v| !v.is_empty()))
            .with_context(|| format!("No API token: pass --token or set {}", TOKEN_ENV))
    }

    /// State file for `kind` when none is given explicitly
    pub fn state_path(&self, kind: &str) -> PathBuf {
        let file = format!("{}.state.json", kind);
        match &self.state_dir {
            Some(dir) => dir.join(file),
            None => PathBuf::from(file),
        }
    }

    /// Set an endpoint override and save
    pub fn set_endpoint(&mut self, service: &str, endpoint: &str) -> Result<()> {
        self.endpoints
            .insert(service.to_string(), endpoint.to_string());
        self.save()
    }

    /// Set the state directory and save
    pub fn set_state_dir(&mut self, dir: &Path) -> Result<()> {
        self.state_dir = Some(dir.to_path_buf());
        self.save()
    }
}
