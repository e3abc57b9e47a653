//! Persisted resource state
//!
//! The only thing kept between invocations is the resource kind and its
//! composite identity string.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateFile {
    pub kind: String,
    /// `None` once the resource is gone
    #[serde(default)]
    pub identity: Option<String>,
}

impl StateFile {
    pub fn new(kind: &str, identity: Option<String>) -> Self {
        Self {
            kind: kind.to_string(),
            identity,
        }
    }

    /// Load the state at `path`; `None` when there is no file yet.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read state {:?}", path))?;
        let state = serde_json::from_str(&content)
            .with_context(|| format!("Invalid state file {:?}", path))?;
        Ok(Some(state))
    }

    /// Load the stored identity for `kind`, refusing a file written for
    /// another kind.
    pub fn identity_for(path: &Path, kind: &str) -> Result<Option<String>> {
        match Self::load(path)? {
            Some(state) if state.kind != kind => Err(anyhow::anyhow!(
                "State file {:?} belongs to {}, not {}",
                path,
                state.kind,
                kind
            )),
            Some(state) => Ok(state.identity),
            None => Ok(None),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write state {:?}", path))?;
        tracing::debug!("Saved state {:?}: {:?}", path, self.identity);
        Ok(())
    }
}
