//! Process-wide webservice registry.
//!
//! Readers take an immutable snapshot; a refresh validates the whole new set
//! and swaps it in one step, so no reader ever sees a partial update.

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, RwLock};

use super::error::AuthzError;
use crate::models::{AccessLevel, WebserviceConfig};

#[derive(Debug, Deserialize)]
struct RegistryFile {
    webservices: Vec<WebserviceConfig>,
}

/// Immutable view of every configured webservice.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    webservices: HashMap<String, WebserviceConfig>,
}

impl RegistrySnapshot {
    pub fn build(configs: Vec<WebserviceConfig>) -> Result<Self, AuthzError> {
        let mut webservices = HashMap::with_capacity(configs.len());
        for config in configs {
            config
                .validate()
                .map_err(|message| AuthzError::configuration(&config.id, message))?;
            if webservices.contains_key(&config.id) {
                return Err(AuthzError::configuration(
                    &config.id,
                    "webservice declared more than once",
                ));
            }
            webservices.insert(config.id.clone(), config);
        }
        Ok(Self { webservices })
    }

    pub fn get(&self, id: &str) -> Option<&WebserviceConfig> {
        self.webservices.get(id)
    }

    /// Present and enabled.
    pub fn is_enabled(&self, id: &str) -> bool {
        self.webservices.get(id).is_some_and(|ws| ws.enabled)
    }

    pub fn len(&self) -> usize {
        self.webservices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.webservices.is_empty()
    }

    pub fn enabled(&self) -> impl Iterator<Item = &WebserviceConfig> {
        self.webservices.values().filter(|ws| ws.enabled)
    }

    /// Enabled webservices declaring `level`.
    pub fn ids_with_level(&self, level: AccessLevel) -> BTreeSet<String> {
        self.enabled()
            .filter(|ws| ws.declares(level))
            .map(|ws| ws.id.clone())
            .collect()
    }

    pub fn is_licenced(&self, id: &str) -> bool {
        self.webservices.get(id).is_some_and(|ws| ws.is_licenced)
    }
}

#[derive(Clone, Default)]
pub struct WebserviceRegistry {
    current: Arc<RwLock<Arc<RegistrySnapshot>>>,
}

impl WebserviceRegistry {
    pub fn from_configs(configs: Vec<WebserviceConfig>) -> Result<Self, AuthzError> {
        let snapshot = RegistrySnapshot::build(configs)?;
        Ok(Self {
            current: Arc::new(RwLock::new(Arc::new(snapshot))),
        })
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, AuthzError> {
        Self::from_configs(read_registry_file(path.as_ref())?)
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        // The guarded value is only ever swapped whole, so a poisoned lock
        // still holds a consistent snapshot.
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Validate `configs` and swap them in. On error the current snapshot is
    /// left untouched.
    pub fn replace(&self, configs: Vec<WebserviceConfig>) -> Result<usize, AuthzError> {
        let snapshot = Arc::new(RegistrySnapshot::build(configs)?);
        let count = snapshot.len();
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = snapshot;
        Ok(count)
    }

    pub fn reload_from_file(&self, path: impl AsRef<Path>) -> Result<usize, AuthzError> {
        let count = self.replace(read_registry_file(path.as_ref())?)?;
        tracing::info!(path = %path.as_ref().display(), webservices = count, "Webservice registry reloaded");
        Ok(count)
    }
}

fn read_registry_file(path: &Path) -> Result<Vec<WebserviceConfig>, AuthzError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AuthzError::Internal(anyhow::anyhow!(
            "Failed to read webservice registry from {}: {}",
            path.display(),
            e
        ))
    })?;

    let file: RegistryFile = serde_json::from_str(&raw).map_err(|e| {
        AuthzError::Internal(anyhow::anyhow!(
            "Failed to parse webservice registry {}: {}",
            path.display(),
            e
        ))
    })?;

    Ok(file.webservices)
}
