//! Static webservice configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::access_level::{AccessLevel, PublicType};

/// Static configuration of one webservice, consumed read-only by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebserviceConfig {
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub public_type: Option<PublicType>,
    #[serde(default)]
    pub access_levels: BTreeSet<AccessLevel>,
    #[serde(default = "default_true")]
    pub is_licenced: bool,
    #[serde(default)]
    pub app_name: Option<String>,
}

fn default_true() -> bool {
    true
}

impl WebserviceConfig {
    /// A private webservice requiring the given levels. Licensing is off.
    pub fn new(id: impl Into<String>, access_levels: impl IntoIterator<Item = AccessLevel>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            public_type: None,
            access_levels: access_levels.into_iter().collect(),
            is_licenced: false,
            app_name: None,
        }
    }

    pub fn public(id: impl Into<String>, public_type: PublicType) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            public_type: Some(public_type),
            access_levels: BTreeSet::new(),
            is_licenced: false,
            app_name: None,
        }
    }

    pub fn licenced(mut self) -> Self {
        self.is_licenced = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn is_public(&self) -> bool {
        self.public_type.is_some()
    }

    pub fn declares(&self, level: AccessLevel) -> bool {
        self.access_levels.contains(&level)
    }

    /// Reject impossible combinations. Called at load time only.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("webservice id must not be empty".to_string());
        }

        if self.is_public() {
            if !self.access_levels.is_empty() {
                return Err("a public webservice cannot be configured with any access level".to_string());
            }
            if self.is_licenced {
                return Err("a public webservice cannot be licenced".to_string());
            }
        }

        if self.declares(AccessLevel::Connected) && self.access_levels.len() > 1 {
            return Err(
                "connected access level cannot be associated with another access level".to_string(),
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_with_access_level_is_rejected() {
        let mut ws = WebserviceConfig::public("login", PublicType::Disconnected);
        ws.access_levels.insert(AccessLevel::Owner);
        let err = ws.validate().unwrap_err();
        assert!(err.contains("public webservice"));
    }

    #[test]
    fn test_public_licenced_is_rejected() {
        let ws = WebserviceConfig::public("catalog", PublicType::NoLimitation).licenced();
        assert_eq!(ws.validate().unwrap_err(), "a public webservice cannot be licenced");
    }

    #[test]
    fn test_connected_must_stand_alone() {
        let ws = WebserviceConfig::new("me", [AccessLevel::Connected, AccessLevel::Role]);
        assert!(ws.validate().is_err());
        assert!(WebserviceConfig::new("me", [AccessLevel::Connected]).validate().is_ok());
    }

    #[test]
    fn test_defaults_when_deserializing() {
        let ws: WebserviceConfig =
            serde_json::from_str(r#"{"id":"list_clients","access_levels":["ROLE","ORGANIZATION_ROLE"]}"#)
                .unwrap();
        assert!(ws.enabled);
        assert!(ws.is_licenced);
        assert!(ws.declares(AccessLevel::OrganizationRole));
        assert!(ws.validate().is_ok());
    }
}
