//! MDM settings and matching rules.
//!
//! Settings are read from a JSON rules file:
//!
//! ```json
//! {
//!   "enabled": true,
//!   "rules": {
//!     "enterpriseEIDSystem": "http://example.org/enterprise-id",
//!     "mdmTypes": ["Patient", "Practitioner"]
//!   }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MdmError, MdmResult};

fn default_enabled() -> bool {
    true
}

fn default_mdm_types() -> Vec<String> {
    vec!["Patient".to_string(), "Practitioner".to_string()]
}

/// Matching rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MdmRules {
    /// Identifier system of enterprise ids assigned to Person resources.
    #[serde(rename = "enterpriseEIDSystem")]
    pub enterprise_eid_system: String,

    /// Resource types linked to Persons.
    #[serde(default = "default_mdm_types")]
    pub mdm_types: Vec<String>,
}

/// Top-level MDM configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MdmSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub rules: MdmRules,
}

impl MdmSettings {
    /// Creates enabled settings with the given EID system and default types.
    pub fn new(enterprise_eid_system: impl Into<String>) -> Self {
        Self {
            enabled: true,
            rules: MdmRules {
                enterprise_eid_system: enterprise_eid_system.into(),
                mdm_types: default_mdm_types(),
            },
        }
    }

    /// Parses and validates settings from JSON text.
    pub fn from_json_str(json: &str) -> MdmResult<Self> {
        let settings: MdmSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a rules file.
    pub fn from_file(path: impl AsRef<Path>) -> MdmResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json_str(&json)?;
        tracing::info!(
            path = %path.display(),
            eid_system = %settings.rules.enterprise_eid_system,
            "Loaded MDM rules"
        );
        Ok(settings)
    }

    pub fn enterprise_eid_system(&self) -> &str {
        &self.rules.enterprise_eid_system
    }

    /// Returns true if resources of this type take part in MDM.
    pub fn is_mdm_type(&self, resource_type: &str) -> bool {
        self.rules.mdm_types.iter().any(|t| t == resource_type)
    }

    fn validate(&self) -> MdmResult<()> {
        if self.rules.enterprise_eid_system.trim().is_empty() {
            return Err(MdmError::InvalidSettings {
                message: "enterpriseEIDSystem must not be blank".to_string(),
            });
        }
        Ok(())
    }
}
