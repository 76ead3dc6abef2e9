//! In-memory SearchParameter registry.
//!
//! Definitions are held by canonical URL and by `(base type, code)`. Parameters
//! whose base is `Resource` apply to every type unless the type defines its
//! own parameter with the same code.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::SearchParamType;

use super::errors::{LoaderError, RegistryError};
use super::loader::SearchParameterLoader;

const COMMON_BASE: &str = "Resource";

/// Publication status of a SearchParameter. Only active ones are indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchParameterStatus {
    /// Usable in searches.
    #[default]
    Active,
    /// Not yet in use.
    Draft,
    /// Withdrawn.
    Retired,
}

impl SearchParameterStatus {
    /// Parses a FHIR `status` code, ignoring case.
    pub fn from_fhir_status(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "draft" => Some(Self::Draft),
            "retired" => Some(Self::Retired),
            _ => None,
        }
    }

    /// Returns true if the parameter may be indexed and searched.
    pub fn is_usable(&self) -> bool {
        *self == Self::Active
    }
}

/// Where a definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchParameterSource {
    /// Bundled with the crate.
    #[default]
    Embedded,
    /// Parsed from a SearchParameter resource at runtime.
    Stored,
}

/// A SearchParameter reduced to what indexing and search need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParameterDefinition {
    /// Canonical URL.
    pub url: String,
    /// Name used in queries, e.g. `patient`.
    pub code: String,
    /// Value type of the parameter.
    pub param_type: SearchParamType,
    /// Path expression values are extracted from.
    pub expression: String,
    /// Resource types the parameter is defined on.
    pub base: Vec<String>,
    /// Allowed target types for reference parameters.
    pub target: Option<Vec<String>>,
    /// Publication status.
    pub status: SearchParameterStatus,
    /// Where the definition was loaded from.
    pub source: SearchParameterSource,
}

impl SearchParameterDefinition {
    /// An active, embedded definition with no base types.
    pub fn new(
        url: impl Into<String>,
        code: impl Into<String>,
        param_type: SearchParamType,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            code: code.into(),
            param_type,
            expression: expression.into(),
            base: Vec::new(),
            target: None,
            status: SearchParameterStatus::Active,
            source: SearchParameterSource::Embedded,
        }
    }

    /// Sets the base resource types.
    pub fn with_base<I, S>(mut self, base: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base = base.into_iter().map(Into::into).collect();
        self
    }

    /// Returns whether this parameter is defined on `resource_type`, directly
    /// or through `Resource`/`DomainResource`.
    pub fn applies_to(&self, resource_type: &str) -> bool {
        self.base
            .iter()
            .any(|b| b == resource_type || b == COMMON_BASE || b == "DomainResource")
    }
}

/// Registry of SearchParameter definitions shared by the extractor and the
/// query builder.
#[derive(Default)]
pub struct SearchParameterRegistry {
    by_type: HashMap<String, HashMap<String, Arc<SearchParameterDefinition>>>,
    by_url: HashMap<String, Arc<SearchParameterDefinition>>,
}

impl SearchParameterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered definitions.
    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }

    /// Registers the loader's embedded definitions. URLs that are already
    /// registered keep their existing definition. Returns how many were added.
    pub fn load_all(&mut self, loader: &SearchParameterLoader) -> Result<usize, LoaderError> {
        let mut added = 0;
        for param in loader.load_embedded()? {
            match self.register(param) {
                Ok(()) => added += 1,
                Err(RegistryError::DuplicateUrl { url }) => {
                    tracing::trace!(url = %url, "Skipping duplicate search parameter");
                }
            }
        }

        tracing::debug!(count = added, version = loader.version().as_str(), "Loaded search parameters");
        Ok(added)
    }

    /// Active parameters for `resource_type`, including common ones it does
    /// not override.
    pub fn get_active_params(&self, resource_type: &str) -> Vec<Arc<SearchParameterDefinition>> {
        let own = self.by_type.get(resource_type);
        let common = self
            .by_type
            .get(COMMON_BASE)
            .into_iter()
            .flat_map(|params| params.values())
            .filter(|p| own.is_none_or(|own| !own.contains_key(&p.code)));

        own.into_iter()
            .flat_map(|params| params.values())
            .chain(common)
            .filter(|p| p.status.is_usable())
            .cloned()
            .collect()
    }

    /// Looks up `code` on `resource_type`, then on `Resource`.
    pub fn get_param(&self, resource_type: &str, code: &str) -> Option<Arc<SearchParameterDefinition>> {
        [resource_type, COMMON_BASE]
            .iter()
            .find_map(|base| self.by_type.get(*base)?.get(code))
            .cloned()
    }

    /// Adds a definition under each of its base types.
    ///
    /// # Errors
    ///
    /// Fails if a definition with the same URL is already registered.
    pub fn register(&mut self, param: SearchParameterDefinition) -> Result<(), RegistryError> {
        if self.by_url.contains_key(&param.url) {
            return Err(RegistryError::DuplicateUrl { url: param.url });
        }

        let param = Arc::new(param);
        for base in &param.base {
            self.by_type
                .entry(base.clone())
                .or_default()
                .insert(param.code.clone(), Arc::clone(&param));
        }
        self.by_url.insert(param.url.clone(), param);
        Ok(())
    }
}

impl std::fmt::Debug for SearchParameterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchParameterRegistry")
            .field("params", &self.by_url.len())
            .field("types", &self.by_type.len())
            .finish()
    }
}
