//! Search provider trait.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::types::{ResourcePid, SearchQuery, SearchResult};

use super::storage::ResourceStorage;

/// Basic search provider for single resource type queries.
///
/// Supports token, reference and string parameters drawn from the search
/// parameter registry. Parameters are ANDed, the values of one parameter
/// are ORed. Results are ordered by pid.
///
/// # Example
///
/// ```ignore
/// use helios_persistence::core::SearchProvider;
/// use helios_persistence::types::{SearchQuery, SearchValue};
///
/// async fn find_person<S: SearchProvider>(storage: &S) -> Result<(), StorageError> {
///     let query = SearchQuery::new("Person")
///         .with_value("identifier", SearchValue::token("http://example.org/eid", "E-1"))
///         .load_synchronous();
///
///     let result = storage.search(&query).await?;
///     for resource in &result.resources {
///         println!("Found: {}", resource.url());
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SearchProvider: ResourceStorage {
    /// Executes a search and loads the matching resources.
    ///
    /// # Errors
    ///
    /// * `StorageError::Search(UnknownParameter)` - If a parameter is not registered for the type
    /// * `StorageError::Search(ValueTypeMismatch)` - If a value does not fit the parameter type
    async fn search(&self, query: &SearchQuery) -> StorageResult<SearchResult>;

    /// Executes a search and returns only the matching pids.
    async fn search_pids(&self, query: &SearchQuery) -> StorageResult<Vec<ResourcePid>>;
}
