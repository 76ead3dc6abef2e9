//! SearchProvider implementation for SQLite.
//!
//! Queries are translated into one `EXISTS` sub-select per parameter against
//! the `search_index` table. Values of one parameter are ORed inside the
//! sub-select; parameters are ANDed.

use async_trait::async_trait;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;

use crate::core::{ResourceStorage, SearchProvider};
use crate::error::{SearchError, StorageResult};
use crate::search::converters::parse_reference;
use crate::types::{ResourcePid, SearchParamType, SearchQuery, SearchResult, SearchValue};

use super::SqliteBackend;
use super::storage::internal_error;

/// Accumulates SQL text and bound values.
struct QueryBuilder {
    sql: String,
    bind: Vec<SqlValue>,
}

impl QueryBuilder {
    fn new(resource_type: &str) -> Self {
        Self {
            sql: "SELECT r.pid FROM resources r WHERE r.resource_type = ? AND r.is_deleted = 0"
                .to_string(),
            bind: vec![SqlValue::Text(resource_type.to_string())],
        }
    }

    fn push_text(&mut self, value: impl Into<String>) {
        self.bind.push(SqlValue::Text(value.into()));
    }

    /// Renders one value as a condition on the `si` alias.
    fn value_condition(&mut self, value: &SearchValue, param_type: SearchParamType) -> String {
        match value {
            SearchValue::Token {
                system: Some(system),
                code,
            } => {
                self.push_text(system.as_str());
                self.push_text(code.as_str());
                "(si.value_token_system = ? AND si.value_token_code = ?)".to_string()
            }
            SearchValue::Token { system: None, code } => {
                self.push_text(code.as_str());
                "(si.value_token_code = ?)".to_string()
            }
            SearchValue::Reference { reference } => match parse_reference(reference) {
                (Some(rt), Some(id)) => {
                    self.push_text(rt);
                    self.push_text(id);
                    "(si.value_reference_type = ? AND si.value_reference_id = ?)".to_string()
                }
                _ => {
                    // A bare id matches the id part of any reference.
                    self.push_text(reference.as_str());
                    self.push_text(reference.as_str());
                    "(si.value_reference_id = ? OR si.value_reference = ?)".to_string()
                }
            },
            SearchValue::String { value } if param_type == SearchParamType::Uri => {
                self.push_text(value.as_str());
                "(si.value_uri = ?)".to_string()
            }
            SearchValue::String { value } => {
                let escaped = value
                    .to_lowercase()
                    .replace('\\', "\\\\")
                    .replace('%', "\\%")
                    .replace('_', "\\_");
                self.push_text(format!("{}%", escaped));
                "(si.value_string LIKE ? ESCAPE '\\')".to_string()
            }
        }
    }
}

impl SqliteBackend {
    /// Validates the query against the registry and builds the pid query.
    fn build_search_sql(&self, query: &SearchQuery) -> StorageResult<QueryBuilder> {
        let mut builder = QueryBuilder::new(&query.resource_type);

        for param in &query.parameters {
            let definition = self
                .search_registry()
                .read()
                .get_param(&query.resource_type, &param.name)
                .ok_or_else(|| SearchError::UnknownParameter {
                    resource_type: query.resource_type.clone(),
                    name: param.name.clone(),
                })?;

            if let Some(bad) = param
                .values
                .iter()
                .find(|v| !v.is_valid_for(definition.param_type))
            {
                tracing::debug!(param = %param.name, value = ?bad, "Rejected search value");
                return Err(SearchError::ValueTypeMismatch {
                    name: param.name.clone(),
                    param_type: definition.param_type.to_string(),
                }
                .into());
            }

            if param.values.is_empty() {
                continue;
            }

            builder.push_text(param.name.as_str());
            let conditions: Vec<String> = param
                .values
                .iter()
                .map(|v| builder.value_condition(v, definition.param_type))
                .collect();

            builder.sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM search_index si WHERE si.pid = r.pid AND si.param_name = ? AND ({}))",
                conditions.join(" OR ")
            ));
        }

        builder.sql.push_str(" ORDER BY r.pid");
        if let Some(count) = query.count {
            builder.sql.push_str(" LIMIT ?");
            builder.bind.push(SqlValue::Integer(count as i64));
        }

        Ok(builder)
    }
}

#[async_trait]
impl SearchProvider for SqliteBackend {
    async fn search(&self, query: &SearchQuery) -> StorageResult<SearchResult> {
        let pids = self.search_pids(query).await?;
        let resources = self.read_by_pids(&query.resource_type, &pids).await?;

        tracing::debug!(
            resource_type = %query.resource_type,
            synchronous = query.synchronous,
            matches = resources.len(),
            "Search completed"
        );

        Ok(SearchResult { resources })
    }

    async fn search_pids(&self, query: &SearchQuery) -> StorageResult<Vec<ResourcePid>> {
        let builder = self.build_search_sql(query)?;
        let conn = self.get_connection()?;

        let mut stmt = conn
            .prepare(&builder.sql)
            .map_err(|e| internal_error(format!("Failed to prepare search: {}", e)))?;
        let rows = stmt
            .query_map(params_from_iter(builder.bind), |row| row.get::<_, i64>(0))
            .map_err(|e| internal_error(format!("Failed to execute search: {}", e)))?;

        let pids = rows
            .map(|row| {
                row.map(ResourcePid::new)
                    .map_err(|e| internal_error(format!("Failed to read search row: {}", e)))
            })
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(pids)
    }
}
