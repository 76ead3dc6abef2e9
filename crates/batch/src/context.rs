//! Execution contexts and the job scope shared by the steps of one run.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{BatchError, BatchResult};
use crate::execution::BatchStatus;
use crate::parameters::JobParameters;

/// Key/value state attached to a job or step execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    values: BTreeMap<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn put_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.put(key, Value::String(value.into()));
    }

    pub fn put_long(&mut self, key: impl Into<String>, value: i64) {
        self.put(key, Value::from(value));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn get_long(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }

    /// Like [`get_string`](Self::get_string) but fails with `MissingParameter`.
    pub fn require_string(&self, key: &str) -> BatchResult<&str> {
        self.get_string(key).ok_or_else(|| BatchError::MissingParameter {
            name: key.to_string(),
        })
    }

    /// Like [`get_long`](Self::get_long) but fails with `MissingParameter`.
    pub fn require_long(&self, key: &str) -> BatchResult<i64> {
        self.get_long(key).ok_or_else(|| BatchError::MissingParameter {
            name: key.to_string(),
        })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

struct ScopeState {
    job_name: String,
    execution_id: Uuid,
    parameters: JobParameters,
    context: RwLock<ExecutionContext>,
    status: RwLock<BatchStatus>,
}

/// Handle to the running job, passed to every step of one job execution.
///
/// Steps use it to read job parameters and to share values through the job
/// execution context. Cloning is cheap; all clones see the same state.
#[derive(Clone)]
pub struct JobScope {
    state: Arc<ScopeState>,
}

impl JobScope {
    /// Creates a scope for a new execution of `job_name`.
    pub fn new(job_name: impl Into<String>, parameters: JobParameters) -> Self {
        Self {
            state: Arc::new(ScopeState {
                job_name: job_name.into(),
                execution_id: Uuid::new_v4(),
                parameters,
                context: RwLock::new(ExecutionContext::new()),
                status: RwLock::new(BatchStatus::Starting),
            }),
        }
    }

    pub fn job_name(&self) -> &str {
        &self.state.job_name
    }

    pub fn execution_id(&self) -> Uuid {
        self.state.execution_id
    }

    pub fn parameters(&self) -> &JobParameters {
        &self.state.parameters
    }

    /// Snapshot of the job execution context.
    pub fn context(&self) -> ExecutionContext {
        self.state.context.read().clone()
    }

    /// Reads a string from the job execution context.
    pub fn context_string(&self, key: &str) -> Option<String> {
        self.state.context.read().get_string(key).map(str::to_string)
    }

    pub fn put_context(&self, key: impl Into<String>, value: Value) {
        self.state.context.write().put(key, value);
    }

    /// Current status of the job execution.
    pub fn status(&self) -> BatchStatus {
        *self.state.status.read()
    }

    /// Sets the job execution status. The launcher drives this; steps
    /// normally only read it.
    pub fn set_status(&self, status: BatchStatus) {
        *self.state.status.write() = status;
    }
}

impl std::fmt::Debug for JobScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobScope")
            .field("job_name", &self.state.job_name)
            .field("execution_id", &self.state.execution_id)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_accessors() {
        let mut ctx = ExecutionContext::new();
        ctx.put_string("resourceType", "Patient");
        ctx.put_long("bulkExportCollectionEntityId", 7);

        assert_eq!(ctx.get_string("resourceType"), Some("Patient"));
        assert_eq!(ctx.require_long("bulkExportCollectionEntityId").unwrap(), 7);
        assert_eq!(ctx.get_long("resourceType"), None);
        assert!(matches!(
            ctx.require_string("jobUUID"),
            Err(BatchError::MissingParameter { .. })
        ));
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn test_scope_clones_share_state() {
        let scope = JobScope::new("job", JobParameters::new());
        let other = scope.clone();

        other.put_context("jobUUID", Value::from("abc"));
        other.set_status(BatchStatus::Started);

        assert_eq!(scope.context_string("jobUUID").as_deref(), Some("abc"));
        assert_eq!(scope.status(), BatchStatus::Started);
        assert_eq!(scope.execution_id(), other.execution_id());
    }
}
