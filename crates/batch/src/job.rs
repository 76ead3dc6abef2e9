//! Jobs and job parameter validation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{BatchError, BatchResult};
use crate::parameters::JobParameters;
use crate::step::Step;

/// Checks job parameters before a job starts.
#[async_trait]
pub trait JobParametersValidator: Send + Sync {
    /// Returns `BatchError::InvalidJobParameters` listing every violation.
    async fn validate(&self, parameters: &JobParameters) -> BatchResult<()>;
}

/// Runs several validators and merges their violations.
#[derive(Default, Clone)]
pub struct CompositeJobParametersValidator {
    validators: Vec<Arc<dyn JobParametersValidator>>,
}

impl CompositeJobParametersValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, validator: Arc<dyn JobParametersValidator>) {
        self.validators.push(validator);
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

#[async_trait]
impl JobParametersValidator for CompositeJobParametersValidator {
    async fn validate(&self, parameters: &JobParameters) -> BatchResult<()> {
        let mut messages = Vec::new();
        for validator in &self.validators {
            match validator.validate(parameters).await {
                Ok(()) => {}
                Err(BatchError::InvalidJobParameters { messages: found }) => {
                    messages.extend(found)
                }
                Err(other) => return Err(other),
            }
        }
        if messages.is_empty() {
            Ok(())
        } else {
            Err(BatchError::InvalidJobParameters { messages })
        }
    }
}

/// Requires a fixed set of keys to be present.
#[derive(Debug, Clone, Default)]
pub struct RequiredKeysValidator {
    keys: Vec<String>,
}

impl RequiredKeysValidator {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl JobParametersValidator for RequiredKeysValidator {
    async fn validate(&self, parameters: &JobParameters) -> BatchResult<()> {
        let messages: Vec<String> = self
            .keys
            .iter()
            .filter(|k| !parameters.contains(k))
            .map(|k| format!("The parameter {} is required", k))
            .collect();
        if messages.is_empty() {
            Ok(())
        } else {
            Err(BatchError::InvalidJobParameters { messages })
        }
    }
}

/// A named, ordered list of steps with parameter validation.
pub struct Job {
    name: String,
    validator: CompositeJobParametersValidator,
    steps: Vec<Arc<dyn Step>>,
}

impl Job {
    pub fn builder(name: impl Into<String>) -> JobBuilder {
        JobBuilder {
            name: name.into(),
            validator: CompositeJobParametersValidator::new(),
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Arc<dyn Step>] {
        &self.steps
    }

    /// Step names in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn validator_count(&self) -> usize {
        self.validator.len()
    }

    /// Runs every registered validator against `parameters`.
    pub async fn validate(&self, parameters: &JobParameters) -> BatchResult<()> {
        self.validator.validate(parameters).await
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("steps", &self.step_names())
            .field("validators", &self.validator.len())
            .finish()
    }
}

/// Builder for [`Job`].
pub struct JobBuilder {
    name: String,
    validator: CompositeJobParametersValidator,
    steps: Vec<Arc<dyn Step>>,
}

impl JobBuilder {
    /// Adds a parameter validator. Every validator added runs.
    pub fn validator(mut self, validator: Arc<dyn JobParametersValidator>) -> Self {
        self.validator.push(validator);
        self
    }

    /// Sets the first step.
    pub fn start(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.insert(0, step);
        self
    }

    /// Appends a step.
    pub fn next(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn build(self) -> BatchResult<Job> {
        if self.steps.is_empty() {
            return Err(BatchError::NoSteps { job: self.name });
        }
        Ok(Job {
            name: self.name,
            validator: self.validator,
            steps: self.steps,
        })
    }
}
