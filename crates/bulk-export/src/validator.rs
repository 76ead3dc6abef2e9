//! Job parameter validators.

use std::sync::Arc;

use async_trait::async_trait;
use helios_batch::{BatchError, BatchResult, JobParameters, JobParametersValidator};
use helios_persistence::core::{BulkExportJobStore, NDJSON_FORMAT};

use crate::config::{
    GROUP_ID_PARAMETER, JOB_UUID_PARAMETER, OUTPUT_FORMAT_PARAMETER, READ_CHUNK_PARAMETER,
    RESOURCE_TYPES_PARAMETER, SINCE_PARAMETER,
};

/// Splits the `resourceTypes` parameter.
pub fn parse_resource_types(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validates the parameters every export job takes.
pub struct BulkExportJobParameterValidator {
    jobs: Arc<dyn BulkExportJobStore>,
}

impl BulkExportJobParameterValidator {
    pub fn new(jobs: Arc<dyn BulkExportJobStore>) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl JobParametersValidator for BulkExportJobParameterValidator {
    async fn validate(&self, parameters: &JobParameters) -> BatchResult<()> {
        let mut messages = Vec::new();

        match parameters.get_long(READ_CHUNK_PARAMETER) {
            Some(size) if size >= 1 => {}
            _ => messages.push(format!(
                "There must be a valid number for {}, which is at least 1.",
                READ_CHUNK_PARAMETER
            )),
        }

        let has_existing_job = match parameters.get_string(JOB_UUID_PARAMETER) {
            Some(job_uuid) => {
                let job = self.jobs.get_job(&job_uuid).await.map_err(|e| {
                    BatchError::invalid_parameters(format!("Unable to load job {}: {}", job_uuid, e))
                })?;
                if job.is_none() {
                    messages.push(format!(
                        "There is no persisted job that exists with UUID: {}.",
                        job_uuid
                    ));
                }
                job.is_some()
            }
            None => false,
        };

        if !has_existing_job {
            let types = parameters
                .get_string(RESOURCE_TYPES_PARAMETER)
                .map(|types| parse_resource_types(&types))
                .unwrap_or_default();
            if types.is_empty() {
                messages.push(format!(
                    "You must include [{}] as a Job Parameter",
                    RESOURCE_TYPES_PARAMETER
                ));
            }
            if types.iter().any(|t| t == "Binary") {
                messages.push("Bulk export of Binary resources is forbidden".to_string());
            }

            if let Some(format) = parameters.get_string(OUTPUT_FORMAT_PARAMETER)
                && format != NDJSON_FORMAT
            {
                messages.push(format!(
                    "The only allowed format for Bulk Export is currently {}",
                    NDJSON_FORMAT
                ));
            }
        }

        if let Some(since) = parameters.get_string(SINCE_PARAMETER)
            && parameters.get_date(SINCE_PARAMETER).is_none()
        {
            messages.push(format!(
                "The {} parameter must be an RFC 3339 instant, but was: {}",
                SINCE_PARAMETER, since
            ));
        }

        if messages.is_empty() {
            Ok(())
        } else {
            Err(BatchError::InvalidJobParameters { messages })
        }
    }
}

/// Requires a non-blank `groupId`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GroupIdPresentValidator;

#[async_trait]
impl JobParametersValidator for GroupIdPresentValidator {
    async fn validate(&self, parameters: &JobParameters) -> BatchResult<()> {
        match parameters.get_string(GROUP_ID_PARAMETER) {
            Some(group_id) if !group_id.trim().is_empty() => Ok(()),
            _ => Err(BatchError::invalid_parameters(format!(
                "Group Bulk Export jobs must have a {} attribute",
                GROUP_ID_PARAMETER
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helios_persistence::backends::sqlite::SqliteBackend;
    use helios_persistence::core::ExportRequest;

    fn backend() -> Arc<SqliteBackend> {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().unwrap();
        Arc::new(backend)
    }

    fn messages(result: BatchResult<()>) -> Vec<String> {
        result.unwrap_err().validation_messages().unwrap().to_vec()
    }

    #[test]
    fn test_parse_resource_types() {
        assert_eq!(
            parse_resource_types(" Patient, Observation,,"),
            vec!["Patient", "Observation"]
        );
    }

    #[tokio::test]
    async fn test_valid_new_job_parameters() {
        let validator = BulkExportJobParameterValidator::new(backend());
        let params = JobParameters::new()
            .with_long(READ_CHUNK_PARAMETER, 10)
            .with_string(RESOURCE_TYPES_PARAMETER, "Patient,Observation")
            .with_string(OUTPUT_FORMAT_PARAMETER, NDJSON_FORMAT);
        assert!(validator.validate(&params).await.is_ok());
    }

    #[tokio::test]
    async fn test_all_violations_reported() {
        let validator = BulkExportJobParameterValidator::new(backend());
        let params = JobParameters::new()
            .with_long(READ_CHUNK_PARAMETER, 0)
            .with_string(RESOURCE_TYPES_PARAMETER, "Patient,Binary")
            .with_string(OUTPUT_FORMAT_PARAMETER, "text/csv");

        let messages = self::messages(validator.validate(&params).await);
        assert_eq!(messages.len(), 3);
        assert!(messages[0].contains("readChunkSize"));
        assert!(messages[1].contains("Binary"));
        assert!(messages[2].contains("application/fhir+ndjson"));
    }

    #[tokio::test]
    async fn test_missing_resource_types() {
        let validator = BulkExportJobParameterValidator::new(backend());
        let params = JobParameters::new().with_long(READ_CHUNK_PARAMETER, 5);

        let messages = self::messages(validator.validate(&params).await);
        assert_eq!(
            messages,
            vec!["You must include [resourceTypes] as a Job Parameter".to_string()]
        );
    }

    #[tokio::test]
    async fn test_job_uuid_must_exist() {
        let backend = backend();
        let validator = BulkExportJobParameterValidator::new(backend.clone());

        let params = JobParameters::new()
            .with_long(READ_CHUNK_PARAMETER, 5)
            .with_string(JOB_UUID_PARAMETER, "no-such-job")
            .with_string(RESOURCE_TYPES_PARAMETER, "Binary");
        let messages = self::messages(validator.validate(&params).await);
        assert_eq!(
            messages,
            vec![
                "There is no persisted job that exists with UUID: no-such-job.".to_string(),
                "Bulk export of Binary resources is forbidden".to_string(),
            ]
        );

        let params = JobParameters::new()
            .with_long(READ_CHUNK_PARAMETER, 5)
            .with_string(JOB_UUID_PARAMETER, "no-such-job");
        let messages = self::messages(validator.validate(&params).await);
        assert_eq!(messages.len(), 2);
        assert!(messages[1].contains("[resourceTypes]"));

        let job = backend
            .create_job(&ExportRequest::system().with_types(["Patient"]))
            .await
            .unwrap();
        let params = JobParameters::new()
            .with_long(READ_CHUNK_PARAMETER, 5)
            .with_string(JOB_UUID_PARAMETER, job.job_id);
        assert!(validator.validate(&params).await.is_ok());
    }

    #[tokio::test]
    async fn test_since_must_be_an_instant() {
        let validator = BulkExportJobParameterValidator::new(backend());
        let params = JobParameters::new()
            .with_long(READ_CHUNK_PARAMETER, 10)
            .with_string(RESOURCE_TYPES_PARAMETER, "Patient")
            .with_string(SINCE_PARAMETER, "yesterday");

        let messages = self::messages(validator.validate(&params).await);
        assert_eq!(
            messages,
            vec!["The since parameter must be an RFC 3339 instant, but was: yesterday".to_string()]
        );

        let params = JobParameters::new()
            .with_long(READ_CHUNK_PARAMETER, 10)
            .with_string(RESOURCE_TYPES_PARAMETER, "Patient")
            .with_string(SINCE_PARAMETER, "2024-01-01T00:00:00Z");
        assert!(validator.validate(&params).await.is_ok());
    }

    #[tokio::test]
    async fn test_group_id_present() {
        let validator = GroupIdPresentValidator;
        assert!(
            validator
                .validate(&JobParameters::new().with_string(GROUP_ID_PARAMETER, "grp-1"))
                .await
                .is_ok()
        );

        let messages = self::messages(
            validator
                .validate(&JobParameters::new().with_string(GROUP_ID_PARAMETER, " "))
                .await,
        );
        assert_eq!(
            messages,
            vec!["Group Bulk Export jobs must have a groupId attribute".to_string()]
        );
    }
}
