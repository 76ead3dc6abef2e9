//! Readers producing pages of resource pids for one partition.
//!
//! Every reader loads the job entity on its first call to learn the `since`
//! filter (and, for groups, the group id and MDM flag), then pages through
//! pids in ascending order, `readChunkSize` at a time.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use helios_batch::{BatchError, BatchResult, ExecutionContext, ItemReader, JobScope};
use helios_mdm::MdmLinkExpansionSvc;
use helios_persistence::core::{
    BulkExportJob, BulkExportJobStore, ExportPidProvider, FhirStore, PatientScope,
};
use helios_persistence::error::BulkExportError;
use helios_persistence::search::converters::parse_reference;
use helios_persistence::types::ResourcePid;
use serde_json::Value;

use crate::config::{JOB_UUID_PARAMETER, READ_CHUNK_PARAMETER, RESOURCE_TYPE_KEY};

/// A page of pids of one resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidPage {
    pub resource_type: String,
    pub pids: Vec<ResourcePid>,
}

/// Which pids a pager lists.
#[derive(Debug, Clone)]
enum PidSource {
    AllOfType,
    Compartment(PatientScope),
}

/// Keyset pager shared by the three readers.
struct PidPager {
    pids: Arc<dyn ExportPidProvider>,
    resource_type: String,
    since: Option<DateTime<Utc>>,
    page_size: u32,
    source: PidSource,
    after: Option<ResourcePid>,
    exhausted: bool,
}

impl PidPager {
    async fn next_page(&mut self) -> BatchResult<Option<PidPage>> {
        if self.exhausted {
            return Ok(None);
        }

        let page = match &self.source {
            PidSource::AllOfType => {
                self.pids
                    .list_resource_pids(&self.resource_type, self.since, self.after, self.page_size)
                    .await
            }
            PidSource::Compartment(scope) => {
                self.pids
                    .list_compartment_pids(
                        &self.resource_type,
                        scope,
                        self.since,
                        self.after,
                        self.page_size,
                    )
                    .await
            }
        }
        .map_err(BatchError::read)?;

        if (page.len() as u32) < self.page_size {
            self.exhausted = true;
        }
        match page.last() {
            Some(last) => {
                self.after = Some(*last);
                Ok(Some(PidPage {
                    resource_type: self.resource_type.clone(),
                    pids: page,
                }))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }
}

/// Values every reader takes from the job scope and partition context.
struct ReaderSetup {
    jobs: Arc<dyn BulkExportJobStore>,
    pids: Arc<dyn ExportPidProvider>,
    job_uuid: String,
    resource_type: String,
    page_size: u32,
}

impl ReaderSetup {
    fn from_scope(
        jobs: &Arc<dyn BulkExportJobStore>,
        pids: &Arc<dyn ExportPidProvider>,
        scope: &JobScope,
        context: &ExecutionContext,
    ) -> BatchResult<Self> {
        let page_size = scope
            .parameters()
            .get_long(READ_CHUNK_PARAMETER)
            .filter(|size| *size >= 1)
            .ok_or_else(|| BatchError::MissingParameter {
                name: READ_CHUNK_PARAMETER.to_string(),
            })?;

        Ok(Self {
            jobs: Arc::clone(jobs),
            pids: Arc::clone(pids),
            job_uuid: context.require_string(JOB_UUID_PARAMETER)?.to_string(),
            resource_type: context.require_string(RESOURCE_TYPE_KEY)?.to_string(),
            page_size: u32::try_from(page_size).unwrap_or(u32::MAX),
        })
    }

    async fn load_job(&self) -> BatchResult<BulkExportJob> {
        self.jobs
            .get_job(&self.job_uuid)
            .await
            .map_err(BatchError::read)?
            .ok_or_else(|| {
                BatchError::read(BulkExportError::JobNotFound {
                    job_id: self.job_uuid.clone(),
                })
            })
    }

    fn pager(&self, since: Option<DateTime<Utc>>, source: PidSource) -> PidPager {
        PidPager {
            pids: Arc::clone(&self.pids),
            resource_type: self.resource_type.clone(),
            since,
            page_size: self.page_size,
            source,
            after: None,
            exhausted: false,
        }
    }
}

/// Reads every resource of the partition's type.
pub struct BulkItemReader {
    setup: ReaderSetup,
    pager: Option<PidPager>,
}

impl BulkItemReader {
    pub fn new(
        jobs: &Arc<dyn BulkExportJobStore>,
        pids: &Arc<dyn ExportPidProvider>,
        scope: &JobScope,
        context: &ExecutionContext,
    ) -> BatchResult<Self> {
        Ok(Self {
            setup: ReaderSetup::from_scope(jobs, pids, scope, context)?,
            pager: None,
        })
    }
}

#[async_trait]
impl ItemReader<PidPage> for BulkItemReader {
    async fn read(&mut self) -> BatchResult<Option<PidPage>> {
        if self.pager.is_none() {
            let job = self.setup.load_job().await?;
            self.pager = Some(self.setup.pager(job.request.since, PidSource::AllOfType));
        }
        match self.pager.as_mut() {
            Some(pager) => pager.next_page().await,
            None => Ok(None),
        }
    }
}

/// Reads the patient compartment: Patients themselves, or resources that
/// reference any patient.
pub struct PatientBulkItemReader {
    setup: ReaderSetup,
    pager: Option<PidPager>,
}

impl PatientBulkItemReader {
    pub fn new(
        jobs: &Arc<dyn BulkExportJobStore>,
        pids: &Arc<dyn ExportPidProvider>,
        scope: &JobScope,
        context: &ExecutionContext,
    ) -> BatchResult<Self> {
        Ok(Self {
            setup: ReaderSetup::from_scope(jobs, pids, scope, context)?,
            pager: None,
        })
    }
}

#[async_trait]
impl ItemReader<PidPage> for PatientBulkItemReader {
    async fn read(&mut self) -> BatchResult<Option<PidPage>> {
        if self.pager.is_none() {
            let job = self.setup.load_job().await?;
            self.pager = Some(self.setup.pager(
                job.request.since,
                PidSource::Compartment(PatientScope::Any),
            ));
        }
        match self.pager.as_mut() {
            Some(pager) => pager.next_page().await,
            None => Ok(None),
        }
    }
}

/// Reads the compartments of a group's member patients.
///
/// With `expandMdm` set on the job, members are expanded to every patient
/// linked to the same Person.
pub struct GroupBulkItemReader {
    setup: ReaderSetup,
    store: Arc<dyn FhirStore>,
    link_expansion: Option<Arc<MdmLinkExpansionSvc>>,
    pager: Option<PidPager>,
}

impl GroupBulkItemReader {
    pub fn new(
        jobs: &Arc<dyn BulkExportJobStore>,
        pids: &Arc<dyn ExportPidProvider>,
        store: Arc<dyn FhirStore>,
        link_expansion: Option<Arc<MdmLinkExpansionSvc>>,
        scope: &JobScope,
        context: &ExecutionContext,
    ) -> BatchResult<Self> {
        Ok(Self {
            setup: ReaderSetup::from_scope(jobs, pids, scope, context)?,
            store,
            link_expansion,
            pager: None,
        })
    }

    async fn member_ids(&self, job: &BulkExportJob) -> BatchResult<Vec<String>> {
        let group_id = job.request.group_id().ok_or_else(|| {
            BatchError::read(BulkExportError::InvalidRequest {
                message: format!("job {} is not a group export", job.job_id),
            })
        })?;

        let group = self
            .store
            .read("Group", group_id)
            .await
            .map_err(BatchError::read)?
            .ok_or_else(|| {
                BatchError::read(BulkExportError::GroupNotFound {
                    group_id: group_id.to_string(),
                })
            })?;

        let members = group_member_patient_ids(group.content());
        if !job.request.expand_mdm {
            return Ok(members);
        }

        match &self.link_expansion {
            Some(svc) => svc
                .expand_patient_ids(&members)
                .await
                .map_err(BatchError::read),
            None => {
                tracing::warn!(
                    group_id = %group_id,
                    "MDM expansion requested but no link expansion service is configured"
                );
                Ok(members)
            }
        }
    }
}

#[async_trait]
impl ItemReader<PidPage> for GroupBulkItemReader {
    async fn read(&mut self) -> BatchResult<Option<PidPage>> {
        if self.pager.is_none() {
            let job = self.setup.load_job().await?;
            let members = self.member_ids(&job).await?;
            tracing::debug!(
                job_uuid = %job.job_id,
                resource_type = %self.setup.resource_type,
                members = members.len(),
                "Resolved group members"
            );
            self.pager = Some(self.setup.pager(
                job.request.since,
                PidSource::Compartment(PatientScope::Members(members)),
            ));
        }
        match self.pager.as_mut() {
            Some(pager) => pager.next_page().await,
            None => Ok(None),
        }
    }
}

/// Patient ids referenced from `Group.member.entity`.
pub fn group_member_patient_ids(group: &Value) -> Vec<String> {
    let mut ids: Vec<String> = group
        .get("member")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|member| member.get("inactive").and_then(Value::as_bool) != Some(true))
        .filter_map(|member| member.pointer("/entity/reference").and_then(Value::as_str))
        .filter_map(|reference| match parse_reference(reference) {
            (Some(rt), Some(id)) if rt == "Patient" => Some(id),
            _ => None,
        })
        .collect();
    ids.sort();
    ids.dedup();
    ids
}
