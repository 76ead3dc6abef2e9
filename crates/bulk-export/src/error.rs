//! Error types for bulk export.

use helios_batch::BatchError;
use helios_mdm::MdmError;
use helios_persistence::StorageError;
use thiserror::Error;

/// Errors raised while submitting or running exports.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The export request is unusable.
    #[error("invalid export request: {}", .messages.join("; "))]
    InvalidRequest { messages: Vec<String> },

    /// No job entity with this UUID exists.
    #[error("bulk export job not found: {job_id}")]
    JobNotFound { job_id: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Mdm(#[from] MdmError),

    #[error("export file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for export operations.
pub type ExportResult<T> = Result<T, ExportError>;
