//! Error types for MDM services.

use helios_persistence::StorageError;
use thiserror::Error;

/// Errors raised while loading MDM settings or running MDM lookups.
#[derive(Error, Debug)]
pub enum MdmError {
    /// The rules file could not be read.
    #[error("failed to read MDM rules: {0}")]
    Io(#[from] std::io::Error),

    /// The rules file is not valid JSON for [`MdmSettings`](crate::MdmSettings).
    #[error("failed to parse MDM rules: {0}")]
    Json(#[from] serde_json::Error),

    /// The settings parsed but are unusable.
    #[error("invalid MDM settings: {message}")]
    InvalidSettings { message: String },

    /// A storage call failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result alias for MDM operations.
pub type MdmResult<T> = Result<T, MdmError>;
