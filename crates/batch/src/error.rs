//! Error types for the batch framework.

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed source error carried by item and tasklet failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result alias for batch operations.
pub type BatchResult<T> = Result<T, BatchError>;

/// The pipeline stage an item error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStage {
    /// An [`ItemReader`](crate::item::ItemReader).
    Read,
    /// An [`ItemProcessor`](crate::item::ItemProcessor).
    Process,
    /// An [`ItemWriter`](crate::item::ItemWriter).
    Write,
    /// A [`Tasklet`](crate::step::Tasklet).
    Tasklet,
    /// A [`Partitioner`](crate::partition::Partitioner).
    Partition,
    /// A [`StepExecutionListener`](crate::step::StepExecutionListener).
    Listener,
}

impl std::fmt::Display for ItemStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ItemStage::Read => "read",
            ItemStage::Process => "process",
            ItemStage::Write => "write",
            ItemStage::Tasklet => "tasklet",
            ItemStage::Partition => "partition",
            ItemStage::Listener => "listener",
        };
        write!(f, "{}", name)
    }
}

/// Errors raised by jobs, steps and their components.
#[derive(Error, Debug)]
pub enum BatchError {
    /// Job parameters failed validation. The job never started.
    #[error("invalid job parameters: {}", .messages.join("; "))]
    InvalidJobParameters {
        /// Every violation found.
        messages: Vec<String>,
    },

    /// A required job or context parameter was absent.
    #[error("missing parameter: {name}")]
    MissingParameter {
        /// The parameter key.
        name: String,
    },

    /// A step finished in the failed state.
    #[error("step '{step}' failed: {message}")]
    StepFailed {
        /// The step name.
        step: String,
        /// Failure description.
        message: String,
    },

    /// A job was built without steps.
    #[error("job '{job}' has no steps")]
    NoSteps {
        /// The job name.
        job: String,
    },

    /// A reader, processor, writer, tasklet or partitioner failed.
    #[error("{stage} failed: {source}")]
    Item {
        /// Which stage failed.
        stage: ItemStage,
        /// The underlying error.
        #[source]
        source: BoxError,
    },
}

impl BatchError {
    /// Wraps a reader failure.
    pub fn read(source: impl Into<BoxError>) -> Self {
        Self::item(ItemStage::Read, source)
    }

    /// Wraps a processor failure.
    pub fn process(source: impl Into<BoxError>) -> Self {
        Self::item(ItemStage::Process, source)
    }

    /// Wraps a writer failure.
    pub fn write(source: impl Into<BoxError>) -> Self {
        Self::item(ItemStage::Write, source)
    }

    /// Wraps a tasklet failure.
    pub fn tasklet(source: impl Into<BoxError>) -> Self {
        Self::item(ItemStage::Tasklet, source)
    }

    /// Wraps a partitioner failure.
    pub fn partition(source: impl Into<BoxError>) -> Self {
        Self::item(ItemStage::Partition, source)
    }

    /// Wraps a listener failure.
    pub fn listener(source: impl Into<BoxError>) -> Self {
        Self::item(ItemStage::Listener, source)
    }

    fn item(stage: ItemStage, source: impl Into<BoxError>) -> Self {
        Self::Item {
            stage,
            source: source.into(),
        }
    }

    /// Builds an [`InvalidJobParameters`](Self::InvalidJobParameters) from one message.
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::InvalidJobParameters {
            messages: vec![message.into()],
        }
    }

    /// Returns the validation messages if this is a parameter error.
    pub fn validation_messages(&self) -> Option<&[String]> {
        match self {
            Self::InvalidJobParameters { messages } => Some(messages),
            _ => None,
        }
    }
}
