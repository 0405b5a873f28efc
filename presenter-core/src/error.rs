use thiserror::Error;

/// Failure of a launched presenter task.
///
/// Cancellation is kept apart from ordinary failures so that tearing down a
/// screen is never mistaken for a business error.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The owning task handle was cancelled while the task was suspended.
    #[error("task cancelled")]
    Cancelled,

    /// Any non-cancellation failure raised by the task's work.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

pub type TaskResult<T> = Result<T, TaskError>;

impl TaskError {
    /// Wraps an ordinary error as a task failure.
    pub fn failure(err: impl Into<anyhow::Error>) -> Self {
        TaskError::Failed(err.into())
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }

    /// Matches a concrete error type carried inside a failure, so catch
    /// blocks can route domain errors without losing the original value.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            TaskError::Failed(err) => err.downcast_ref::<E>(),
            TaskError::Cancelled => None,
        }
    }
}
