use std::future::Future;

use crate::error::{TaskError, TaskResult};
use crate::registry::TaskHandle;

/// Execution context handed to every launched block.
///
/// Carries the task's own handle so suspension points can observe
/// cancellation instead of staying parked forever.
#[derive(Debug, Clone)]
pub struct TaskContext {
    handle: TaskHandle,
}

impl TaskContext {
    pub(crate) fn new(handle: TaskHandle) -> Self {
        Self { handle }
    }

    /// A context not owned by any runner, cancelled only through its own
    /// handle. Lets hosts and tests drive suspending APIs from outside a
    /// launched task.
    pub fn standalone() -> Self {
        Self::new(TaskHandle::new(0))
    }

    pub fn handle(&self) -> &TaskHandle {
        &self.handle
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    /// Awaits `fut`, resolving to [`TaskError::Cancelled`] as soon as this
    /// task's handle is cancelled.
    pub async fn cancellable<F>(&self, fut: F) -> TaskResult<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.handle.token().cancelled() => Err(TaskError::Cancelled),
            value = fut => Ok(value),
        }
    }

    /// As [`TaskContext::cancellable`], for work that already returns a
    /// result.
    pub async fn cancellable_try<F, T, E>(&self, fut: F) -> TaskResult<T>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<anyhow::Error>,
    {
        self.cancellable(fut).await?.map_err(TaskError::failure)
    }
}
