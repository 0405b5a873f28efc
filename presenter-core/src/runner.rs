use std::future::Future;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::context::TaskContext;
use crate::error::{TaskError, TaskResult};
use crate::registry::{TaskHandle, TaskRegistry};

/// Launches units of work on the UI-affine cooperative task stream and keeps
/// them cancellable as a group.
///
/// Every launch registers a [`TaskHandle`] and unregisters it when the task
/// completes, whatever the outcome. Must be used from within a
/// [`tokio::task::LocalSet`].
#[derive(Debug)]
pub struct AsyncRunner {
    registry: Rc<TaskRegistry>,
    next_id: AtomicU64,
}

impl AsyncRunner {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(TaskRegistry::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Schedules `block` on the current task stream. Fire-and-forget from
    /// the caller's perspective: failures are logged, cancellations traced.
    pub fn launch<F, Fut>(&self, block: F)
    where
        F: FnOnce(TaskContext) -> Fut + 'static,
        Fut: Future<Output = TaskResult<()>> + 'static,
    {
        let handle = TaskHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let registry = Rc::clone(&self.registry);
        registry.register(handle.clone());

        let cx = TaskContext::new(handle.clone());
        tokio::task::spawn_local(async move {
            match block(cx).await {
                Ok(()) => {}
                Err(TaskError::Cancelled) => debug!(task = handle.id(), "task cancelled"),
                Err(TaskError::Failed(error)) => warn!(task = handle.id(), %error, "task failed"),
            }
            registry.unregister(handle.id());
        });
    }

    /// Launches `try_block`; failures other than cancellation are routed to
    /// `catch_block`. Cancellation propagates past the catch block unless
    /// `handle_cancellation_manually` is set, in which case the catch block
    /// receives it like any other error.
    pub fn launch_try_catch<F, FFut, C, CFut>(
        &self,
        try_block: F,
        catch_block: C,
        handle_cancellation_manually: bool,
    ) where
        F: FnOnce(TaskContext) -> FFut + 'static,
        FFut: Future<Output = TaskResult<()>> + 'static,
        C: FnOnce(TaskContext, TaskError) -> CFut + 'static,
        CFut: Future<Output = TaskResult<()>> + 'static,
    {
        self.launch(move |cx| async move {
            match try_block(cx.clone()).await {
                Ok(()) => Ok(()),
                Err(error) if error.is_cancellation() && !handle_cancellation_manually => {
                    Err(error)
                }
                Err(error) => catch_block(cx, error).await,
            }
        });
    }

    /// As [`AsyncRunner::launch_try_catch`], with a `finally_block` that runs
    /// once the try/catch pair has resolved. A cancellation that was not
    /// handled manually skips the finally block: cleanup there assumes a
    /// still-live surface.
    pub fn launch_try_catch_finally<F, FFut, C, CFut, G, GFut>(
        &self,
        try_block: F,
        catch_block: C,
        finally_block: G,
        handle_cancellation_manually: bool,
    ) where
        F: FnOnce(TaskContext) -> FFut + 'static,
        FFut: Future<Output = TaskResult<()>> + 'static,
        C: FnOnce(TaskContext, TaskError) -> CFut + 'static,
        CFut: Future<Output = TaskResult<()>> + 'static,
        G: FnOnce(TaskContext) -> GFut + 'static,
        GFut: Future<Output = TaskResult<()>> + 'static,
    {
        self.launch(move |cx| async move {
            let mut unresolved = None;
            match try_block(cx.clone()).await {
                Ok(()) => {}
                Err(error) if error.is_cancellation() && !handle_cancellation_manually => {
                    return Err(error);
                }
                Err(error) => {
                    if let Err(error) = catch_block(cx.clone(), error).await {
                        unresolved = Some(error);
                    }
                }
            }
            finally_block(cx).await?;
            match unresolved {
                Some(error) => Err(error),
                None => Ok(()),
            }
        });
    }

    /// Launches `try_block` with a `finally_block` that runs whether the try
    /// block completes or fails. A cancellation is re-raised after the
    /// finally block unless `suppress_cancellation` is set.
    pub fn launch_try_finally<F, FFut, G, GFut>(
        &self,
        try_block: F,
        finally_block: G,
        suppress_cancellation: bool,
    ) where
        F: FnOnce(TaskContext) -> FFut + 'static,
        FFut: Future<Output = TaskResult<()>> + 'static,
        G: FnOnce(TaskContext) -> GFut + 'static,
        GFut: Future<Output = TaskResult<()>> + 'static,
    {
        self.launch(move |cx| async move {
            let outcome = try_block(cx.clone()).await;
            finally_block(cx).await?;
            match outcome {
                Err(TaskError::Cancelled) if suppress_cancellation => Ok(()),
                other => other,
            }
        });
    }

    /// Requests cancellation of every outstanding task.
    pub fn cancel_all(&self) {
        self.registry.cancel_all();
    }

    pub fn pending_tasks(&self) -> usize {
        self.registry.len()
    }
}

impl Default for AsyncRunner {
    fn default() -> Self {
        Self::new()
    }
}
