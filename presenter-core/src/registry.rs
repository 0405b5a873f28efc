use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cancellation handle for one in-flight task.
///
/// Created at launch and tracked by the [`TaskRegistry`] until the task
/// completes. Cancellation is cooperative: requesting it unblocks the task
/// at its next suspension point rather than killing it.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: u64,
    token: CancellationToken,
}

impl TaskHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            token: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Requests cooperative cancellation of the owning task.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Tracks every outstanding task handle owned by one screen so teardown can
/// cancel them all at once.
///
/// Launches and completions race from different call sites (user actions,
/// fetch completions, lifecycle callbacks), so all mutation goes through one
/// coarse lock.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    handles: Mutex<Vec<TaskHandle>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handle. No-op when the handle is already registered.
    pub fn register(&self, handle: TaskHandle) {
        let Ok(mut handles) = self.handles.lock() else {
            return;
        };
        if handles.iter().any(|known| known.id() == handle.id()) {
            return;
        }
        handles.push(handle);
    }

    /// Removes the handle with the given id. Safe to call repeatedly.
    pub fn unregister(&self, id: u64) {
        let Ok(mut handles) = self.handles.lock() else {
            return;
        };
        handles.retain(|known| known.id() != id);
    }

    /// Requests cancellation of every registered handle, most recently
    /// launched first so derived work unwinds before the work that spawned
    /// it.
    ///
    /// Operates on a snapshot taken under the lock: handles registered while
    /// the pass runs are left for a later call.
    pub fn cancel_all(&self) {
        let snapshot = {
            let Ok(handles) = self.handles.lock() else {
                return;
            };
            handles.clone()
        };

        for handle in snapshot.iter().rev() {
            debug!(task = handle.id(), "cancelling task");
            handle.cancel();
        }
    }

    pub fn len(&self) -> usize {
        self.handles.lock().map(|handles| handles.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
