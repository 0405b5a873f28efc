use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::debug;

use crate::context::TaskContext;
use crate::error::{TaskError, TaskResult};

/// Host lifecycle phases, ordered from torn down to interactive.
///
/// Hosts deliver the phase they are entering: a paused surface reports
/// `Started`, a stopped one `Created`, a destroyed one `Destroyed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Destroyed,
    Created,
    Started,
    Resumed,
}

/// Readiness of the UI surface as seen by suspended workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Detached,
    AttachedNotReady,
    Ready,
}

/// What an attach or lifecycle delivery changed, for the composition layer.
#[derive(Debug)]
pub(crate) enum GateEvent<V: ?Sized> {
    BecameReady(Rc<V>),
    Detached,
    None,
}

/// Holds the current surface reference and parks callers until the surface
/// is both attached and in an interactive phase.
///
/// Waiters resume in FIFO enqueue order, and only ever with the non-null
/// surface supplied by the ready transition that resumed them.
pub struct SurfaceGate<V: ?Sized> {
    inner: Mutex<GateInner<V>>,
}

struct GateInner<V: ?Sized> {
    surface: Option<Rc<V>>,
    lifecycle: LifecycleState,
    waiters: VecDeque<oneshot::Sender<Rc<V>>>,
}

impl<V: ?Sized> GateInner<V> {
    fn is_ready(&self) -> bool {
        self.surface.is_some() && self.lifecycle >= LifecycleState::Resumed
    }
}

impl<V: ?Sized> SurfaceGate<V> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(GateInner {
                surface: None,
                lifecycle: LifecycleState::Destroyed,
                waiters: VecDeque::new(),
            }),
        }
    }

    pub fn state(&self) -> SurfaceState {
        let Ok(inner) = self.inner.lock() else {
            return SurfaceState::Detached;
        };
        if inner.is_ready() {
            SurfaceState::Ready
        } else if inner.surface.is_some() {
            SurfaceState::AttachedNotReady
        } else {
            SurfaceState::Detached
        }
    }

    /// The surface, when one is attached and ready right now.
    pub fn ready_surface(&self) -> Option<Rc<V>> {
        let Ok(inner) = self.inner.lock() else {
            return None;
        };
        if inner.is_ready() { inner.surface.clone() } else { None }
    }

    /// Stores a new surface reference. Readiness still follows the lifecycle
    /// phase delivered separately.
    pub(crate) fn attach(&self, surface: Rc<V>) -> GateEvent<V> {
        let Ok(mut inner) = self.inner.lock() else {
            return GateEvent::None;
        };
        let was_ready = inner.is_ready();
        let had_surface = inner.surface.is_some();
        inner.surface = Some(surface);
        Self::settle(inner, was_ready, had_surface)
    }

    /// Recomputes readiness for a new lifecycle phase. Crossing into ready
    /// resumes every queued waiter; reaching `Destroyed` drops the surface
    /// reference while queued waiters stay parked for the next ready
    /// surface.
    pub(crate) fn notify_lifecycle_changed(&self, lifecycle: LifecycleState) -> GateEvent<V> {
        let Ok(mut inner) = self.inner.lock() else {
            return GateEvent::None;
        };
        let was_ready = inner.is_ready();
        let had_surface = inner.surface.is_some();
        inner.lifecycle = lifecycle;
        if lifecycle == LifecycleState::Destroyed {
            inner.surface = None;
        }
        Self::settle(inner, was_ready, had_surface)
    }

    fn settle(
        mut inner: MutexGuard<'_, GateInner<V>>,
        was_ready: bool,
        had_surface: bool,
    ) -> GateEvent<V> {
        if !was_ready && inner.is_ready() {
            let Some(surface) = inner.surface.clone() else {
                return GateEvent::None;
            };
            let waiters: Vec<_> = inner.waiters.drain(..).collect();
            drop(inner);

            if !waiters.is_empty() {
                debug!(count = waiters.len(), "surface ready, resuming waiters");
            }
            for waiter in waiters {
                let _ = waiter.send(Rc::clone(&surface));
            }
            return GateEvent::BecameReady(surface);
        }

        if had_surface && inner.surface.is_none() {
            debug!(parked = inner.waiters.len(), "surface detached");
            return GateEvent::Detached;
        }
        GateEvent::None
    }

    /// Returns the ready surface, suspending the calling task until one is
    /// delivered. Suspension yields to the cooperative scheduler and is
    /// unblocked by cancellation of the calling task's handle.
    pub async fn surface(&self, cx: &TaskContext) -> TaskResult<Rc<V>> {
        let rx = {
            let Ok(mut inner) = self.inner.lock() else {
                // A poisoned gate means its owner panicked; treat as teardown.
                return Err(TaskError::Cancelled);
            };
            if inner.is_ready() {
                if let Some(surface) = inner.surface.clone() {
                    return Ok(surface);
                }
            }
            let (tx, rx) = oneshot::channel();
            inner.waiters.push_back(tx);
            debug!("surface not ready, queueing waiter");
            rx
        };

        match cx.cancellable(rx).await? {
            Ok(surface) => Ok(surface),
            // The gate was dropped while we were parked.
            Err(_) => Err(TaskError::Cancelled),
        }
    }
}

impl<V: ?Sized> Default for SurfaceGate<V> {
    fn default() -> Self {
        Self::new()
    }
}
