use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::oneshot;
use tracing::debug;

pub(crate) type DecisionSlot<T> = Rc<RefCell<Option<oneshot::Sender<Result<T, anyhow::Error>>>>>;

/// One parked "show something on the surface" side effect, re-invocable
/// against whichever surface becomes ready next.
pub(crate) struct StickyEntry<V: ?Sized> {
    id: u64,
    displayed: Cell<bool>,
    show: Box<dyn Fn(&V)>,
}

impl<V: ?Sized> StickyEntry<V> {
    pub(crate) fn display(&self, surface: &V) {
        self.displayed.set(true);
        (self.show)(surface);
    }
}

/// Resumption handle handed to the surface together with the dialog it must
/// render.
///
/// Clones share one underlying continuation: whichever resume call arrives
/// first removes the registry entry and fulfils the suspended caller; later
/// calls are no-ops.
pub struct StickyDecision<T> {
    id: u64,
    slot: DecisionSlot<T>,
    unregister: Rc<dyn Fn(u64)>,
}

impl<T> Clone for StickyDecision<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            slot: Rc::clone(&self.slot),
            unregister: Rc::clone(&self.unregister),
        }
    }
}

impl<T> StickyDecision<T> {
    pub(crate) fn new(id: u64, slot: DecisionSlot<T>, unregister: Rc<dyn Fn(u64)>) -> Self {
        Self { id, slot, unregister }
    }

    /// Fulfils the suspended caller with `value`.
    pub fn resume(&self, value: T) {
        self.finish(Ok(value));
    }

    /// Fails the suspended caller with `error`.
    pub fn resume_with_error(&self, error: impl Into<anyhow::Error>) {
        self.finish(Err(error.into()));
    }

    fn finish(&self, outcome: Result<T, anyhow::Error>) {
        (self.unregister)(self.id);
        let Some(sender) = self.slot.borrow_mut().take() else {
            debug!(sticky = self.id, "continuation already resumed");
            return;
        };
        let _ = sender.send(outcome);
    }
}

/// Side table of continuations that must be re-shown on a new ready surface
/// until they are resumed.
pub struct StickyRegistry<V: ?Sized> {
    inner: Mutex<StickyInner<V>>,
    next_id: AtomicU64,
}

struct StickyInner<V: ?Sized> {
    entries: Vec<Rc<StickyEntry<V>>>,
    pending_replay: bool,
}

impl<V: ?Sized> StickyRegistry<V> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(StickyInner {
                entries: Vec::new(),
                pending_replay: false,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn insert(&self, id: u64, show: Box<dyn Fn(&V)>) -> Rc<StickyEntry<V>> {
        let entry = Rc::new(StickyEntry {
            id,
            displayed: Cell::new(false),
            show,
        });
        let Ok(mut inner) = self.inner.lock() else {
            return entry;
        };
        debug!(sticky = id, "sticky continuation registered");
        inner.entries.push(Rc::clone(&entry));
        entry
    }

    /// Removes the entry. Idempotent; reports whether it was still present.
    pub(crate) fn remove(&self, id: u64) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        let before = inner.entries.len();
        inner.entries.retain(|entry| entry.id != id);
        before != inner.entries.len()
    }

    /// Flags that the surface went away: every entry still present must be
    /// re-shown on the next ready surface.
    pub(crate) fn mark_pending_replay(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.pending_replay = true;
        }
    }

    /// Re-invokes display closures against a freshly ready surface: every
    /// entry after a surface replacement, otherwise only entries that have
    /// never been shown. Iterates a snapshot so a display closure may resume
    /// (and remove) entries while the pass runs.
    pub(crate) fn on_surface_ready(&self, surface: &V) {
        let (snapshot, replay_all) = {
            let Ok(mut inner) = self.inner.lock() else {
                return;
            };
            let replay_all = inner.pending_replay;
            inner.pending_replay = false;
            (inner.entries.clone(), replay_all)
        };

        for entry in snapshot {
            if replay_all || !entry.displayed.get() {
                debug!(sticky = entry.id, "re-displaying sticky continuation");
                entry.display(surface);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }
}
