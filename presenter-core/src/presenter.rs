use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use tokio::sync::oneshot;
use tracing::debug;

use crate::context::TaskContext;
use crate::error::{TaskError, TaskResult};
use crate::gate::{GateEvent, LifecycleState, SurfaceGate, SurfaceState};
use crate::runner::AsyncRunner;
use crate::sticky::{StickyDecision, StickyRegistry};

/// Screen-controller substrate: one task runner, one surface gate and one
/// sticky-continuation table wired together.
///
/// Controllers embed an `Rc<Presenter<V>>`, launch their workflows through
/// it, and let the host deliver surface attachments and lifecycle phases.
/// Must live on the UI-affine task stream (a [`tokio::task::LocalSet`]).
pub struct Presenter<V: ?Sized> {
    runner: AsyncRunner,
    gate: SurfaceGate<V>,
    sticky: Rc<StickyRegistry<V>>,
    on_attached: RefCell<Option<Box<dyn Fn(&Rc<V>)>>>,
}

impl<V: ?Sized + 'static> Presenter<V> {
    pub fn new() -> Self {
        Self {
            runner: AsyncRunner::new(),
            gate: SurfaceGate::new(),
            sticky: Rc::new(StickyRegistry::new()),
            on_attached: RefCell::new(None),
        }
    }

    /// Registers a hook invoked once per surface attachment.
    pub fn set_attach_hook(&self, hook: impl Fn(&Rc<V>) + 'static) {
        *self.on_attached.borrow_mut() = Some(Box::new(hook));
    }

    /// Installs a new surface. Readiness still follows the lifecycle phase
    /// delivered through [`Presenter::notify_lifecycle_changed`].
    pub fn attach_surface(&self, surface: Rc<V>) {
        let event = self.gate.attach(Rc::clone(&surface));
        if let Some(hook) = self.on_attached.borrow().as_ref() {
            hook(&surface);
        }
        self.dispatch(event);
    }

    /// Delivers a host lifecycle phase change into the gate and the sticky
    /// table.
    pub fn notify_lifecycle_changed(&self, lifecycle: LifecycleState) {
        let event = self.gate.notify_lifecycle_changed(lifecycle);
        self.dispatch(event);
    }

    fn dispatch(&self, event: GateEvent<V>) {
        match event {
            GateEvent::BecameReady(surface) => self.sticky.on_surface_ready(&surface),
            GateEvent::Detached => self.sticky.mark_pending_replay(),
            GateEvent::None => {}
        }
    }

    pub fn surface_state(&self) -> SurfaceState {
        self.gate.state()
    }

    /// The ready surface, suspending until one is available.
    pub async fn surface(&self, cx: &TaskContext) -> TaskResult<Rc<V>> {
        self.gate.surface(cx).await
    }

    /// Suspends until the surface-bound dialog shown by `show` is resolved
    /// through its [`StickyDecision`].
    ///
    /// `show` runs immediately when a surface is ready, and runs again
    /// against every replacement surface that becomes ready before a
    /// decision arrives. Cancelling the calling task unblocks the wait and
    /// drops the entry.
    pub async fn sticky_suspension<T, F>(&self, cx: &TaskContext, show: F) -> TaskResult<T>
    where
        T: 'static,
        F: Fn(&V, StickyDecision<T>) + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let slot = Rc::new(RefCell::new(Some(tx)));
        let id = self.sticky.allocate_id();

        let registry = Rc::downgrade(&self.sticky);
        let unregister: Rc<dyn Fn(u64)> = Rc::new(move |id| {
            if let Some(registry) = registry.upgrade() {
                registry.remove(id);
            }
        });
        let decision = StickyDecision::new(id, Rc::clone(&slot), unregister);

        let entry = self.sticky.insert(
            id,
            Box::new(move |surface| show(surface, decision.clone())),
        );
        if let Some(surface) = self.gate.ready_surface() {
            entry.display(&surface);
        }

        match cx.cancellable(rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(error))) => Err(TaskError::Failed(error)),
            // Sender dropped: the registry died with its presenter.
            Ok(Err(_)) => Err(TaskError::Cancelled),
            Err(error) => {
                self.sticky.remove(id);
                Err(error)
            }
        }
    }

    /// Schedules a workflow on the task stream. See [`AsyncRunner::launch`].
    pub fn launch<F, Fut>(&self, block: F)
    where
        F: FnOnce(TaskContext) -> Fut + 'static,
        Fut: Future<Output = TaskResult<()>> + 'static,
    {
        self.runner.launch(block);
    }

    /// See [`AsyncRunner::launch_try_catch`].
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
        self.runner.launch_try_catch(try_block, catch_block, handle_cancellation_manually);
    }

    /// See [`AsyncRunner::launch_try_catch_finally`].
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
        self.runner.launch_try_catch_finally(
            try_block,
            catch_block,
            finally_block,
            handle_cancellation_manually,
        );
    }

    /// See [`AsyncRunner::launch_try_finally`].
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
        self.runner.launch_try_finally(try_block, finally_block, suppress_cancellation);
    }

    /// Requests cancellation of every outstanding task.
    pub fn cancel_all(&self) {
        self.runner.cancel_all();
    }

    /// Cancels everything this presenter owns. Call once at teardown.
    pub fn cleanup(&self) {
        debug!(pending = self.runner.pending_tasks(), "presenter cleanup");
        self.cancel_all();
    }

    pub fn pending_tasks(&self) -> usize {
        self.runner.pending_tasks()
    }

    pub fn is_idle(&self) -> bool {
        self.runner.pending_tasks() == 0
    }
}

impl<V: ?Sized + 'static> Default for Presenter<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use tokio::task::LocalSet;

    use super::*;

    #[derive(Default)]
    struct ProbeSurface {
        prompts: Cell<usize>,
        decision: RefCell<Option<StickyDecision<u32>>>,
    }

    impl ProbeSurface {
        fn show(&self, decision: StickyDecision<u32>) {
            self.prompts.set(self.prompts.get() + 1);
            *self.decision.borrow_mut() = Some(decision);
        }

        fn take_decision(&self) -> StickyDecision<u32> {
            self.decision.borrow_mut().take().expect("decision should be captured")
        }
    }

    async fn drain() {
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
    }

    fn ready_presenter() -> (Rc<Presenter<ProbeSurface>>, Rc<ProbeSurface>) {
        let presenter = Rc::new(Presenter::new());
        let surface = Rc::new(ProbeSurface::default());
        presenter.attach_surface(Rc::clone(&surface));
        presenter.notify_lifecycle_changed(LifecycleState::Resumed);
        (presenter, surface)
    }

    fn suspend_sticky(presenter: &Rc<Presenter<ProbeSurface>>) -> Rc<RefCell<Option<TaskResult<u32>>>> {
        let outcome = Rc::new(RefCell::new(None));
        let task_presenter = Rc::clone(presenter);
        let task_outcome = Rc::clone(&outcome);
        presenter.launch(move |cx| async move {
            let result = task_presenter
                .sticky_suspension(&cx, |surface: &ProbeSurface, decision| surface.show(decision))
                .await;
            *task_outcome.borrow_mut() = Some(result);
            Ok(())
        });
        outcome
    }

    #[tokio::test]
    async fn attach_hook_fires_once_per_attachment() {
        let presenter = Presenter::<ProbeSurface>::new();
        let attaches = Rc::new(Cell::new(0));

        let count = Rc::clone(&attaches);
        presenter.set_attach_hook(move |_surface| count.set(count.get() + 1));

        presenter.attach_surface(Rc::new(ProbeSurface::default()));
        presenter.attach_surface(Rc::new(ProbeSurface::default()));

        assert_eq!(attaches.get(), 2);
    }

    #[tokio::test]
    async fn sticky_suspension_displays_immediately_on_a_ready_surface() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let (presenter, surface) = ready_presenter();
                let outcome = suspend_sticky(&presenter);
                drain().await;

                assert_eq!(surface.prompts.get(), 1);
                assert!(outcome.borrow().is_none());

                surface.take_decision().resume(7);
                drain().await;

                let outcome = outcome.borrow();
                assert!(matches!(outcome.as_ref(), Some(Ok(7))));
                assert!(presenter.is_idle());
            })
            .await;
    }

    #[tokio::test]
    async fn resume_is_idempotent() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let (presenter, surface) = ready_presenter();
                let outcome = suspend_sticky(&presenter);
                drain().await;

                let decision = surface.take_decision();
                decision.resume(7);
                decision.resume(9);
                drain().await;

                let outcome = outcome.borrow();
                assert!(matches!(outcome.as_ref(), Some(Ok(7))));
            })
            .await;
    }

    #[tokio::test]
    async fn sticky_entry_is_replayed_on_each_replacement_surface_until_resumed() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let (presenter, first) = ready_presenter();
                let outcome = suspend_sticky(&presenter);
                drain().await;
                assert_eq!(first.prompts.get(), 1);

                // Surface replacement before any decision: shown again.
                presenter.notify_lifecycle_changed(LifecycleState::Destroyed);
                let second = Rc::new(ProbeSurface::default());
                presenter.attach_surface(Rc::clone(&second));
                presenter.notify_lifecycle_changed(LifecycleState::Resumed);
                drain().await;
                assert_eq!(second.prompts.get(), 1);

                second.take_decision().resume(3);
                drain().await;
                assert!(matches!(outcome.borrow().as_ref(), Some(Ok(3))));

                // Resumed entries are gone: the next surface sees nothing.
                presenter.notify_lifecycle_changed(LifecycleState::Destroyed);
                let third = Rc::new(ProbeSurface::default());
                presenter.attach_surface(Rc::clone(&third));
                presenter.notify_lifecycle_changed(LifecycleState::Resumed);
                drain().await;
                assert_eq!(third.prompts.get(), 0);
            })
            .await;
    }

    #[tokio::test]
    async fn pause_and_resume_of_the_same_surface_does_not_replay() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let (presenter, surface) = ready_presenter();
                let _outcome = suspend_sticky(&presenter);
                drain().await;
                assert_eq!(surface.prompts.get(), 1);

                presenter.notify_lifecycle_changed(LifecycleState::Started);
                presenter.notify_lifecycle_changed(LifecycleState::Resumed);
                drain().await;

                assert_eq!(surface.prompts.get(), 1);
            })
            .await;
    }

    #[tokio::test]
    async fn sticky_entry_created_while_detached_shows_on_the_first_ready_surface() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let presenter = Rc::new(Presenter::<ProbeSurface>::new());
                let outcome = suspend_sticky(&presenter);
                drain().await;

                let surface = Rc::new(ProbeSurface::default());
                presenter.attach_surface(Rc::clone(&surface));
                presenter.notify_lifecycle_changed(LifecycleState::Resumed);
                drain().await;

                assert_eq!(surface.prompts.get(), 1);
                surface.take_decision().resume(1);
                drain().await;
                assert!(matches!(outcome.borrow().as_ref(), Some(Ok(1))));
            })
            .await;
    }

    #[tokio::test]
    async fn resume_with_error_fails_the_suspended_caller() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let (presenter, surface) = ready_presenter();
                let outcome = suspend_sticky(&presenter);
                drain().await;

                surface.take_decision().resume_with_error(anyhow::anyhow!("dialog broke"));
                drain().await;

                let outcome = outcome.borrow();
                match outcome.as_ref() {
                    Some(Err(error)) => assert!(!error.is_cancellation()),
                    other => panic!("expected a failure, got {other:?}"),
                }
            })
            .await;
    }

    #[tokio::test]
    async fn cancelling_the_task_unblocks_the_sticky_wait_and_drops_the_entry() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let (presenter, first) = ready_presenter();
                let outcome = suspend_sticky(&presenter);
                drain().await;
                assert_eq!(first.prompts.get(), 1);

                presenter.cancel_all();
                drain().await;

                assert!(matches!(outcome.borrow().as_ref(), Some(Err(TaskError::Cancelled))));
                assert!(presenter.is_idle());

                // Dropped entries are never replayed.
                presenter.notify_lifecycle_changed(LifecycleState::Destroyed);
                let second = Rc::new(ProbeSurface::default());
                presenter.attach_surface(Rc::clone(&second));
                presenter.notify_lifecycle_changed(LifecycleState::Resumed);
                drain().await;
                assert_eq!(second.prompts.get(), 0);
            })
            .await;
    }
}
