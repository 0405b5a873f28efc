//! View-lifecycle-aware async task coordination for screen presenters.
//!
//! This crate defines:
//! - Cancellable task tracking with bulk teardown ([`TaskRegistry`], [`AsyncRunner`])
//! - A readiness gate that parks workflows until a UI surface is usable ([`SurfaceGate`])
//! - Sticky continuations that survive surface replacement ([`StickyRegistry`])
//! - The [`Presenter`] composition that screen controllers build on
//!
//! Everything runs on a single UI-affine cooperative task stream
//! (a [`tokio::task::LocalSet`]); background work marshals its results back
//! at `await` points.

pub mod context;
pub mod error;
pub mod gate;
pub mod presenter;
pub mod registry;
pub mod runner;
pub mod sticky;

pub use context::TaskContext;
pub use error::{TaskError, TaskResult};
pub use gate::{LifecycleState, SurfaceGate, SurfaceState};
pub use presenter::Presenter;
pub use registry::{TaskHandle, TaskRegistry};
pub use runner::AsyncRunner;
pub use sticky::{StickyDecision, StickyRegistry};
