//! # Task System Core Traits
//!
//! ## Task Lifecycle
//! 1. A `Task` is created on the main thread and published via `TaskManager::publish_task()`
//! 2. The task's `process()` method runs on a worker thread and consumes the task
//! 3. The output travels back over the worker's result channel
//! 4. The main thread drains outputs with `TaskManager::drain_completed()`
//!
//! ## Thread Safety
//! - A `Task` must be `Send` to be moved to a worker
//! - Its `Output` must be `Send` to be moved back
//! - Tasks own their input; nothing is shared with the main thread while they run

/// A unit of work executed on a worker thread.
///
/// Tasks should be self-contained: they own a snapshot of everything they read
/// and produce a value instead of mutating shared state.
pub trait Task: Send {
    /// What the task hands back to the main thread.
    type Output: Send + 'static;

    /// Runs the task to completion.
    ///
    /// A panic inside `process` is caught by the worker and reported as
    /// [`TaskError::Panicked`](crate::error::TaskError::Panicked); the worker
    /// keeps running.
    fn process(self: Box<Self>) -> Self::Output;
}

/// Handle returned by `publish_task`, echoed back with the task's result.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskTicket(pub(crate) u64);

impl TaskTicket {
    pub fn id(&self) -> u64 {
        self.0
    }
}
