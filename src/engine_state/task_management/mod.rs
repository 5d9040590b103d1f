//! # Task Management System
//!
//! A small worker pool for CPU-bound jobs that must not run on the main thread.
//!
//! ## Architecture Overview
//! - `TaskManager`: central coordinator for task distribution and worker management
//! - `Task`: a unit of work that consumes itself and returns an output
//! - `TaskChannel`: communication channel between the main thread and one worker
//!
//! Each worker owns a dedicated pair of `std::sync::mpsc` channels. Tasks are
//! handed out round-robin with at most [`MAX_TASKS_IN_FLIGHT`] per worker; the
//! rest wait in a FIFO overflow queue on the main thread.
//!
//! ## Task Lifecycle
//! 1. Tasks are published via `TaskManager::publish_task()`, which returns a [`TaskTicket`]
//! 2. The manager hands tasks to free workers, or queues them
//! 3. Workers run tasks to completion and send `(ticket, result)` back
//! 4. `drain_completed()` collects results on the main thread and refills idle workers
//!
//! With zero workers every task runs inline inside `publish_task`, and its result
//! waits for the next `drain_completed()` like any other.
//!
//! ## Example Usage
//! ```
//! use voxel_world::engine_state::task_management::{task::Task, TaskManager};
//!
//! struct Square(u64);
//!
//! impl Task for Square {
//!     type Output = u64;
//!     fn process(self: Box<Self>) -> u64 {
//!         self.0 * self.0
//!     }
//! }
//!
//! let mut task_manager = TaskManager::new(0);
//! let ticket = task_manager.publish_task(Box::new(Square(7)));
//! let completed = task_manager.drain_completed();
//! assert_eq!(completed, vec![(ticket, Ok(49))]);
//! ```

pub mod task;

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use task::{Task, TaskTicket};

use crate::error::{panic_message, TaskError};

/// Boxed task with its output type fixed.
pub type BoxedTask<O> = Box<dyn Task<Output = O>>;

/// Result of one task as delivered to the main thread.
pub type Completion<O> = (TaskTicket, Result<O, TaskError>);

/// Maximum number of tasks that can be in flight per worker channel.
///
/// Keeping this at 1 means a worker never holds a backlog, so a burst of low
/// priority work cannot delay jobs published afterwards on a different worker.
pub const MAX_TASKS_IN_FLIGHT: usize = 1;

/// A communication channel between the main thread and a worker thread.
///
/// # Fields
/// - `task_sender`: Sends tasks from main thread to worker; taken on drop to stop the worker
/// - `result_receiver`: Receives task results from worker
/// - `num_tasks_in_flight`: Tracks number of tasks currently being processed
/// - `worker`: Handle to the worker thread, joined on drop
struct TaskChannel<O> {
    task_sender: Option<Sender<(TaskTicket, BoxedTask<O>)>>,
    result_receiver: Receiver<Completion<O>>,
    num_tasks_in_flight: usize,
    worker: Option<JoinHandle<()>>,
}

/// Runs a task, turning a panic into a `TaskError`.
fn run_task<O: Send + 'static>(task: BoxedTask<O>) -> Result<O, TaskError> {
    panic::catch_unwind(AssertUnwindSafe(move || task.process()))
        .map_err(|payload| TaskError::Panicked(panic_message(payload.as_ref())))
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// The `TaskManager` is responsible for:
/// - Creating and joining worker threads
/// - Distributing tasks across available workers
/// - Collecting results for the main thread
/// - Queuing tasks when all workers are busy
pub struct TaskManager<O: Send + 'static> {
    channels: Vec<TaskChannel<O>>,
    queued_tasks: VecDeque<(TaskTicket, BoxedTask<O>)>,
    inline_results: Vec<Completion<O>>,
    current_channel: usize,
    next_ticket: u64,
}

impl<O: Send + 'static> TaskManager<O> {
    /// Creates a new `TaskManager` with the specified number of worker threads.
    ///
    /// # Arguments
    /// * `num_workers` - Number of worker threads to create. Zero runs every task
    ///   inline on the calling thread.
    ///
    /// A worker that fails to spawn is logged and skipped; if none spawn, the
    /// manager falls back to inline execution.
    pub fn new(num_workers: usize) -> Self {
        let mut channels = Vec::with_capacity(num_workers);

        for worker_index in 0..num_workers {
            let (task_tx, task_rx) = channel::<(TaskTicket, BoxedTask<O>)>();
            let (result_tx, result_rx) = channel::<Completion<O>>();

            let task_closure = move || {
                while let Ok((ticket, task)) = task_rx.recv() {
                    let result = run_task(task);
                    if result_tx.send((ticket, result)).is_err() {
                        break;
                    }
                }
            };

            let spawned = thread::Builder::new()
                .name(format!("task-worker-{worker_index}"))
                .spawn(task_closure);

            match spawned {
                Ok(worker) => channels.push(TaskChannel {
                    task_sender: Some(task_tx),
                    result_receiver: result_rx,
                    num_tasks_in_flight: 0,
                    worker: Some(worker),
                }),
                Err(error) => {
                    log::error!("Failed to spawn task worker {}: {}", worker_index, error);
                }
            }
        }

        log::info!(
            "Task manager started with {} workers (available parallelism: {:?})",
            channels.len(),
            thread::available_parallelism().ok()
        );

        TaskManager {
            channels,
            queued_tasks: VecDeque::new(),
            inline_results: Vec::new(),
            current_channel: 0,
            next_ticket: 0,
        }
    }

    /// Number of running worker threads.
    pub fn worker_count(&self) -> usize {
        self.channels.len()
    }

    /// Tasks handed to workers whose results have not been drained yet.
    pub fn tasks_in_flight(&self) -> usize {
        self.channels
            .iter()
            .map(|channel| channel.num_tasks_in_flight)
            .sum()
    }

    /// Tasks waiting for a free worker.
    pub fn queued_len(&self) -> usize {
        self.queued_tasks.len()
    }

    /// Whether nothing is queued, running, or waiting to be drained.
    pub fn is_idle(&self) -> bool {
        self.queued_tasks.is_empty() && self.inline_results.is_empty() && self.tasks_in_flight() == 0
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// # Returns
    /// - `Ok(())` if the task was handed to the worker
    /// - `Err((ticket, task))` if the worker is gone, so the caller can requeue it
    fn try_send_task(
        &mut self,
        ticket: TaskTicket,
        task: BoxedTask<O>,
        channel_idx: usize,
    ) -> Result<(), (TaskTicket, BoxedTask<O>)> {
        let channel = &mut self.channels[channel_idx];
        let Some(sender) = channel.task_sender.as_ref() else {
            return Err((ticket, task));
        };
        match sender.send((ticket, task)) {
            Ok(()) => {
                channel.num_tasks_in_flight += 1;
                Ok(())
            }
            Err(returned) => Err(returned.0),
        }
    }

    /// Finds a worker channel below [`MAX_TASKS_IN_FLIGHT`], starting at the
    /// round-robin cursor.
    fn find_available_channel(&self) -> Option<usize> {
        let count = self.channels.len();
        (0..count)
            .map(|step| (self.current_channel + step) % count)
            .find(|index| self.channels[*index].num_tasks_in_flight < MAX_TASKS_IN_FLIGHT)
    }

    /// Publishes a new task for execution.
    ///
    /// The task starts on a free worker right away or waits in the overflow
    /// queue. Without workers it runs to completion before this returns.
    ///
    /// # Returns
    /// The ticket that accompanies the task's result.
    pub fn publish_task(&mut self, task: BoxedTask<O>) -> TaskTicket {
        self.next_ticket += 1;
        let ticket = TaskTicket(self.next_ticket);

        if self.channels.is_empty() {
            let result = run_task(task);
            if let Err(error) = &result {
                log::error!("Inline task {:?} failed: {}", ticket, error);
            }
            self.inline_results.push((ticket, result));
            return ticket;
        }

        match self.find_available_channel() {
            Some(channel_idx) => match self.try_send_task(ticket, task, channel_idx) {
                Ok(()) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                }
                Err(returned) => {
                    log::warn!("Worker {} is disconnected, queueing {:?}", channel_idx, ticket);
                    self.queued_tasks.push_back(returned);
                }
            },
            None => self.queued_tasks.push_back((ticket, task)),
        }
        ticket
    }

    /// Moves queued tasks onto idle workers, oldest first.
    pub fn process_queued_tasks(&mut self) {
        while !self.queued_tasks.is_empty() {
            let Some(channel_idx) = self.find_available_channel() else {
                break;
            };
            let Some((ticket, task)) = self.queued_tasks.pop_front() else {
                break;
            };
            match self.try_send_task(ticket, task, channel_idx) {
                Ok(()) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                }
                Err(returned) => {
                    self.queued_tasks.push_front(returned);
                    break;
                }
            }
        }
    }

    /// Collects every finished result without blocking, then refills idle workers.
    ///
    /// Must be called from the thread that owns the manager.
    pub fn drain_completed(&mut self) -> Vec<Completion<O>> {
        let mut completed = std::mem::take(&mut self.inline_results);
        for channel in &mut self.channels {
            while let Ok((ticket, result)) = channel.result_receiver.try_recv() {
                channel.num_tasks_in_flight = channel.num_tasks_in_flight.saturating_sub(1);
                if let Err(error) = &result {
                    log::error!("Task {:?} failed: {}", ticket, error);
                }
                completed.push((ticket, result));
            }
        }
        self.process_queued_tasks();
        completed
    }

    /// Blocks until every published task has produced a result, and returns them all.
    pub fn wait_for_all(&mut self) -> Vec<Completion<O>> {
        let mut completed = self.drain_completed();
        while !self.queued_tasks.is_empty() || self.tasks_in_flight() > 0 {
            let mut received = false;
            for channel in &mut self.channels {
                if channel.num_tasks_in_flight == 0 {
                    continue;
                }
                match channel.result_receiver.recv() {
                    Ok(completion) => {
                        channel.num_tasks_in_flight -= 1;
                        completed.push(completion);
                        received = true;
                    }
                    Err(_) => {
                        log::error!("Worker disconnected with {} task(s) in flight", channel.num_tasks_in_flight);
                        channel.num_tasks_in_flight = 0;
                    }
                }
            }
            self.process_queued_tasks();
            if !received && self.tasks_in_flight() == 0 && !self.queued_tasks.is_empty() {
                log::error!("{} queued task(s) have no worker left to run them", self.queued_tasks.len());
                break;
            }
        }
        completed
    }
}

impl<O: Send + 'static> Drop for TaskManager<O> {
    fn drop(&mut self) {
        for channel in &mut self.channels {
            channel.task_sender.take();
        }
        for channel in &mut self.channels {
            if let Some(worker) = channel.worker.take() {
                if worker.join().is_err() {
                    log::error!("Task worker panicked while shutting down");
                }
            }
        }
    }
}
