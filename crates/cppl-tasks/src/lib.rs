//! Bounded-parallelism task manager.
//!
//! The coordinator's unit of work is a closure run against a mutable
//! [`TaskContext`]; the final value of `context.successful` is the task's
//! outcome. Tasks may submit further tasks and wait on them, which is what
//! the dependency walk does at every node, so the pool must keep making
//! progress even when every thread is logically "waiting": a waiting thread
//! drains the queue and runs pending tasks inline instead of blocking.
//! Combined with the same-thread submission form used for the last subtask
//! of a fan-out, this keeps a `jobs = 1` build deadlock-free without
//! oversubscribing threads.
//!
//! The calling thread participates in execution while it waits, so the pool
//! spawns `max(1, jobs - 1)` workers for an effective parallelism of
//! `jobs`.

mod manager;

pub use manager::{TaskContext, TaskId, TaskManager, TaskSet, WorkerId};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TasksError {
    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T, E = TasksError> = std::result::Result<T, E>;
