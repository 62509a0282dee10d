//! Worker pool implementation.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use crate::{Result, TasksError};

/// Identifier of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

/// Identifier of a pool worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(pub usize);

/// A set of task IDs to wait on or reduce over.
pub type TaskSet = FxHashSet<TaskId>;

/// Mutable state handed to every task closure.
///
/// A task reports its outcome by assignment; there is no return value and
/// no cancellation channel.
#[derive(Debug)]
pub struct TaskContext {
    pub successful: bool,
}

type Job = Box<dyn FnOnce(&mut TaskContext) + Send + 'static>;

struct QueuedTask {
    id: TaskId,
    job: Job,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
    Pending,
    Running,
    Finished(bool),
}

struct Shared {
    tx: Sender<QueuedTask>,
    rx: Receiver<QueuedTask>,
    states: Mutex<FxHashMap<TaskId, TaskState>>,
    state_changed: Condvar,
    next_id: AtomicU64,
    shutdown: AtomicBool,
    worker_count: usize,
}

thread_local! {
    static WORKER_ID: Cell<Option<WorkerId>> = const { Cell::new(None) };
}

/// Bounded worker pool with reentrant waiting.
pub struct TaskManager {
    shared: Arc<Shared>,
    workers: Vec<std::thread::JoinHandle<()>>,
}

impl TaskManager {
    /// Create a pool for an effective parallelism of `jobs`.
    ///
    /// Spawns `max(1, jobs - 1)` worker threads; the thread that waits on
    /// tasks participates as the remaining unit of parallelism.
    pub fn new(jobs: usize) -> Result<Self> {
        let worker_count = jobs.saturating_sub(1).max(1);
        let (tx, rx) = crossbeam_channel::unbounded();

        let shared = Arc::new(Shared {
            tx,
            rx,
            states: Mutex::new(FxHashMap::default()),
            state_changed: Condvar::new(),
            next_id: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            worker_count,
        });

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let worker_shared = shared.clone();
            let handle = std::thread::Builder::new()
                .name(format!("cppl-worker-{index}"))
                .spawn(move || worker_loop(index, worker_shared));
            match handle {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    // Let any workers spawned so far wind down.
                    shared.shutdown.store(true, Ordering::SeqCst);
                    return Err(TasksError::Spawn(err));
                }
            }
        }

        Ok(Self { shared, workers })
    }

    /// A pool sized to the machine.
    pub fn with_default_jobs() -> Result<Self> {
        Self::new(num_cpus::get())
    }

    /// The identity of the current pool worker, or `None` when called from
    /// a thread the pool does not own (e.g. the main thread).
    pub fn worker_id() -> Option<WorkerId> {
        WORKER_ID.with(Cell::get)
    }

    /// Reserve a task ID without submitting work for it yet.
    ///
    /// Reserved IDs show up as unfinished to every wait primitive, which
    /// lets a scheduler publish the ID of a task it is about to run inline
    /// before actually running it.
    pub fn reserve(&self) -> TaskId {
        let id = TaskId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        self.shared.states.lock().insert(id, TaskState::Pending);
        id
    }

    /// Submit work for a previously reserved ID onto the queue.
    pub fn submit_reserved<F>(&self, id: TaskId, job: F)
    where
        F: FnOnce(&mut TaskContext) + Send + 'static,
    {
        self.shared
            .tx
            .send(QueuedTask {
                id,
                job: Box::new(job),
            })
            .expect("task queue closed while manager alive");
        // Wake any thread draining the queue while it waits.
        self.shared.state_changed.notify_all();
    }

    /// Run work for a previously reserved ID inline on the current thread.
    pub fn run_reserved<F>(&self, id: TaskId, job: F)
    where
        F: FnOnce(&mut TaskContext) + Send + 'static,
    {
        execute(&self.shared, id, Box::new(job));
    }

    /// Enqueue a task; it will not run on the calling thread.
    pub fn add_task<F>(&self, job: F) -> TaskId
    where
        F: FnOnce(&mut TaskContext) + Send + 'static,
    {
        let id = self.reserve();
        self.submit_reserved(id, job);
        id
    }

    /// Run a task immediately on the calling thread.
    ///
    /// This is the `same_thread` submission form: a fan-out submits all
    /// subtasks but the last through [`add_task`](Self::add_task) and runs
    /// the last one here, reusing the current thread instead of parking it.
    pub fn add_task_on_current<F>(&self, job: F) -> TaskId
    where
        F: FnOnce(&mut TaskContext) + Send + 'static,
    {
        let id = self.reserve();
        self.run_reserved(id, job);
        id
    }

    /// Submit work for a reserved ID, possibly running it inline.
    ///
    /// When called from a pool worker while the queue already has more
    /// backlog than there are workers to drain it, the task runs inline on
    /// the caller; queueing it would only grow the backlog the caller is
    /// about to wait on.
    pub fn submit_or_run_reserved<F>(&self, id: TaskId, job: F)
    where
        F: FnOnce(&mut TaskContext) + Send + 'static,
    {
        if Self::worker_id().is_some() && self.shared.rx.len() >= self.shared.worker_count {
            self.run_reserved(id, job);
        } else {
            self.submit_reserved(id, job);
        }
    }

    /// Submit a task, possibly running it inline (see
    /// [`submit_or_run_reserved`](Self::submit_or_run_reserved)).
    pub fn run_task<F>(&self, job: F) -> TaskId
    where
        F: FnOnce(&mut TaskContext) + Send + 'static,
    {
        let id = self.reserve();
        self.submit_or_run_reserved(id, job);
        id
    }

    /// Block until every task in `set` has finished; returns whether all of
    /// them succeeded. The calling thread runs queued tasks while it waits.
    pub fn wait_for_set(&self, set: &TaskSet) -> bool {
        self.wait_until(|states| {
            let mut all_ok = true;
            for id in set {
                match states.get(id) {
                    Some(TaskState::Finished(ok)) => all_ok &= *ok,
                    Some(_) => return None,
                    // Unknown IDs count as failed rather than blocking.
                    None => all_ok = false,
                }
            }
            Some(all_ok)
        })
    }

    /// Block until every submitted task has finished; returns whether all
    /// succeeded.
    pub fn wait_for_tasks(&self) -> bool {
        self.wait_until(|states| {
            let mut all_ok = true;
            for state in states.values() {
                match state {
                    TaskState::Finished(ok) => all_ok &= *ok,
                    _ => return None,
                }
            }
            Some(all_ok)
        })
    }

    /// Whether every task in `set` finished successfully. Does not block;
    /// unfinished tasks count as failures.
    pub fn all_successful(&self, set: &TaskSet) -> bool {
        let states = self.shared.states.lock();
        set.iter().all(|id| {
            matches!(states.get(id), Some(TaskState::Finished(true)))
        })
    }

    /// Wait until `check` yields a result, draining the queue meanwhile.
    fn wait_until<F>(&self, check: F) -> bool
    where
        F: Fn(&FxHashMap<TaskId, TaskState>) -> Option<bool>,
    {
        loop {
            // Run pending work instead of blocking; this is what keeps a
            // waiting worker from starving its own subtasks.
            if let Ok(task) = self.shared.rx.try_recv() {
                execute(&self.shared, task.id, task.job);
                continue;
            }

            let mut states = self.shared.states.lock();
            if let Some(result) = check(&states) {
                return result;
            }
            // Timeout bounds the window between the queue check above and
            // this wait; an enqueue in that window also notifies.
            self.shared
                .state_changed
                .wait_for(&mut states, Duration::from_millis(20));
        }
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(index: usize, shared: Arc<Shared>) {
    WORKER_ID.with(|id| id.set(Some(WorkerId(index))));
    trace!(worker = index, "worker started");

    loop {
        match shared.rx.recv_timeout(Duration::from_millis(20)) {
            Ok(task) => execute(&shared, task.id, task.job),
            Err(RecvTimeoutError::Timeout) => {
                if shared.shutdown.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    trace!(worker = index, "worker stopped");
}

fn execute(shared: &Shared, id: TaskId, job: Job) {
    {
        let mut states = shared.states.lock();
        states.insert(id, TaskState::Running);
    }

    let mut context = TaskContext { successful: true };
    job(&mut context);

    {
        let mut states = shared.states.lock();
        states.insert(id, TaskState::Finished(context.successful));
    }
    shared.state_changed.notify_all();
}
