//! Parallel dependency-first walk.
//!
//! `dsf_jobs` starts at the graph terminals and runs `on_node` for every
//! node after all of the node's dependencies have been processed. Subnodes
//! fan out through the task pool; the last subnode of each fan-out runs on
//! the submitting thread so a fan-out never parks the thread that produced
//! it. A shared visited map guarantees each node is processed at most once
//! even when several dependents reach it, and dependents arriving late wait
//! on the task that is already processing the shared node.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use cppl_tasks::{TaskContext, TaskId, TaskManager, TaskSet};

use crate::graph::{DependenciesGraph, Node, NodeId};

type OnNodeFn = dyn Fn(&Node) -> bool + Send + Sync;

struct WalkShared {
    graph: Arc<DependenciesGraph>,
    tasks: Arc<TaskManager>,
    on_node: Box<OnNodeFn>,
    /// Node -> the task responsible for its subtree.
    scheduled: Mutex<FxHashMap<NodeId, TaskId>>,
}

/// Walk the graph from terminals towards roots, processing dependencies
/// before dependents.
///
/// Returns `false` as soon as any `on_node` call returns `false` or any
/// scheduled subtree fails; downstream nodes of a failed subtree are not
/// processed.
pub fn dsf_jobs<F>(
    graph: Arc<DependenciesGraph>,
    tasks: Arc<TaskManager>,
    on_node: F,
) -> bool
where
    F: Fn(&Node) -> bool + Send + Sync + 'static,
{
    let terminals: Vec<NodeId> = graph.terminals().iter().copied().collect();
    let shared = Arc::new(WalkShared {
        graph,
        tasks,
        on_node: Box::new(on_node),
        scheduled: Mutex::new(FxHashMap::default()),
    });

    process_subnodes(&shared, None, &terminals)
}

fn process_subnodes(shared: &Arc<WalkShared>, node: Option<NodeId>, subnodes: &[NodeId]) -> bool {
    let mut wait_set = TaskSet::default();

    for (index, &sub) in subnodes.iter().enumerate() {
        let reserved = {
            let mut scheduled = shared.scheduled.lock();
            match scheduled.get(&sub) {
                // Another dependent already owns this subtree; wait on its
                // task instead of scheduling a duplicate.
                Some(&existing) => {
                    wait_set.insert(existing);
                    None
                }
                None => {
                    let id = shared.tasks.reserve();
                    scheduled.insert(sub, id);
                    wait_set.insert(id);
                    Some(id)
                }
            }
        };

        let Some(task_id) = reserved else {
            continue;
        };

        let shared_for_job = Arc::clone(shared);
        let job = move |ctx: &mut TaskContext| {
            let subnode = shared_for_job.graph.node(sub);
            let deps: Vec<NodeId> = subnode.dependencies.iter().copied().collect();
            ctx.successful = process_subnodes(&shared_for_job, Some(sub), &deps);
        };

        // The last subnode reuses the current thread; queueing it as well
        // would leave this thread idle while it waits.
        if index + 1 == subnodes.len() {
            shared.tasks.run_reserved(task_id, job);
        } else {
            shared.tasks.submit_or_run_reserved(task_id, job);
        }
    }

    let mut successful = wait_set.is_empty() || shared.tasks.wait_for_set(&wait_set);

    if successful {
        if let Some(id) = node {
            successful = (shared.on_node)(shared.graph.node(id));
        }
    }

    successful
}
