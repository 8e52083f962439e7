//! Dependency resolution.
//!
//! Tasks live in an arena keyed by id. A task becomes eligible once every
//! dependency has completed; a dependency that fails or is cancelled blocks
//! its dependents transitively. Dependencies may name tasks that have not
//! been submitted yet.
//!
//! Terminal tasks are retired to a compact record: their id stays reserved
//! and their outcome still decides late dependents, but the task itself is
//! dropped.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};

use modelroute_core::{CoreError, Priority, Task, TaskId, TaskStatus};

/// High priority first, then submission order.
type ReadyKey = (Reverse<Priority>, u64);

#[derive(Debug)]
struct TaskNode {
    task: Task,
    state: TaskStatus,
    unmet: HashSet<TaskId>,
    dependents: Vec<TaskId>,
    seq: u64,
    failure: Option<String>,
}

impl TaskNode {
    fn ready_key(&self) -> ReadyKey {
        (Reverse(self.task.priority), self.seq)
    }
}

/// What remains of a task once it is terminal.
#[derive(Debug)]
struct Finished {
    state: TaskStatus,
    failure: Option<String>,
}

/// A task that can never run because a dependency did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocked {
    pub task: TaskId,
    /// The dependency that failed or was cancelled.
    pub dependency: TaskId,
}

/// Tasks whose state changed as a consequence of another transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub eligible: Vec<TaskId>,
    pub blocked: Vec<Blocked>,
}

/// Outcome of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Pending, Eligible, or Failed when a dependency already failed.
    pub status: TaskStatus,
    /// Blocked tasks, the submitted one included.
    pub resolution: Resolution,
}

#[derive(Default)]
struct ResolverState {
    /// Tasks not yet terminal.
    nodes: HashMap<TaskId, TaskNode>,
    finished: HashMap<TaskId, Finished>,
    /// Dependents of ids not submitted yet.
    waiting: HashMap<TaskId, Vec<TaskId>>,
    ready: BTreeMap<ReadyKey, TaskId>,
    next_seq: u64,
}

impl ResolverState {
    fn contains(&self, id: &TaskId) -> bool {
        self.nodes.contains_key(id) || self.finished.contains_key(id)
    }

    fn state_of(&self, id: &TaskId) -> Option<TaskStatus> {
        self.nodes
            .get(id)
            .map(|n| n.state)
            .or_else(|| self.finished.get(id).map(|f| f.state))
    }

    /// Move a terminal node out of the live graph.
    fn retire(&mut self, id: &TaskId) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };
        for dep in &node.unmet {
            if let Some(parent) = self.nodes.get_mut(dep) {
                parent.dependents.retain(|d| d != id);
            } else if let Some(list) = self.waiting.get_mut(dep) {
                list.retain(|d| d != id);
                if list.is_empty() {
                    self.waiting.remove(dep);
                }
            }
        }
        self.finished.insert(
            id.clone(),
            Finished {
                state: node.state,
                failure: node.failure,
            },
        );
    }

    /// Path `start -> ... -> start` if `start` is reachable from `deps`.
    fn find_cycle<'a>(&'a self, start: &TaskId, deps: &'a [TaskId]) -> Option<Vec<TaskId>> {
        let mut visited: HashSet<&TaskId> = HashSet::new();
        let mut stack: Vec<(&TaskId, usize)> = Vec::new();

        for dep in deps {
            if !visited.insert(dep) {
                continue;
            }
            stack.push((dep, 0));

            while let Some((id, next)) = stack.last_mut() {
                let id = *id;
                let children = self
                    .nodes
                    .get(id)
                    .map(|n| n.task.dependencies.as_slice())
                    .unwrap_or_default();

                let Some(child) = children.get(*next) else {
                    stack.pop();
                    continue;
                };
                *next += 1;

                if child == start {
                    let mut path = vec![start.clone()];
                    path.extend(stack.iter().map(|(id, _)| (*id).clone()));
                    path.push(start.clone());
                    return Some(path);
                }
                if visited.insert(child) {
                    stack.push((child, 0));
                }
            }
        }
        None
    }

    /// Fail `root` and every non-terminal descendant.
    fn block_from(&mut self, root: &TaskId, resolution: &mut Resolution) {
        let mut queue: VecDeque<TaskId> = VecDeque::from([root.clone()]);
        while let Some(failed) = queue.pop_front() {
            let dependents = match self.nodes.get(&failed) {
                Some(node) => node.dependents.clone(),
                None => continue,
            };
            for id in dependents {
                let Some(node) = self.nodes.get_mut(&id) else {
                    continue;
                };
                if node.state.is_terminal() {
                    continue;
                }
                if node.state == TaskStatus::Eligible {
                    self.ready.remove(&node.ready_key());
                }
                node.state = TaskStatus::Failed;
                node.failure = Some(format!("dependency {failed} did not complete"));
                resolution.blocked.push(Blocked {
                    task: id.clone(),
                    dependency: failed.clone(),
                });
                queue.push_back(id);
            }
        }
        for blocked in &resolution.blocked {
            self.retire(&blocked.task);
        }
    }

    fn make_eligible(&mut self, id: &TaskId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.state = TaskStatus::Eligible;
            let key = node.ready_key();
            self.ready.insert(key, id.clone());
        }
    }
}

/// Tracks the dependency graph of submitted tasks.
#[derive(Default)]
pub struct DependencyResolver {
    state: Mutex<ResolverState>,
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a task.
    ///
    /// Fails without creating a node when the task is malformed, reuses an
    /// id, or would close a dependency cycle.
    pub fn submit(&self, task: Task) -> Result<Admission, CoreError> {
        task.validate()?;

        let mut guard = self.lock();
        let state = &mut *guard;
        if state.contains(&task.id) {
            return Err(CoreError::DuplicateTask(task.id.clone()));
        }
        if let Some(path) = state.find_cycle(&task.id, &task.dependencies) {
            return Err(CoreError::Cycle(path));
        }

        let mut unmet = HashSet::new();
        let mut failed_dep = None;
        for dep in &task.dependencies {
            match state.state_of(dep) {
                Some(TaskStatus::Completed) => {}
                Some(TaskStatus::Failed) | Some(TaskStatus::Cancelled) => {
                    if failed_dep.is_none() {
                        failed_dep = Some(dep.clone());
                    }
                }
                _ => {
                    unmet.insert(dep.clone());
                }
            }
        }

        let id = task.id.clone();
        let dependents = state.waiting.remove(&id).unwrap_or_default();
        for dep in &unmet {
            match state.nodes.get_mut(dep) {
                Some(node) => node.dependents.push(id.clone()),
                None => state.waiting.entry(dep.clone()).or_default().push(id.clone()),
            }
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        let node = TaskNode {
            task,
            state: TaskStatus::Pending,
            unmet,
            dependents,
            seq,
            failure: None,
        };
        let ready_now = node.unmet.is_empty();
        state.nodes.insert(id.clone(), node);

        let mut resolution = Resolution::default();
        let status = if let Some(dep) = failed_dep {
            if let Some(node) = state.nodes.get_mut(&id) {
                node.state = TaskStatus::Failed;
                node.failure = Some(format!("dependency {dep} did not complete"));
            }
            resolution.blocked.push(Blocked {
                task: id.clone(),
                dependency: dep,
            });
            state.block_from(&id, &mut resolution);
            state.retire(&id);
            TaskStatus::Failed
        } else if ready_now {
            state.make_eligible(&id);
            TaskStatus::Eligible
        } else {
            TaskStatus::Pending
        };

        debug!(task_id = %id, status = %status, "Task admitted");
        Ok(Admission { status, resolution })
    }

    /// Eligible tasks in priority order.
    ///
    /// Each step reads the current state, so tasks that become eligible
    /// while iterating are picked up if they sort after the cursor.
    pub fn next_eligible(&self) -> EligibleTasks<'_> {
        EligibleTasks {
            resolver: self,
            cursor: None,
        }
    }

    /// Take the highest-priority eligible task and mark it Running.
    pub fn claim_next(&self) -> Option<Task> {
        let mut state = self.lock();
        let (_, id) = state.ready.pop_first()?;
        let node = state.nodes.get_mut(&id)?;
        node.state = TaskStatus::Running;
        Some(node.task.clone())
    }

    /// Record a task's outcome and propagate it to dependents.
    pub fn mark_terminal(&self, id: &TaskId, succeeded: bool) -> Result<Resolution, CoreError> {
        let to = if succeeded {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        self.finish(id, to, None, &[TaskStatus::Running])
    }

    /// Record that a running task was cancelled by its caller.
    pub fn mark_cancelled(&self, id: &TaskId) -> Result<Resolution, CoreError> {
        self.finish(
            id,
            TaskStatus::Cancelled,
            Some("cancelled".to_string()),
            &[TaskStatus::Running],
        )
    }

    /// Cancel a task that has not started. Dependents are blocked.
    pub fn cancel(&self, id: &TaskId) -> Result<Resolution, CoreError> {
        self.finish(
            id,
            TaskStatus::Cancelled,
            Some("cancelled".to_string()),
            &[TaskStatus::Pending, TaskStatus::Eligible],
        )
    }

    /// Fail a task still waiting on dependencies. Returns `None` if it is no
    /// longer pending.
    pub fn expire(&self, id: &TaskId, reason: impl Into<String>) -> Option<Resolution> {
        self.finish(id, TaskStatus::Failed, Some(reason.into()), &[TaskStatus::Pending])
            .ok()
    }

    fn finish(
        &self,
        id: &TaskId,
        to: TaskStatus,
        reason: Option<String>,
        from: &[TaskStatus],
    ) -> Result<Resolution, CoreError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(node) = state.nodes.get_mut(id) else {
            return Err(match state.finished.get(id) {
                Some(f) => CoreError::InvalidStateTransition {
                    task: id.clone(),
                    from: f.state.to_string(),
                    to: to.to_string(),
                },
                None => CoreError::TaskNotFound(id.clone()),
            });
        };

        if !from.contains(&node.state) {
            return Err(CoreError::InvalidStateTransition {
                task: id.clone(),
                from: node.state.to_string(),
                to: to.to_string(),
            });
        }

        let was_ready = node.state == TaskStatus::Eligible;
        let key = node.ready_key();
        node.state = to;
        node.failure = reason;
        let dependents = node.dependents.clone();
        if was_ready {
            state.ready.remove(&key);
        }

        let mut resolution = Resolution::default();
        if to == TaskStatus::Completed {
            for dep_id in dependents {
                let Some(dependent) = state.nodes.get_mut(&dep_id) else {
                    continue;
                };
                if dependent.state != TaskStatus::Pending {
                    continue;
                }
                dependent.unmet.remove(id);
                if dependent.unmet.is_empty() {
                    state.make_eligible(&dep_id);
                    resolution.eligible.push(dep_id);
                }
            }
        } else {
            state.block_from(id, &mut resolution);
        }
        state.retire(id);

        info!(
            task_id = %id,
            status = %to,
            eligible = resolution.eligible.len(),
            blocked = resolution.blocked.len(),
            "Task finished"
        );
        Ok(resolution)
    }

    pub fn status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.lock().state_of(id)
    }

    /// A task that is not terminal yet.
    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.lock().nodes.get(id).map(|n| n.task.clone())
    }

    /// Why a task failed or was cancelled without running.
    pub fn failure_reason(&self, id: &TaskId) -> Option<String> {
        self.lock().finished.get(id).and_then(|f| f.failure.clone())
    }

    /// Dependencies a task is still waiting for, sorted.
    pub fn unmet(&self, id: &TaskId) -> Vec<TaskId> {
        let mut unmet: Vec<TaskId> = self
            .lock()
            .nodes
            .get(id)
            .map(|n| n.unmet.iter().cloned().collect())
            .unwrap_or_default();
        unmet.sort();
        unmet
    }

    /// Number of tasks in each state.
    pub fn counts(&self) -> HashMap<TaskStatus, usize> {
        let state = self.lock();
        let mut counts = HashMap::new();
        let live = state.nodes.values().map(|n| n.state);
        for status in live.chain(state.finished.values().map(|f| f.state)) {
            *counts.entry(status).or_insert(0) += 1;
        }
        counts
    }
}

/// Lazy, restartable view over eligible tasks.
pub struct EligibleTasks<'a> {
    resolver: &'a DependencyResolver,
    cursor: Option<ReadyKey>,
}

impl Iterator for EligibleTasks<'_> {
    type Item = Task;

    fn next(&mut self) -> Option<Task> {
        let state = self.resolver.lock();
        let lower = match self.cursor {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        let (key, id) = state.ready.range((lower, Bound::Unbounded)).next()?;
        self.cursor = Some(*key);
        state.nodes.get(id).map(|n| n.task.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelroute_core::TaskType;

    fn task(id: &str) -> Task {
        Task::new(TaskType::Generation, "do it").with_id(id)
    }

    fn ids(tasks: impl IntoIterator<Item = Task>) -> Vec<String> {
        tasks.into_iter().map(|t| t.id.into_inner()).collect()
    }

    #[test]
    fn test_no_dependencies_is_eligible_immediately() {
        let resolver = DependencyResolver::new();
        let admission = resolver.submit(task("a")).unwrap();
        assert_eq!(admission.status, TaskStatus::Eligible);
        assert_eq!(ids(resolver.next_eligible()), vec!["a"]);
    }

    #[test]
    fn test_priority_then_submission_order() {
        let resolver = DependencyResolver::new();
        resolver.submit(task("low").with_priority(Priority::Low)).unwrap();
        resolver.submit(task("m1")).unwrap();
        resolver.submit(task("high").with_priority(Priority::High)).unwrap();
        resolver.submit(task("m2")).unwrap();

        assert_eq!(ids(resolver.next_eligible()), vec!["high", "m1", "m2", "low"]);
        assert_eq!(resolver.claim_next().unwrap().id.as_str(), "high");
        assert_eq!(resolver.status(&TaskId::new("high")), Some(TaskStatus::Running));
    }

    #[test]
    fn test_next_eligible_reflects_current_state() {
        let resolver = DependencyResolver::new();
        resolver.submit(task("a")).unwrap();
        let mut eligible = resolver.next_eligible();
        assert_eq!(eligible.next().unwrap().id.as_str(), "a");

        // Submitted after the iterator was created, sorts after the cursor.
        resolver.submit(task("b")).unwrap();
        assert_eq!(eligible.next().unwrap().id.as_str(), "b");
        assert!(eligible.next().is_none());
    }

    #[test]
    fn test_dependent_waits_for_success() {
        let resolver = DependencyResolver::new();
        resolver.submit(task("t1")).unwrap();
        let admission = resolver.submit(task("t2").with_dependency("t1")).unwrap();
        assert_eq!(admission.status, TaskStatus::Pending);
        assert_eq!(ids(resolver.next_eligible()), vec!["t1"]);

        resolver.claim_next().unwrap();
        let resolution = resolver.mark_terminal(&TaskId::new("t1"), true).unwrap();
        assert_eq!(resolution.eligible, vec![TaskId::new("t2")]);
        assert_eq!(resolver.status(&TaskId::new("t2")), Some(TaskStatus::Eligible));
    }

    #[test]
    fn test_failure_blocks_descendants_transitively() {
        let resolver = DependencyResolver::new();
        resolver.submit(task("t1")).unwrap();
        resolver.submit(task("t2").with_dependency("t1")).unwrap();
        resolver.submit(task("t3").with_dependency("t2")).unwrap();
        resolver.submit(task("other")).unwrap();

        resolver.claim_next().unwrap();
        let resolution = resolver.mark_terminal(&TaskId::new("t1"), false).unwrap();

        assert_eq!(
            resolution.blocked,
            vec![
                Blocked {
                    task: TaskId::new("t2"),
                    dependency: TaskId::new("t1")
                },
                Blocked {
                    task: TaskId::new("t3"),
                    dependency: TaskId::new("t2")
                },
            ]
        );
        assert_eq!(resolver.status(&TaskId::new("t3")), Some(TaskStatus::Failed));
        assert_eq!(resolver.status(&TaskId::new("other")), Some(TaskStatus::Eligible));

        // A late submission depending on a failed task is blocked on arrival.
        let late = resolver.submit(task("t4").with_dependency("t1")).unwrap();
        assert_eq!(late.status, TaskStatus::Failed);
        assert_eq!(late.resolution.blocked[0].dependency, TaskId::new("t1"));
    }

    #[test]
    fn test_forward_reference_resolves_on_submit() {
        let resolver = DependencyResolver::new();
        resolver.submit(task("child").with_dependency("parent")).unwrap();
        assert_eq!(resolver.unmet(&TaskId::new("child")), vec![TaskId::new("parent")]);

        resolver.submit(task("parent")).unwrap();
        resolver.claim_next().unwrap();
        let resolution = resolver.mark_terminal(&TaskId::new("parent"), true).unwrap();
        assert_eq!(resolution.eligible, vec![TaskId::new("child")]);
    }

    #[test]
    fn test_cycle_is_rejected_without_creating_node() {
        let resolver = DependencyResolver::new();
        resolver.submit(task("a").with_dependency("c")).unwrap();
        resolver.submit(task("b").with_dependency("a")).unwrap();

        let err = resolver.submit(task("c").with_dependency("b")).unwrap_err();
        match err {
            CoreError::Cycle(path) => assert_eq!(
                path,
                vec![TaskId::new("c"), TaskId::new("b"), TaskId::new("a"), TaskId::new("c")]
            ),
            other => panic!("expected cycle, got {other:?}"),
        }
        assert_eq!(resolver.status(&TaskId::new("c")), None);
    }

    #[test]
    fn test_self_dependency_and_duplicates_rejected() {
        let resolver = DependencyResolver::new();
        assert!(matches!(
            resolver.submit(task("a").with_dependency("a")),
            Err(CoreError::SelfDependency(_))
        ));
        assert_eq!(resolver.status(&TaskId::new("a")), None);

        resolver.submit(task("a")).unwrap();
        assert!(matches!(
            resolver.submit(task("a")),
            Err(CoreError::DuplicateTask(_))
        ));
    }

    #[test]
    fn test_cancel_blocks_dependents_and_rejects_second_finish() {
        let resolver = DependencyResolver::new();
        resolver.submit(task("a")).unwrap();
        resolver.submit(task("b").with_dependency("a")).unwrap();

        let resolution = resolver.cancel(&TaskId::new("a")).unwrap();
        assert_eq!(resolution.blocked.len(), 1);
        assert!(resolver.next_eligible().next().is_none());
        assert!(matches!(
            resolver.mark_terminal(&TaskId::new("a"), true),
            Err(CoreError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_expire_only_applies_to_pending() {
        let resolver = DependencyResolver::new();
        resolver.submit(task("a")).unwrap();
        resolver.submit(task("b").with_dependency("missing")).unwrap();

        assert!(resolver.expire(&TaskId::new("a"), "too slow").is_none());
        assert!(resolver.expire(&TaskId::new("b"), "too slow").is_some());
        assert_eq!(
            resolver.failure_reason(&TaskId::new("b")).as_deref(),
            Some("too slow")
        );
        let counts = resolver.counts();
        assert_eq!(counts.get(&TaskStatus::Failed), Some(&1));
        assert_eq!(counts.get(&TaskStatus::Eligible), Some(&1));
    }

    #[test]
    fn test_running_task_is_cancelled_through_mark_cancelled() {
        let resolver = DependencyResolver::new();
        resolver.submit(task("a")).unwrap();
        resolver.submit(task("b").with_dependency("a")).unwrap();
        resolver.claim_next().unwrap();

        assert!(matches!(
            resolver.cancel(&TaskId::new("a")),
            Err(CoreError::InvalidStateTransition { .. })
        ));
        let resolution = resolver.mark_cancelled(&TaskId::new("a")).unwrap();
        assert_eq!(resolution.blocked[0].task, TaskId::new("b"));
        assert_eq!(resolver.status(&TaskId::new("a")), Some(TaskStatus::Cancelled));
        assert_eq!(resolver.status(&TaskId::new("b")), Some(TaskStatus::Failed));
    }

    #[test]
    fn test_terminal_tasks_are_retired() {
        let resolver = DependencyResolver::new();
        resolver.submit(task("a")).unwrap();
        resolver.submit(task("b").with_dependency("never")).unwrap();
        resolver.submit(task("c").with_dependency("a").with_dependency("never")).unwrap();
        assert!(resolver.task(&TaskId::new("a")).is_some());

        resolver.claim_next().unwrap();
        resolver.mark_terminal(&TaskId::new("a"), true).unwrap();
        resolver.expire(&TaskId::new("b"), "too slow").unwrap();
        resolver.expire(&TaskId::new("c"), "too slow").unwrap();

        {
            let state = resolver.lock();
            assert!(state.nodes.is_empty());
            assert!(state.waiting.is_empty());
            assert_eq!(state.finished.len(), 3);
        }
        assert!(resolver.task(&TaskId::new("a")).is_none());
        assert_eq!(resolver.status(&TaskId::new("a")), Some(TaskStatus::Completed));

        // Retired ids stay reserved and still decide late dependents.
        assert!(matches!(
            resolver.submit(task("a")),
            Err(CoreError::DuplicateTask(_))
        ));
        let late = resolver.submit(task("d").with_dependency("a")).unwrap();
        assert_eq!(late.status, TaskStatus::Eligible);
        let blocked = resolver.submit(task("e").with_dependency("b")).unwrap();
        assert_eq!(blocked.status, TaskStatus::Failed);
    }
}
