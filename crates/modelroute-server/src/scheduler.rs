//! Task scheduler - admits tasks and dispatches them to the router.
//!
//! Submitted tasks go to the dependency resolver; a single dispatch loop
//! claims eligible tasks in priority order whenever a slot is free and runs
//! each one through the router on its own task. Every submission gets a
//! [`ProgressStream`] that ends with exactly one terminal event, whether the
//! task runs, is blocked by a failed dependency, times out waiting, or is
//! cancelled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use modelroute_core::{CoreError, ProgressEvent, Task, TaskId, TaskResult, TaskStatus};

use crate::progress::ProgressStream;
use crate::resolver::{DependencyResolver, Resolution};
use crate::router::{FailureSummary, TaskRouter};

/// Events buffered per task before the router waits on the consumer.
const PROGRESS_BUFFER: usize = 32;

/// Scheduler errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Rejected(#[from] CoreError),

    #[error("Scheduler is shutting down")]
    ShuttingDown,
}

struct Watch {
    tx: mpsc::Sender<ProgressEvent>,
    cancel: CancellationToken,
    done: CancellationToken,
}

/// Task scheduler.
pub struct Scheduler {
    resolver: Arc<DependencyResolver>,
    router: Arc<TaskRouter>,
    watches: Mutex<HashMap<TaskId, Watch>>,
    wake: Notify,
    slots: Arc<Semaphore>,
    pending_timeout: Duration,
    shutdown: CancellationToken,
}

impl Scheduler {
    /// Create a new Scheduler. Nothing is dispatched until [`Scheduler::start`].
    pub fn new(
        resolver: Arc<DependencyResolver>,
        router: Arc<TaskRouter>,
        max_concurrent_tasks: usize,
        pending_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            resolver,
            router,
            watches: Mutex::new(HashMap::new()),
            wake: Notify::new(),
            slots: Arc::new(Semaphore::new(max_concurrent_tasks.max(1))),
            pending_timeout,
            shutdown: CancellationToken::new(),
        })
    }

    fn watches(&self) -> MutexGuard<'_, HashMap<TaskId, Watch>> {
        self.watches.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admit a task and return its progress stream.
    ///
    /// An empty id is replaced by a generated one.
    pub async fn submit(self: &Arc<Self>, mut task: Task) -> Result<ProgressStream, SchedulerError> {
        if self.shutdown.is_cancelled() {
            return Err(SchedulerError::ShuttingDown);
        }
        if task.id.is_empty() {
            task.id = TaskId::generate();
        }
        let id = task.id.clone();

        let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
        let cancel = CancellationToken::new();
        let done = CancellationToken::new();
        {
            let mut watches = self.watches();
            if watches.contains_key(&id) {
                return Err(CoreError::DuplicateTask(id).into());
            }
            watches.insert(
                id.clone(),
                Watch {
                    tx,
                    cancel: cancel.clone(),
                    done: done.clone(),
                },
            );
        }

        let task_type = task.task_type;
        let admission = match self.resolver.submit(task) {
            Ok(admission) => admission,
            Err(e) => {
                self.watches().remove(&id);
                warn!(task_id = %id, error = %e, "Task rejected");
                return Err(e.into());
            }
        };
        info!(
            task_id = %id,
            task_type = %task_type,
            status = %admission.status,
            "Task submitted"
        );

        let pending = admission.status == TaskStatus::Pending;
        if admission.status == TaskStatus::Eligible {
            self.wake.notify_one();
        }
        self.apply(admission.resolution).await;

        let this = Arc::clone(self);
        let watch_id = id.clone();
        let watch_cancel = cancel.clone();
        tokio::spawn(async move { this.watch(watch_id, watch_cancel, done, pending).await });

        Ok(ProgressStream::new(id, rx, cancel))
    }

    /// Follow one task until it finishes, handling cancellation and the
    /// dependency wait timeout for tasks that have not started.
    async fn watch(&self, id: TaskId, cancel: CancellationToken, done: CancellationToken, pending: bool) {
        let expiry = tokio::time::sleep(self.pending_timeout);
        tokio::pin!(expiry);
        let mut expiry_armed = pending;

        loop {
            tokio::select! {
                _ = done.cancelled() => return,
                _ = cancel.cancelled() => {
                    // A running task observes the same token in the router.
                    if let Ok(resolution) = self.resolver.cancel(&id) {
                        info!(task_id = %id, "Task cancelled before dispatch");
                        let summary = FailureSummary::Cancelled { attempts: Vec::new() };
                        self.finish_unstarted(&id, summary).await;
                        self.apply(resolution).await;
                    }
                    return;
                }
                _ = &mut expiry, if expiry_armed => {
                    expiry_armed = false;
                    let summary = FailureSummary::DependencyTimeout {
                        unmet: self.resolver.unmet(&id),
                        waited: self.pending_timeout,
                    };
                    if let Some(resolution) = self.resolver.expire(&id, summary.to_string()) {
                        warn!(task_id = %id, error = %summary, "Dependency wait timed out");
                        self.finish_unstarted(&id, summary).await;
                        self.apply(resolution).await;
                        return;
                    }
                }
            }
        }
    }

    /// Start the dispatch loop.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run().await })
    }

    async fn run(self: Arc<Self>) {
        info!("Dispatch loop started");
        loop {
            let permit = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let task = loop {
                let notified = self.wake.notified();
                if let Some(task) = self.resolver.claim_next() {
                    break Some(task);
                }
                tokio::select! {
                    _ = self.shutdown.cancelled() => break None,
                    _ = notified => {}
                }
            };
            let Some(task) = task else { break };

            debug!(task_id = %task.id, "Task dispatched");
            let this = Arc::clone(&self);
            tokio::spawn(async move {
                this.run_task(task).await;
                drop(permit);
            });
        }
        info!("Dispatch loop stopped");
    }

    async fn run_task(&self, task: Task) {
        let watch = self
            .watches()
            .get(&task.id)
            .map(|w| (w.tx.clone(), w.cancel.clone()));
        let (tx, cancel) = match watch {
            Some(watch) => watch,
            None => {
                warn!(task_id = %task.id, "Dispatched task has no progress stream");
                let (tx, _rx) = mpsc::channel(1);
                (tx, CancellationToken::new())
            }
        };

        let routed = self.router.execute(&task, &tx, &cancel).await;
        drop(tx);

        let resolution = match routed.status {
            TaskStatus::Completed => self.resolver.mark_terminal(&task.id, true),
            TaskStatus::Cancelled => self.resolver.mark_cancelled(&task.id),
            _ => self.resolver.mark_terminal(&task.id, false),
        };
        self.finish(&task.id, routed.into_event()).await;

        match resolution {
            Ok(resolution) => self.apply(resolution).await,
            Err(e) => warn!(task_id = %task.id, error = %e, "Failed to record task outcome"),
        }
    }

    /// Send the terminal event and close the task's stream.
    async fn finish(&self, id: &TaskId, event: ProgressEvent) {
        let Some(watch) = self.watches().remove(id) else {
            return;
        };
        // The consumer may already be gone.
        let _ = watch.tx.send(event).await;
        watch.done.cancel();
    }

    /// Finish a task that never reached the router.
    async fn finish_unstarted(&self, id: &TaskId, summary: FailureSummary) {
        let context = self
            .resolver
            .task(id)
            .map(|t| t.context)
            .unwrap_or_default();
        let result = TaskResult::failed(id.clone(), summary.to_string(), context);
        self.finish(id, ProgressEvent::terminal(summary.status(), 0, result))
            .await;
    }

    /// Act on state changes caused by another transition.
    async fn apply(&self, resolution: Resolution) {
        for blocked in resolution.blocked {
            info!(
                task_id = %blocked.task,
                dependency = %blocked.dependency,
                "Task blocked by failed dependency"
            );
            let summary = FailureSummary::DependencyFailed {
                dependency: blocked.dependency,
            };
            self.finish_unstarted(&blocked.task, summary).await;
        }
        for _ in &resolution.eligible {
            self.wake.notify_one();
        }
    }

    /// Tasks with an open progress stream.
    pub fn active(&self) -> usize {
        self.watches().len()
    }

    /// Stop dispatching and cancel every open task.
    pub fn shutdown(&self) {
        info!("Scheduler shutting down");
        self.shutdown.cancel();
        for watch in self.watches().values() {
            watch.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::test_state_with;
    use crate::test_support::ScriptedRuntime;
    use modelroute_core::{BackendId, Context, SessionId, TaskType};
    use tokio_stream::StreamExt;

    fn task(id: &str) -> Task {
        Task::new(TaskType::Generation, "write a parser")
            .with_id(id)
            .with_context(Context::new(SessionId::new("s1")))
    }

    async fn collect(stream: ProgressStream) -> Vec<ProgressEvent> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_task_runs_to_completion() {
        let state = test_state_with(Config::default(), ScriptedRuntime::new()).await;
        let events = collect(state.scheduler.submit(task("t1")).await.unwrap()).await;

        let last = events.last().unwrap();
        assert_eq!(last.status, TaskStatus::Completed);
        assert_eq!(last.backend, Some(BackendId::DeepSeek));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert_eq!(state.resolver.status(&TaskId::new("t1")), Some(TaskStatus::Completed));
        assert_eq!(state.scheduler.active(), 0);
    }

    #[tokio::test]
    async fn test_dependent_runs_after_dependency_and_sees_history() {
        let state = test_state_with(Config::default(), ScriptedRuntime::new()).await;
        let second = state
            .scheduler
            .submit(task("t2").with_dependency("t1"))
            .await
            .unwrap();
        let first = state.scheduler.submit(task("t1")).await.unwrap();

        let first = first.wait_terminal().await.unwrap();
        let second = second.wait_terminal().await.unwrap();
        assert_eq!(first.status, TaskStatus::Completed);
        assert_eq!(second.status, TaskStatus::Completed);
        assert_eq!(
            second.result.unwrap().updated_context.previous_tasks,
            vec![TaskId::new("t1"), TaskId::new("t2")]
        );
    }

    #[tokio::test]
    async fn test_failed_dependency_fails_dependent_without_running() {
        let runtime = ScriptedRuntime::new();
        let state = test_state_with(Config::default(), runtime).await;

        // No backend can reach a threshold of 1.0.
        let first = state
            .scheduler
            .submit(task("t1").with_threshold(1.0))
            .await
            .unwrap();
        let second = state
            .scheduler
            .submit(task("t2").with_dependency("t1"))
            .await
            .unwrap();

        assert_eq!(first.wait_terminal().await.unwrap().status, TaskStatus::Failed);
        let events = collect(second).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, TaskStatus::Failed);
        assert_eq!(
            events[0].detail.as_deref(),
            Some("dependency failed: task t1 did not complete")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_task_times_out() {
        let config = Config {
            pending_timeout: Duration::from_secs(5),
            ..Config::default()
        };
        let state = test_state_with(config, ScriptedRuntime::new()).await;
        let stream = state
            .scheduler
            .submit(task("t2").with_dependency("missing"))
            .await
            .unwrap();

        let event = stream.wait_terminal().await.unwrap();
        assert_eq!(event.status, TaskStatus::Failed);
        assert_eq!(
            event.detail.as_deref(),
            Some("dependency wait timed out after 5s: still waiting on missing")
        );
    }

    #[tokio::test]
    async fn test_cancel_pending_task() {
        let state = test_state_with(Config::default(), ScriptedRuntime::new()).await;
        let stream = state
            .scheduler
            .submit(task("t2").with_dependency("missing"))
            .await
            .unwrap();

        stream.cancel();
        let event = stream.wait_terminal().await.unwrap();
        assert_eq!(event.status, TaskStatus::Cancelled);
        assert_eq!(state.resolver.status(&TaskId::new("t2")), Some(TaskStatus::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_stream_cancels_running_task() {
        let runtime = ScriptedRuntime::new().with_invoke_delay(Duration::from_secs(10));
        let state = test_state_with(Config::default(), runtime).await;
        let mut stream = state.scheduler.submit(task("t1")).await.unwrap();

        let running = stream.next().await.unwrap();
        assert_eq!(running.status, TaskStatus::Running);
        drop(stream);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(state.resolver.status(&TaskId::new("t1")), Some(TaskStatus::Cancelled));
        assert_eq!(state.pool.ref_count(BackendId::DeepSeek), Some(0));
    }

    #[tokio::test]
    async fn test_rejections() {
        let state = test_state_with(Config::default(), ScriptedRuntime::new()).await;
        let _stream = state
            .scheduler
            .submit(task("t1").with_dependency("missing"))
            .await
            .unwrap();

        assert!(matches!(
            state.scheduler.submit(task("t1")).await,
            Err(SchedulerError::Rejected(CoreError::DuplicateTask(_)))
        ));
        assert!(matches!(
            state.scheduler.submit(task("t3").with_threshold(1.5)).await,
            Err(SchedulerError::Rejected(CoreError::Validation(_)))
        ));

        state.scheduler.shutdown();
        assert!(matches!(
            state.scheduler.submit(task("t4")).await,
            Err(SchedulerError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_empty_id_is_generated() {
        let state = test_state_with(Config::default(), ScriptedRuntime::new()).await;
        let stream = state.scheduler.submit(task("")).await.unwrap();
        assert!(!stream.task_id().is_empty());
        assert!(stream.wait_terminal().await.unwrap().result.unwrap().success);
    }
}
