//! Running context per session.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use modelroute_core::{Context, ContextUpdate, SessionId, Task};

/// Holds each session's running context.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Context>>,
}

/// The session's running context with the task's snapshot filling gaps. A
/// session seen for the first time starts from the snapshot's confidence.
fn prior_for(running: Option<&Context>, task: &Task) -> Context {
    let mut prior = match running {
        Some(running) => running.clone(),
        None => {
            let mut fresh = Context::new(task.context.session_id.clone());
            fresh.confidence_score = task.context.confidence_score;
            fresh
        }
    };
    prior.seed_missing_from(&task.context);
    prior
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current running context for a session.
    pub async fn get(&self, session: &SessionId) -> Context {
        self.sessions
            .read()
            .await
            .get(session)
            .cloned()
            .unwrap_or_else(|| Context::new(session.clone()))
    }

    /// Merge a caller-supplied update into the session and return the result.
    pub async fn merge(&self, update: &ContextUpdate) -> Context {
        let session = update.session_id();
        let mut sessions = self.sessions.write().await;
        let running = sessions
            .entry(session.clone())
            .or_insert_with(|| Context::new(session.clone()));
        running.merge_from(update);
        debug!(
            session_id = %session,
            metadata = running.metadata.len(),
            "Session context updated"
        );
        running.clone()
    }

    /// The context a task should run with: the session's running context,
    /// plus whatever the task's own snapshot adds that the session lacks.
    pub async fn effective_prior(&self, task: &Task) -> Context {
        let sessions = self.sessions.read().await;
        prior_for(sessions.get(&task.context.session_id), task)
    }

    /// Fold a completed task into the session's running context as it is
    /// now, not as it was when the task started, and publish the result.
    ///
    /// `fold` runs under the write lock, so updates and other tasks that
    /// finished in the meantime are kept.
    pub async fn fold_with<F>(&self, task: &Task, fold: F) -> Context
    where
        F: FnOnce(&Context) -> Context,
    {
        let session = &task.context.session_id;
        let mut sessions = self.sessions.write().await;
        let updated = fold(&prior_for(sessions.get(session), task));
        sessions.insert(session.clone(), updated.clone());
        updated
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelroute_core::{TaskId, TaskType};

    fn record(task: &Task) -> impl FnOnce(&Context) -> Context + '_ {
        move |running| {
            let mut next = running.clone();
            next.record_task(&task.id);
            next
        }
    }

    #[tokio::test]
    async fn test_merge_then_effective_prior_sees_metadata() {
        let store = SessionStore::new();
        let session = SessionId::new("s1");

        store
            .merge(&ContextUpdate::new(
                Context::new(session.clone()).with_metadata("lang", "rust"),
            ))
            .await;

        let task = Task::new(TaskType::Generation, "x").with_context(
            Context::new(session.clone())
                .with_metadata("lang", "go")
                .with_metadata("editor", "helix"),
        );
        let prior = store.effective_prior(&task).await;

        // The session wins on conflicts; the snapshot fills gaps.
        assert_eq!(prior.metadata.get("lang"), Some(&"rust".to_string()));
        assert_eq!(prior.metadata.get("editor"), Some(&"helix".to_string()));
    }

    #[tokio::test]
    async fn test_new_session_starts_from_snapshot_confidence() {
        let store = SessionStore::new();
        let mut snapshot = Context::new(SessionId::new("s1"));
        snapshot.confidence_score = 0.6;
        let task = Task::new(TaskType::Generation, "x").with_context(snapshot);

        assert_eq!(store.effective_prior(&task).await.confidence_score, 0.6);

        // Once the session exists its own trend wins, even at zero.
        store
            .merge(&ContextUpdate::new(Context::new(SessionId::new("s1"))).with_confidence(0.0))
            .await;
        assert_eq!(store.effective_prior(&task).await.confidence_score, 0.0);
    }

    #[tokio::test]
    async fn test_fold_with_keeps_changes_made_since_start() {
        let store = SessionStore::new();
        let session = SessionId::new("s1");
        let t1 = Task::new(TaskType::Generation, "a")
            .with_id("t1")
            .with_context(Context::new(session.clone()));
        let t2 = Task::new(TaskType::Generation, "b")
            .with_id("t2")
            .with_context(Context::new(session.clone()));

        // Both tasks start from the same empty prior.
        let _ = store.effective_prior(&t1).await;
        let _ = store.effective_prior(&t2).await;

        store.fold_with(&t1, record(&t1)).await;
        store
            .merge(&ContextUpdate::new(
                Context::new(session.clone()).with_metadata("lang", "rust"),
            ))
            .await;
        let folded = store.fold_with(&t2, record(&t2)).await;

        assert_eq!(
            folded.previous_tasks,
            vec![TaskId::new("t1"), TaskId::new("t2")]
        );
        assert_eq!(folded.metadata.get("lang"), Some(&"rust".to_string()));
        assert_eq!(store.get(&session).await, folded);
        assert_eq!(store.len().await, 1);
        // Unknown sessions start empty.
        assert!(store.get(&SessionId::new("nope")).await.previous_tasks.is_empty());
    }
}
