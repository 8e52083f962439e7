//! Session memory store.
//!
//! Remembers completed interactions per session and retrieves the ones most
//! relevant to a new input. Retrieval failures are expected and degrade
//! context assembly rather than failing tasks.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use modelroute_core::{SessionId, TaskId};

/// The memory store could not be reached.
#[derive(Debug, Clone, Error)]
#[error("Memory store unavailable: {0}")]
pub struct MemoryUnavailable(pub String);

/// A similarity-searchable store of past interactions.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Document references relevant to `text`, best match first.
    async fn retrieve_relevant(
        &self,
        text: &str,
        session: &SessionId,
        limit: usize,
    ) -> Result<Vec<String>, MemoryUnavailable>;

    /// Store a completed prompt/response interaction.
    async fn remember(
        &self,
        session: &SessionId,
        task_id: &TaskId,
        prompt: &str,
        response: &str,
    ) -> Result<(), MemoryUnavailable>;
}

struct Shard {
    terms: HashSet<String>,
}

/// In-process memory store scoring shards by token overlap.
///
/// Shard references have the form `memory://<session>/<task_id>`.
pub struct InMemoryStore {
    sessions: RwLock<HashMap<SessionId, Vec<(TaskId, Shard)>>>,
    online: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
        }
    }

    /// Take the store offline or back online.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), MemoryUnavailable> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MemoryUnavailable("store is offline".to_string()))
        }
    }

    pub fn shard_ref(session: &SessionId, task_id: &TaskId) -> String {
        format!("memory://{session}/{task_id}")
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn retrieve_relevant(
        &self,
        text: &str,
        session: &SessionId,
        limit: usize,
    ) -> Result<Vec<String>, MemoryUnavailable> {
        self.check_online()?;

        let query = terms(text);
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let sessions = self.sessions.read().await;
        let Some(shards) = sessions.get(session) else {
            return Ok(Vec::new());
        };

        // Newest first so equal scores favour recent interactions.
        let mut scored: Vec<(usize, usize, &TaskId)> = shards
            .iter()
            .enumerate()
            .rev()
            .map(|(i, (id, shard))| (shard.terms.intersection(&query).count(), i, id))
            .filter(|(score, _, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, _, id)| Self::shard_ref(session, id))
            .collect())
    }

    async fn remember(
        &self,
        session: &SessionId,
        task_id: &TaskId,
        prompt: &str,
        response: &str,
    ) -> Result<(), MemoryUnavailable> {
        self.check_online()?;

        let mut all = terms(prompt);
        all.extend(terms(response));

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session.clone())
            .or_default()
            .push((task_id.clone(), Shard { terms: all }));
        Ok(())
    }
}
