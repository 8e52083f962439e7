//! Session context threaded between tasks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{SessionId, TaskId};

/// Accumulated session-scoped state: history, metadata, confidence trend and
/// retrieved documents.
///
/// Contexts are append-only across a session: each completed task produces a
/// new Context that becomes the input of the next.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Session this context belongs to.
    pub session_id: SessionId,

    /// Tasks completed in this session, oldest first.
    pub previous_tasks: Vec<TaskId>,

    /// Free-form string metadata.
    pub metadata: HashMap<String, String>,

    /// Running confidence trend in [0, 1].
    pub confidence_score: f64,

    /// References to documents relevant to the session, oldest first.
    pub relevant_documents: Vec<String>,
}

impl Context {
    /// Create an empty context for a session.
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            ..Self::default()
        }
    }

    /// Builder method to add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Append a task to the history unless it is already recorded.
    pub fn record_task(&mut self, id: &TaskId) {
        if !self.previous_tasks.contains(id) {
            self.previous_tasks.push(id.clone());
        }
    }

    /// Append document references, skipping ones already present.
    pub fn add_documents<I, S>(&mut self, docs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for doc in docs {
            let doc = doc.into();
            if !self.relevant_documents.contains(&doc) {
                self.relevant_documents.push(doc);
            }
        }
    }

    /// Merge a caller-supplied update into this context.
    ///
    /// Incoming metadata overwrites existing keys, history and documents are
    /// appended without duplicates, and a confidence score replaces the
    /// running one only when the update carries one.
    pub fn merge_from(&mut self, update: &ContextUpdate) {
        let other = &update.context;
        for (k, v) in &other.metadata {
            self.metadata.insert(k.clone(), v.clone());
        }
        for id in &other.previous_tasks {
            self.record_task(id);
        }
        self.add_documents(other.relevant_documents.iter().cloned());
        if let Some(score) = update.confidence_score {
            self.confidence_score = clamp_unit(score);
        }
    }

    /// Fold in a snapshot without overriding anything this context already
    /// knows: only missing metadata keys, history and documents are taken.
    pub fn seed_missing_from(&mut self, snapshot: &Context) {
        for (k, v) in &snapshot.metadata {
            self.metadata.entry(k.clone()).or_insert_with(|| v.clone());
        }
        for id in &snapshot.previous_tasks {
            self.record_task(id);
        }
        self.add_documents(snapshot.relevant_documents.iter().cloned());
    }
}

/// A caller-supplied change to a session's running context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextUpdate {
    /// Session, metadata, history and documents to merge.
    pub context: Context,

    /// Replacement confidence trend, if the caller set one.
    pub confidence_score: Option<f64>,
}

impl ContextUpdate {
    pub fn new(context: Context) -> Self {
        Self {
            context,
            confidence_score: None,
        }
    }

    pub fn with_confidence(mut self, score: f64) -> Self {
        self.confidence_score = Some(score);
        self
    }

    pub fn session_id(&self) -> &SessionId {
        &self.context.session_id
    }
}

/// Clamp a score into [0, 1]; NaN maps to 0.
pub fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}
