//! Context assembly.
//!
//! Builds the material a backend consumes from the session's running
//! context and retrieved memory, and folds completed results back into the
//! running context.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, warn};

use modelroute_core::{clamp_unit, Context, Task};

use crate::memory::MemoryStore;
use crate::router::PassedAttempt;

/// Everything a backend is given besides the task input itself.
#[derive(Debug, Clone, Default)]
pub struct AugmentedInput {
    /// Prior context plus retrieved document references.
    pub context: Context,

    /// References fetched from the memory store for this task.
    pub retrieved: Vec<String>,

    /// True when the memory store was unavailable.
    pub degraded: bool,

    /// Rendered context block.
    pub body: String,
}

/// Merges session history and memory into backend input.
pub struct ContextAssembler {
    memory: Arc<dyn MemoryStore>,
    max_documents: usize,
    /// Weight of the prior confidence in the running average.
    decay: f64,
}

impl ContextAssembler {
    pub fn new(memory: Arc<dyn MemoryStore>, max_documents: usize, decay: f64) -> Self {
        Self {
            memory,
            max_documents,
            decay: clamp_unit(decay),
        }
    }

    pub fn memory(&self) -> &Arc<dyn MemoryStore> {
        &self.memory
    }

    /// Assemble the augmented input for `task`.
    ///
    /// A failed memory lookup is logged and assembly proceeds with the prior
    /// context alone.
    pub async fn assemble(&self, task: &Task, prior: &Context) -> AugmentedInput {
        let (retrieved, degraded) = match self
            .memory
            .retrieve_relevant(&task.input, &prior.session_id, self.max_documents)
            .await
        {
            Ok(docs) => (docs, false),
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Memory lookup failed, continuing without it");
                (Vec::new(), true)
            }
        };

        let mut context = prior.clone();
        context.add_documents(retrieved.iter().cloned());

        debug!(
            task_id = %task.id,
            retrieved = retrieved.len(),
            metadata = context.metadata.len(),
            "Context assembled"
        );

        AugmentedInput {
            body: render_body(&context),
            context,
            retrieved,
            degraded,
        }
    }

    /// Fold a passed attempt into the prior context.
    pub fn fold(&self, task: &Task, passed: &PassedAttempt, prior: &Context) -> Context {
        let mut updated = prior.clone();
        let first = updated.previous_tasks.is_empty();

        updated.record_task(&task.id);
        for (k, v) in &passed.metadata {
            updated.metadata.insert(k.clone(), v.clone());
        }
        updated.add_documents(passed.retrieved.iter().cloned());

        let latest = clamp_unit(passed.score);
        updated.confidence_score = if first {
            latest
        } else {
            clamp_unit(self.decay * prior.confidence_score + (1.0 - self.decay) * latest)
        };
        updated
    }
}

/// Rough token count: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count();
    u32::try_from(chars.div_ceil(4)).unwrap_or(u32::MAX)
}

fn render_body(context: &Context) -> String {
    let mut body = String::new();

    if !context.metadata.is_empty() {
        let mut keys: Vec<_> = context.metadata.keys().collect();
        keys.sort();
        body.push_str("Session metadata:\n");
        for key in keys {
            let _ = writeln!(body, "- {}: {}", key, context.metadata[key]);
        }
    }

    if !context.relevant_documents.is_empty() {
        body.push_str("Relevant documents:\n");
        for doc in &context.relevant_documents {
            let _ = writeln!(body, "- {doc}");
        }
    }

    body.trim_end().to_string()
}
