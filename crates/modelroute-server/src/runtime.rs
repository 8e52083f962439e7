//! Backend inference runtime.
//!
//! The engine treats inference as an opaque call: load a backend, hand it a
//! rendered prompt, get back text and a self-reported confidence.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use modelroute_core::{BackendId, ModelCapabilities};

use crate::pool::LoadError;
use crate::registry::BackendProfile;

/// Runtime failure during an invocation.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Backend {backend} failed: {reason}")]
    Runtime { backend: BackendId, reason: String },

    #[error("Backend {backend} timed out after {timeout:?}")]
    Timeout { backend: BackendId, timeout: Duration },

    #[error("Backend {0} is not loaded")]
    NotLoaded(BackendId),
}

/// Raw output of one invocation.
#[derive(Debug, Clone, Default)]
pub struct Inference {
    pub text: String,

    /// Self-reported confidence, not yet clamped.
    pub confidence: f64,

    /// Backend-reported metadata, merged into the session context on success.
    pub metadata: HashMap<String, String>,
}

impl Inference {
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// An inference runtime hosting backend instances.
#[async_trait]
pub trait ModelRuntime: Send + Sync {
    /// Bring a backend into memory.
    async fn load(&self, backend: BackendId, profile: &BackendProfile) -> Result<(), LoadError>;

    /// Release a backend's memory. Best effort.
    async fn unload(&self, backend: BackendId);

    /// Run a rendered prompt through a loaded backend.
    async fn invoke(&self, backend: BackendId, prompt: &str) -> Result<Inference, BackendError>;
}

/// Deterministic development runtime.
///
/// Answers from a small table of canned responses keyed on words in the
/// prompt, and reports a confidence inside the backend's declared range.
pub struct MockRuntime {
    load_latency: Duration,
    invoke_latency: Duration,
    loaded: Mutex<HashMap<BackendId, ModelCapabilities>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self {
            load_latency: Duration::from_millis(50),
            invoke_latency: Duration::from_millis(20),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Builder method to set simulated latencies.
    pub fn with_latency(mut self, load: Duration, invoke: Duration) -> Self {
        self.load_latency = load;
        self.invoke_latency = invoke;
        self
    }

    fn loaded_capabilities(&self, backend: BackendId) -> Option<ModelCapabilities> {
        self.loaded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&backend)
            .cloned()
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelRuntime for MockRuntime {
    async fn load(&self, backend: BackendId, profile: &BackendProfile) -> Result<(), LoadError> {
        tokio::time::sleep(self.load_latency).await;
        self.loaded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(backend, profile.capabilities.clone());
        debug!(backend = %backend, "Mock backend loaded");
        Ok(())
    }

    async fn unload(&self, backend: BackendId) {
        self.loaded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&backend);
        debug!(backend = %backend, "Mock backend unloaded");
    }

    async fn invoke(&self, backend: BackendId, prompt: &str) -> Result<Inference, BackendError> {
        let caps = self
            .loaded_capabilities(backend)
            .ok_or(BackendError::NotLoaded(backend))?;
        tokio::time::sleep(self.invoke_latency).await;

        let question = last_user_turn(prompt);
        let text = canned_response(question);

        // Land in the upper part of the declared range, varying with the prompt.
        let spread = caps.max_confidence - caps.min_confidence;
        let frac = (fnv1a(prompt) % 1000) as f64 / 1000.0;
        let confidence = caps.min_confidence + spread * (0.6 + 0.4 * frac);

        Ok(Inference::new(text, confidence).with_metadata("last_backend", backend.as_str()))
    }
}

/// The text of the last user turn in a ChatML prompt, or the whole prompt.
fn last_user_turn(prompt: &str) -> &str {
    prompt
        .rsplit("<|im_start|>user\n")
        .next()
        .and_then(|turn| turn.split("<|im_end|>").next())
        .unwrap_or(prompt)
        .trim()
}

fn canned_response(input: &str) -> String {
    let lower = input.to_lowercase();
    let has_word = |w: &str| lower.split(|c: char| !c.is_alphanumeric()).any(|t| t == w);

    if lower.contains("1+1") || lower.contains("1 + 1") {
        "1 + 1 = 2".to_string()
    } else if lower.contains("2+2") || lower.contains("2 + 2") {
        "2 + 2 = 4".to_string()
    } else if has_word("hello") || has_word("hi") || has_word("hey") {
        "Hello! How can I help you today?".to_string()
    } else if lower.contains("how are you") {
        "I'm doing well, thank you for asking! How can I assist you today?".to_string()
    } else if lower.contains("thank") {
        "You're welcome! Is there anything else you'd like to know?".to_string()
    } else if lower.contains("python") && lower.contains("function") {
        "def my_function(param1, param2):\n    result = param1 + param2\n    return result"
            .to_string()
    } else if lower.contains("code") && (lower.contains("generate") || lower.contains("write")) {
        "function debounce(func, wait) {\n  let timeout;\n  return (...args) => {\n    clearTimeout(timeout);\n    timeout = setTimeout(() => func(...args), wait);\n  };\n}"
            .to_string()
    } else if input.contains('?') {
        format!("That's an interesting question! {input} It depends on the specific context.")
    } else {
        format!("You said: {input}\n\nI understand your request and will process it accordingly.")
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelroute_core::TaskType;

    fn profile(backend: BackendId) -> BackendProfile {
        BackendProfile::new(
            ModelCapabilities::new(backend)
                .with_tasks([TaskType::GeneralConversation])
                .with_confidence_range(0.3, 0.8),
            100,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_requires_load() {
        let runtime = MockRuntime::new();
        let err = runtime.invoke(BackendId::Phi, "hi").await.unwrap_err();
        assert!(matches!(err, BackendError::NotLoaded(BackendId::Phi)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_is_deterministic_and_in_range() {
        let runtime = MockRuntime::new();
        runtime.load(BackendId::Phi, &profile(BackendId::Phi)).await.unwrap();

        let prompt = "<|im_start|>system\nbe nice<|im_end|>\n<|im_start|>user\nhello there<|im_end|>\n";
        let a = runtime.invoke(BackendId::Phi, prompt).await.unwrap();
        let b = runtime.invoke(BackendId::Phi, prompt).await.unwrap();

        assert_eq!(a.text, "Hello! How can I help you today?");
        assert_eq!(a.confidence, b.confidence);
        assert!((0.3..=0.8).contains(&a.confidence));

        runtime.unload(BackendId::Phi).await;
        assert!(runtime.invoke(BackendId::Phi, prompt).await.is_err());
    }
}
