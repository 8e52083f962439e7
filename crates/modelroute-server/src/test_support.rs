//! Scripted runtime for driving the engine deterministically in tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use modelroute_core::BackendId;

use crate::pool::LoadError;
use crate::registry::BackendProfile;
use crate::runtime::{BackendError, Inference, ModelRuntime};

enum Reply {
    Confidence(f64),
    Fail(String),
}

pub(crate) struct ScriptedRuntime {
    replies: Mutex<HashMap<BackendId, VecDeque<Reply>>>,
    failing_loads: Mutex<HashSet<BackendId>>,
    load_delay: Duration,
    invoke_delay: Duration,
    unload_delay: Duration,
    /// Memory the runtime itself holds, from load start to unload end.
    held_mb: Mutex<HashMap<BackendId, u64>>,
    peak_held_mb: AtomicU64,
    loads: Mutex<Vec<BackendId>>,
    unloads: Mutex<Vec<BackendId>>,
    invocations: Mutex<Vec<(BackendId, String)>>,
    loading_now: AtomicUsize,
    max_loading: AtomicUsize,
}

impl ScriptedRuntime {
    /// Unscripted invocations answer with confidence 0.9.
    pub const DEFAULT_CONFIDENCE: f64 = 0.9;

    pub fn new() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            failing_loads: Mutex::new(HashSet::new()),
            load_delay: Duration::ZERO,
            invoke_delay: Duration::ZERO,
            unload_delay: Duration::ZERO,
            held_mb: Mutex::new(HashMap::new()),
            peak_held_mb: AtomicU64::new(0),
            loads: Mutex::new(Vec::new()),
            unloads: Mutex::new(Vec::new()),
            invocations: Mutex::new(Vec::new()),
            loading_now: AtomicUsize::new(0),
            max_loading: AtomicUsize::new(0),
        }
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn with_invoke_delay(mut self, delay: Duration) -> Self {
        self.invoke_delay = delay;
        self
    }

    pub fn with_unload_delay(mut self, delay: Duration) -> Self {
        self.unload_delay = delay;
        self
    }

    /// Queue a reply with the given raw confidence.
    pub fn reply(&self, backend: BackendId, confidence: f64) {
        self.push(backend, Reply::Confidence(confidence));
    }

    /// Queue a runtime failure.
    pub fn fail(&self, backend: BackendId, reason: &str) {
        self.push(backend, Reply::Fail(reason.to_string()));
    }

    pub fn fail_load(&self, backend: BackendId) {
        self.failing_loads.lock().unwrap().insert(backend);
    }

    fn push(&self, backend: BackendId, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(backend)
            .or_default()
            .push_back(reply);
    }

    pub fn loads(&self) -> Vec<BackendId> {
        self.loads.lock().unwrap().clone()
    }

    pub fn unloads(&self) -> Vec<BackendId> {
        self.unloads.lock().unwrap().clone()
    }

    /// Backends invoked, in order.
    pub fn invocations(&self) -> Vec<BackendId> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .map(|(b, _)| *b)
            .collect()
    }

    /// Prompts seen, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn max_concurrent_loads(&self) -> usize {
        self.max_loading.load(Ordering::SeqCst)
    }

    /// Highest memory the runtime held at once.
    pub fn peak_held_mb(&self) -> u64 {
        self.peak_held_mb.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelRuntime for ScriptedRuntime {
    async fn load(&self, backend: BackendId, profile: &BackendProfile) -> Result<(), LoadError> {
        {
            let mut held = self.held_mb.lock().unwrap();
            held.insert(backend, profile.memory_cost_mb);
            self.peak_held_mb
                .fetch_max(held.values().sum(), Ordering::SeqCst);
        }
        let now = self.loading_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_loading.fetch_max(now, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        self.loading_now.fetch_sub(1, Ordering::SeqCst);

        if self.failing_loads.lock().unwrap().contains(&backend) {
            self.held_mb.lock().unwrap().remove(&backend);
            return Err(LoadError::Runtime {
                backend,
                reason: "scripted load failure".to_string(),
            });
        }
        self.loads.lock().unwrap().push(backend);
        Ok(())
    }

    async fn unload(&self, backend: BackendId) {
        if !self.unload_delay.is_zero() {
            tokio::time::sleep(self.unload_delay).await;
        }
        self.held_mb.lock().unwrap().remove(&backend);
        self.unloads.lock().unwrap().push(backend);
    }

    async fn invoke(&self, backend: BackendId, prompt: &str) -> Result<Inference, BackendError> {
        self.invocations
            .lock()
            .unwrap()
            .push((backend, prompt.to_string()));
        if !self.invoke_delay.is_zero() {
            tokio::time::sleep(self.invoke_delay).await;
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&backend)
            .and_then(VecDeque::pop_front);
        match reply.unwrap_or(Reply::Confidence(Self::DEFAULT_CONFIDENCE)) {
            Reply::Confidence(confidence) => Ok(Inference::new(
                format!("{backend} answer"),
                confidence,
            )
            .with_metadata("answered_by", backend.as_str())),
            Reply::Fail(reason) => Err(BackendError::Runtime { backend, reason }),
        }
    }
}
