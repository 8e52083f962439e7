//! Model resource pool.
//!
//! A bounded cache of resident backend instances. Callers lease a handle for
//! the duration of one invocation; loading evicts least-recently-used idle
//! handles when the memory budget requires it, and waits when nothing can be
//! evicted.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use modelroute_core::BackendId;

use crate::registry::{BackendProfile, CapabilityRegistry};
use crate::runtime::ModelRuntime;

/// A backend failed to load.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("Failed to load {backend}: {reason}")]
    Runtime { backend: BackendId, reason: String },

    #[error("{backend} needs {cost_mb} MB, more than the whole {budget_mb} MB budget")]
    ExceedsBudget {
        backend: BackendId,
        cost_mb: u64,
        budget_mb: u64,
    },

    #[error("{0} is not in the registry")]
    Unregistered(BackendId),
}

/// Pool errors.
#[derive(Debug, Clone, Error)]
pub enum PoolError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Timed out after {waited:?} waiting for a slot for {backend}")]
    Timeout { backend: BackendId, waited: Duration },

    #[error("Resource pool is draining")]
    Draining,
}

/// A resident backend instance.
#[derive(Debug)]
struct ResidentHandle {
    loaded_at: DateTime<Utc>,
    last_used: Instant,
    ref_count: u32,
    cost_mb: u64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PoolCounters {
    pub loads: u64,
    pub load_failures: u64,
    pub evictions: u64,
}

#[derive(Default)]
struct PoolInner {
    resident: HashMap<BackendId, ResidentHandle>,
    /// Memory held for loads in flight.
    reserved_mb: u64,
    pinned: HashSet<BackendId>,
    loading: HashSet<BackendId>,
    /// Evicted backends whose memory is held until their unload returns.
    unloading: HashMap<BackendId, u64>,
    draining: bool,
    counters: PoolCounters,
}

impl PoolInner {
    fn committed_mb(&self) -> u64 {
        self.resident.values().map(|h| h.cost_mb).sum::<u64>()
            + self.unloading.values().sum::<u64>()
            + self.reserved_mb
    }
}

/// Point-in-time view of one resident handle.
#[derive(Debug, Clone)]
pub struct HandleSnapshot {
    pub backend: BackendId,
    pub ref_count: u32,
    pub cost_mb: u64,
    pub pinned: bool,
    pub loaded_at: DateTime<Utc>,
    pub idle: Duration,
}

/// Aggregate pool figures.
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub budget_mb: u64,
    pub resident_mb: u64,
    pub reserved_mb: u64,
    pub counters: PoolCounters,
}

enum Step {
    Leased,
    Load {
        profile: BackendProfile,
        victims: Vec<BackendId>,
    },
    Wait,
}

/// Bounded set of resident backends.
pub struct ModelResourcePool {
    budget_mb: u64,
    acquire_timeout: Duration,
    runtime: Arc<dyn ModelRuntime>,
    registry: Arc<CapabilityRegistry>,
    inner: Mutex<PoolInner>,
    changed: Notify,
}

impl ModelResourcePool {
    /// Create a pool.
    pub fn new(
        budget_mb: u64,
        acquire_timeout: Duration,
        runtime: Arc<dyn ModelRuntime>,
        registry: Arc<CapabilityRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            budget_mb,
            acquire_timeout,
            runtime,
            registry,
            inner: Mutex::new(PoolInner::default()),
            changed: Notify::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn runtime(&self) -> &Arc<dyn ModelRuntime> {
        &self.runtime
    }

    /// Lease a resident handle for `backend`, loading it if needed.
    ///
    /// Waits up to the acquire timeout when the budget is fully held by
    /// pinned or referenced handles.
    pub async fn acquire(self: &Arc<Self>, backend: BackendId) -> Result<ModelLease, PoolError> {
        let deadline = Instant::now() + self.acquire_timeout;

        loop {
            // Register interest before inspecting state so no release is missed.
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.plan(backend)? {
                Step::Leased => {
                    debug!(backend = %backend, "Leased resident handle");
                    return Ok(ModelLease::new(Arc::clone(self), backend));
                }
                Step::Load { profile, victims } => {
                    // The load runs detached: if this caller goes away, the
                    // backend still ends up tracked and the lease is dropped.
                    let pool = Arc::clone(self);
                    let load = tokio::spawn(async move { pool.load(backend, profile, victims).await });
                    return match load.await {
                        Ok(result) => result,
                        Err(e) => Err(LoadError::Runtime {
                            backend,
                            reason: e.to_string(),
                        }
                        .into()),
                    };
                }
                Step::Wait => {
                    debug!(backend = %backend, "No room in pool, waiting");
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                warn!(backend = %backend, "Timed out waiting for pool slot");
                return Err(PoolError::Timeout {
                    backend,
                    waited: self.acquire_timeout,
                });
            }
        }
    }

    /// Decide what an acquire should do, committing any state change.
    fn plan(&self, backend: BackendId) -> Result<Step, PoolError> {
        let profile = self.registry.profile(backend);
        let mut inner = self.lock();

        if inner.draining {
            return Err(PoolError::Draining);
        }

        if let Some(handle) = inner.resident.get_mut(&backend) {
            handle.ref_count += 1;
            handle.last_used = Instant::now();
            return Ok(Step::Leased);
        }

        // One load or unload per backend at a time.
        if inner.loading.contains(&backend) || inner.unloading.contains_key(&backend) {
            return Ok(Step::Wait);
        }

        let profile = profile.ok_or(LoadError::Unregistered(backend))?;
        let cost = profile.memory_cost_mb;
        if cost > self.budget_mb {
            return Err(LoadError::ExceedsBudget {
                backend,
                cost_mb: cost,
                budget_mb: self.budget_mb,
            }
            .into());
        }

        let committed = inner.committed_mb();
        let mut victims = Vec::new();
        if committed + cost > self.budget_mb {
            let mut idle: Vec<(&BackendId, &ResidentHandle)> = inner
                .resident
                .iter()
                .filter(|(id, h)| h.ref_count == 0 && !inner.pinned.contains(*id))
                .collect();
            idle.sort_by_key(|(_, h)| h.last_used);

            let mut freed = 0;
            for (id, h) in idle {
                if committed - freed + cost <= self.budget_mb {
                    break;
                }
                freed += h.cost_mb;
                victims.push(*id);
            }

            if committed - freed + cost > self.budget_mb {
                // Evicting every idle handle would not make room.
                return Ok(Step::Wait);
            }

            for id in &victims {
                if let Some(h) = inner.resident.remove(id) {
                    inner.unloading.insert(*id, h.cost_mb);
                }
                inner.counters.evictions += 1;
            }
            info!(backend = %backend, victims = ?victims, "Evicting idle backends");
        }

        inner.reserved_mb += cost;
        inner.loading.insert(backend);
        Ok(Step::Load { profile, victims })
    }

    async fn load(
        self: Arc<Self>,
        backend: BackendId,
        profile: BackendProfile,
        victims: Vec<BackendId>,
    ) -> Result<ModelLease, PoolError> {
        let cost = profile.memory_cost_mb;
        let reservation = Reservation {
            pool: self.as_ref(),
            backend,
            cost,
            armed: true,
        };

        for victim in victims {
            self.runtime.unload(victim).await;
            self.finish_unload(victim);
        }

        let started = Instant::now();
        match self.runtime.load(backend, &profile).await {
            Ok(()) => {
                reservation.commit(ResidentHandle {
                    loaded_at: Utc::now(),
                    last_used: Instant::now(),
                    ref_count: 1,
                    cost_mb: cost,
                });
                info!(
                    backend = %backend,
                    cost_mb = cost,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Backend loaded"
                );
                Ok(ModelLease::new(Arc::clone(&self), backend))
            }
            Err(e) => {
                drop(reservation);
                self.lock().counters.load_failures += 1;
                warn!(backend = %backend, error = %e, "Backend load failed");
                Err(e.into())
            }
        }
    }

    fn finish_unload(&self, backend: BackendId) {
        self.lock().unloading.remove(&backend);
        debug!(backend = %backend, "Backend unloaded");
        self.changed.notify_waiters();
    }

    fn release_ref(&self, backend: BackendId) {
        {
            let mut inner = self.lock();
            if let Some(handle) = inner.resident.get_mut(&backend) {
                handle.ref_count = handle.ref_count.saturating_sub(1);
                handle.last_used = Instant::now();
            }
        }
        self.changed.notify_waiters();
    }

    /// Return a lease. Equivalent to dropping it.
    pub fn release(&self, lease: ModelLease) {
        drop(lease);
    }

    /// Exempt a backend from eviction.
    pub fn pin(&self, backend: BackendId) {
        self.lock().pinned.insert(backend);
        debug!(backend = %backend, "Backend pinned");
    }

    /// Make a backend evictable again.
    pub fn unpin(&self, backend: BackendId) {
        self.lock().pinned.remove(&backend);
        debug!(backend = %backend, "Backend unpinned");
        self.changed.notify_waiters();
    }

    /// Load a backend and release it straight away.
    pub async fn warm(self: &Arc<Self>, backend: BackendId) -> Result<(), PoolError> {
        let lease = self.acquire(backend).await?;
        self.release(lease);
        Ok(())
    }

    /// Reference count of a resident backend.
    pub fn ref_count(&self, backend: BackendId) -> Option<u32> {
        self.lock().resident.get(&backend).map(|h| h.ref_count)
    }

    pub fn is_resident(&self, backend: BackendId) -> bool {
        self.lock().resident.contains_key(&backend)
    }

    /// Sum of resident handles' memory cost.
    pub fn resident_cost(&self) -> u64 {
        self.lock().resident.values().map(|h| h.cost_mb).sum()
    }

    pub fn budget_mb(&self) -> u64 {
        self.budget_mb
    }

    pub fn snapshot(&self) -> Vec<HandleSnapshot> {
        let inner = self.lock();
        let now = Instant::now();
        let mut handles: Vec<_> = inner
            .resident
            .iter()
            .map(|(backend, h)| HandleSnapshot {
                backend: *backend,
                ref_count: h.ref_count,
                cost_mb: h.cost_mb,
                pinned: inner.pinned.contains(backend),
                loaded_at: h.loaded_at,
                idle: now.saturating_duration_since(h.last_used),
            })
            .collect();
        handles.sort_by_key(|h| h.backend);
        handles
    }

    pub fn stats(&self) -> PoolStats {
        let inner = self.lock();
        PoolStats {
            budget_mb: self.budget_mb,
            resident_mb: inner.resident.values().map(|h| h.cost_mb).sum(),
            reserved_mb: inner.reserved_mb,
            counters: inner.counters,
        }
    }

    /// Stop new acquires, unload everything, and wait for outstanding
    /// leases to come back.
    pub async fn drain(&self) {
        self.lock().draining = true;
        self.changed.notify_waiters();
        info!("Draining resource pool");

        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (idle, busy) = {
                let mut inner = self.lock();
                let idle: Vec<BackendId> = inner
                    .resident
                    .iter()
                    .filter(|(_, h)| h.ref_count == 0)
                    .map(|(id, _)| *id)
                    .collect();
                for id in &idle {
                    if let Some(h) = inner.resident.remove(id) {
                        inner.unloading.insert(*id, h.cost_mb);
                    }
                }
                let busy = !inner.resident.is_empty()
                    || !inner.loading.is_empty()
                    || !inner.unloading.is_empty();
                (idle, busy)
            };

            if idle.is_empty() && !busy {
                break;
            }

            for backend in &idle {
                self.runtime.unload(*backend).await;
                self.finish_unload(*backend);
            }

            if idle.is_empty() {
                notified.await;
            }
        }

        info!("Resource pool drained");
    }
}

/// Memory held for a load in flight. Dropped unused, it gives the memory
/// back; committed, it becomes the resident handle under the same lock.
struct Reservation<'a> {
    pool: &'a ModelResourcePool,
    backend: BackendId,
    cost: u64,
    armed: bool,
}

impl Reservation<'_> {
    fn settle(&self, inner: &mut PoolInner) {
        inner.reserved_mb = inner.reserved_mb.saturating_sub(self.cost);
        inner.loading.remove(&self.backend);
    }

    fn commit(mut self, handle: ResidentHandle) {
        let mut inner = self.pool.lock();
        self.settle(&mut inner);
        inner.resident.insert(self.backend, handle);
        inner.counters.loads += 1;
        drop(inner);
        self.armed = false;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut inner = self.pool.lock();
            self.settle(&mut inner);
        }
        self.pool.changed.notify_waiters();
    }
}

/// A leased reference to a resident backend. Dropping it releases the
/// reference.
pub struct ModelLease {
    pool: Arc<ModelResourcePool>,
    backend: BackendId,
}

impl ModelLease {
    fn new(pool: Arc<ModelResourcePool>, backend: BackendId) -> Self {
        Self { pool, backend }
    }

    pub fn backend(&self) -> BackendId {
        self.backend
    }
}

impl std::fmt::Debug for ModelLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLease")
            .field("backend", &self.backend)
            .finish()
    }
}

impl Drop for ModelLease {
    fn drop(&mut self) {
        self.pool.release_ref(self.backend);
    }
}
