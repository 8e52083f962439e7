//! Model capability registry.
//!
//! A read-only table of what each backend can do. The table is published as
//! a whole behind an `Arc`; a reload builds a complete new table and swaps
//! the pointer, so readers never see a partially-updated registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use modelroute_core::{BackendId, ModelCapabilities, TaskType};

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read registry file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse registry: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid registry: {0}")]
    Invalid(String),

    #[error("Registry has no source file to reload from")]
    NoSource,
}

/// A registry entry: declared capabilities plus load hints for the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendProfile {
    #[serde(flatten)]
    pub capabilities: ModelCapabilities,

    /// Estimated resident memory once loaded, in megabytes.
    pub memory_cost_mb: u64,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

impl BackendProfile {
    /// Create a profile from capabilities and a memory estimate.
    pub fn new(capabilities: ModelCapabilities, memory_cost_mb: u64) -> Self {
        Self {
            capabilities,
            memory_cost_mb,
            description: String::new(),
        }
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn backend(&self) -> BackendId {
        self.capabilities.backend
    }
}

#[derive(Deserialize)]
struct RegistryFile {
    backends: Vec<BackendProfile>,
}

/// One immutable snapshot of the registry.
#[derive(Debug, Clone)]
pub struct RegistryTable {
    profiles: HashMap<BackendId, BackendProfile>,
    /// Candidates per task type, best first.
    ranked: HashMap<TaskType, Vec<BackendId>>,
}

impl RegistryTable {
    /// Build a table, validating every entry.
    pub fn new(profiles: impl IntoIterator<Item = BackendProfile>) -> Result<Self, RegistryError> {
        let mut by_backend = HashMap::new();
        for profile in profiles {
            profile
                .capabilities
                .validate()
                .map_err(|e| RegistryError::Invalid(e.to_string()))?;
            let backend = profile.backend();
            if by_backend.insert(backend, profile).is_some() {
                return Err(RegistryError::Invalid(format!(
                    "backend {backend} declared twice"
                )));
            }
        }

        let mut ranked = HashMap::new();
        for task_type in TaskType::ALL {
            let mut candidates: Vec<&ModelCapabilities> = by_backend
                .values()
                .map(|p| &p.capabilities)
                .filter(|c| c.supports(task_type))
                .collect();
            candidates.sort_by(|a, b| {
                b.max_confidence
                    .total_cmp(&a.max_confidence)
                    .then(a.average_latency_ms.cmp(&b.average_latency_ms))
                    .then(a.backend.cmp(&b.backend))
            });
            ranked.insert(task_type, candidates.iter().map(|c| c.backend).collect());
        }

        Ok(Self {
            profiles: by_backend,
            ranked,
        })
    }

    /// Parse a table from its JSON form: `{"backends": [ ... ]}`.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = serde_json::from_str(json)?;
        Self::new(file.backends)
    }

    /// Read and parse a table from a JSON file.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let json = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// The table shipped with the server, mirroring the stock model set.
    pub fn builtin() -> Self {
        use TaskType::*;

        let profiles = [
            BackendProfile::new(
                ModelCapabilities::new(BackendId::Friday)
                    .with_tasks([Explanation, GeneralConversation, Documentation])
                    .with_confidence_range(0.3, 0.85)
                    .with_max_tokens(8192)
                    .with_average_latency_ms(1_200),
                6_000,
            )
            .with_description("Conversational persona model"),
            BackendProfile::new(
                ModelCapabilities::new(BackendId::DeepSeek)
                    .with_tasks([Generation, Debugging, TestGeneration, Explanation, Documentation])
                    .with_confidence_range(0.4, 0.95)
                    .with_max_tokens(16384)
                    .with_average_latency_ms(2_500),
                7_200,
            )
            .with_description("Code specialist"),
            BackendProfile::new(
                ModelCapabilities::new(BackendId::Huginn)
                    .with_tasks([GeneralConversation, Explanation, Generation])
                    .with_confidence_range(0.1, 0.6)
                    .with_max_tokens(2048)
                    .with_average_latency_ms(300),
                1_200,
            )
            .with_description("Small fast chat model"),
            BackendProfile::new(
                ModelCapabilities::new(BackendId::Mixtral)
                    .with_tasks([Explanation, GeneralConversation, Documentation, Generation])
                    .with_confidence_range(0.4, 0.9)
                    .with_max_tokens(32768)
                    .with_average_latency_ms(4_000),
                26_000,
            )
            .with_description("General knowledge model"),
            BackendProfile::new(
                ModelCapabilities::new(BackendId::Phi)
                    .with_tasks([GeneralConversation, Documentation, Explanation])
                    .with_confidence_range(0.3, 0.8)
                    .with_max_tokens(4096)
                    .with_average_latency_ms(800),
                2_800,
            )
            .with_description("Natural-language specialist"),
        ];

        // The builtin entries are well-formed; an empty table is the fallback.
        Self::new(profiles).unwrap_or_else(|_| Self {
            profiles: HashMap::new(),
            ranked: HashMap::new(),
        })
    }

    pub fn profile(&self, backend: BackendId) -> Option<&BackendProfile> {
        self.profiles.get(&backend)
    }

    pub fn capabilities(&self, backend: BackendId) -> Option<&ModelCapabilities> {
        self.profiles.get(&backend).map(|p| &p.capabilities)
    }

    /// Backends accepting `task_type`, ordered by declared quality
    /// (max confidence) descending, ties broken by lower average latency.
    pub fn supporting(&self, task_type: TaskType) -> &[BackendId] {
        self.ranked
            .get(&task_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All profiles, in backend order.
    pub fn profiles(&self) -> Vec<&BackendProfile> {
        let mut all: Vec<_> = self.profiles.values().collect();
        all.sort_by_key(|p| p.backend());
        all
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Shared, hot-reloadable registry.
pub struct CapabilityRegistry {
    table: RwLock<Arc<RegistryTable>>,
    source: Option<PathBuf>,
}

impl CapabilityRegistry {
    /// Create a registry over a fixed table.
    pub fn new(table: RegistryTable) -> Self {
        Self {
            table: RwLock::new(Arc::new(table)),
            source: None,
        }
    }

    /// Load a registry from a JSON file, remembering the path for reloads.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let table = RegistryTable::load(&path)?;
        Ok(Self {
            table: RwLock::new(Arc::new(table)),
            source: Some(path),
        })
    }

    /// Current snapshot. Hold on to it for a consistent view across lookups.
    pub fn table(&self) -> Arc<RegistryTable> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn capabilities_of(&self, backend: BackendId) -> Option<ModelCapabilities> {
        self.table().capabilities(backend).cloned()
    }

    pub fn profile(&self, backend: BackendId) -> Option<BackendProfile> {
        self.table().profile(backend).cloned()
    }

    pub fn backends_supporting(&self, task_type: TaskType) -> Vec<BackendId> {
        self.table().supporting(task_type).to_vec()
    }

    /// Publish a whole new table.
    pub fn replace(&self, table: RegistryTable) {
        let table = Arc::new(table);
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = table;
    }

    /// Re-read the source file and publish it. On error the current table
    /// stays in place.
    pub fn reload(&self) -> Result<usize, RegistryError> {
        let path = self.source.as_ref().ok_or(RegistryError::NoSource)?;
        let table = RegistryTable::load(path)?;
        let count = table.len();
        self.replace(table);
        info!(path = %path.display(), backends = count, "Registry reloaded");
        Ok(count)
    }
}
