//! HTTP request and response types.

use serde::Serialize;

use modelroute_core::ModelCapabilities;

use crate::pool::HandleSnapshot;
use crate::registry::BackendProfile;

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// One registered backend and its pool residency.
#[derive(Debug, Serialize)]
pub struct BackendResponse {
    #[serde(flatten)]
    pub capabilities: ModelCapabilities,
    pub description: String,
    pub memory_cost_mb: u64,
    pub residency: Option<ResidencyResponse>,
}

/// Residency of a loaded backend.
#[derive(Debug, Serialize)]
pub struct ResidencyResponse {
    pub ref_count: u32,
    pub pinned: bool,
    pub loaded_at: String,
    pub idle_ms: u64,
}

impl BackendResponse {
    pub fn new(profile: &BackendProfile, handle: Option<&HandleSnapshot>) -> Self {
        Self {
            capabilities: profile.capabilities.clone(),
            description: profile.description.clone(),
            memory_cost_mb: profile.memory_cost_mb,
            residency: handle.map(|h| ResidencyResponse {
                ref_count: h.ref_count,
                pinned: h.pinned,
                loaded_at: h.loaded_at.to_rfc3339(),
                idle_ms: h.idle.as_millis() as u64,
            }),
        }
    }
}

/// Result of a registry reload.
#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub backends: usize,
}
