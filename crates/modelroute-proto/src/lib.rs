//! Generated gRPC code and converters for ModelRoute.
//!
//! This crate contains:
//! - Generated protobuf message types
//! - Generated gRPC service stubs (client and server)
//! - Converters between proto types and domain types

pub mod convert;

/// Generated protobuf types and services.
pub mod pb {
    // Include the generated code
    // The path matches the proto package: modelroute.v1
    include!("gen/modelroute.v1.rs");
}

// Re-export commonly used types
pub use pb::model_router_client::ModelRouterClient;
pub use pb::model_router_server::{ModelRouter, ModelRouterServer};
