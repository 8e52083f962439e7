//! gRPC service implementations.

pub mod router_service;

pub use router_service::ModelRouterServiceImpl;
