//! HTTP request handlers.

mod backends;
mod health;

pub use backends::{list_backends, reload_registry};
pub use health::{health_check, metrics_handler};
