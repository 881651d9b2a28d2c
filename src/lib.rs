//! Least-connections HTTP router.
//!
//! Routes each inbound request to the healthy backend with the fewest
//! active connections, while a background scheduler keeps re-probing every
//! backend's health endpoint.

pub mod admin;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::RouterConfig;
pub use health::HealthScheduler;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{Registry, RegistryError};
