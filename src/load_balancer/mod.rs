//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → registry.rs (acquire under the registry lock)
//!     → least_conn.rs (pick healthy backend with fewest connections)
//!     → backend.rs (increment counter, hand out guard)
//!     → request forwarded, guard dropped → counter decremented
//!
//! Health scheduler
//!     → registry.rs (snapshot of shared backend handles)
//!     → probe each backend outside the lock
//!     → registry.rs (write health flag back by address)
//! ```
//!
//! # Design Decisions
//! - The registry is the only owner of membership and of every mutation path
//! - Selection and the winner's increment happen in one critical section
//! - Counters are atomics so release never needs the registry lock
//! - Removal detaches a backend from selection; in-flight handles stay valid

pub mod backend;
pub mod least_conn;
pub mod registry;

use std::sync::Arc;
use thiserror::Error;

use crate::load_balancer::backend::Backend;

pub use backend::{BackendGuard, BackendView};
pub use least_conn::LeastConnections;
pub use registry::Registry;

/// Selection strategy applied to the registry's backend list.
///
/// Implementations must only return healthy backends and must not mutate
/// counters; the registry increments the winner itself.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;
}

/// Errors surfaced by registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Acquire on an empty registry.
    #[error("no backends registered")]
    NoBackendsRegistered,

    /// Acquire when every registered backend is unhealthy.
    #[error("no healthy backends available")]
    NoHealthyBackends,

    /// The address is not an absolute http URL with a host.
    #[error("invalid backend address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// The normalized address is already registered.
    #[error("backend {0} is already registered")]
    DuplicateBackend(String),

    /// No backend with this address is registered.
    #[error("backend {0} not found")]
    BackendNotFound(String),
}

