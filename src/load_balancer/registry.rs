//! Backend registry.
//!
//! # Responsibilities
//! - Own the ordered backend collection (no duplicate addresses)
//! - Add and remove backends at runtime
//! - Acquire the least-loaded healthy backend and release it afterwards
//! - Hand out point-in-time snapshots for the health scheduler and admin API
//! - Announce additions so the scheduler can probe them immediately

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

use crate::load_balancer::{
    LoadBalancer, RegistryError,
    backend::{Backend, BackendGuard, BackendView, normalize_address},
    least_conn::LeastConnections,
};

/// Capacity of the additions channel; a lagging subscriber falls back to a full pass.
const ADDITIONS_CAPACITY: usize = 64;

/// Process-wide set of backends and the single synchronization point for them.
#[derive(Debug)]
pub struct Registry {
    backends: Mutex<Vec<Arc<Backend>>>,
    balancer: Box<dyn LoadBalancer>,
    additions: broadcast::Sender<Arc<Backend>>,
    /// Health flag given to newly added backends.
    initial_healthy: bool,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry using least-connections selection.
    pub fn new() -> Self {
        Self::with_balancer(Box::new(LeastConnections::new()))
    }

    pub fn with_balancer(balancer: Box<dyn LoadBalancer>) -> Self {
        let (additions, _) = broadcast::channel(ADDITIONS_CAPACITY);
        Self {
            backends: Mutex::new(Vec::new()),
            balancer,
            additions,
            initial_healthy: false,
        }
    }

    /// Start new backends healthy instead of waiting for a probe. Used when
    /// active health checking is disabled.
    pub fn with_initial_health(mut self, healthy: bool) -> Self {
        self.initial_healthy = healthy;
        self
    }

    /// Lock the collection. The lock only ever guards in-memory work, so a
    /// poisoned lock still holds a consistent list.
    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Backend>>> {
        self.backends.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Select the healthy backend with the fewest active connections and
    /// claim one slot on it.
    ///
    /// The scan and the increment happen under the registry lock, so two
    /// concurrent callers never both claim the same minimum.
    pub fn acquire(&self) -> Result<Arc<Backend>, RegistryError> {
        let backends = self.lock();
        if backends.is_empty() {
            return Err(RegistryError::NoBackendsRegistered);
        }

        let backend = self
            .balancer
            .next_server(&backends)
            .ok_or(RegistryError::NoHealthyBackends)?;
        backend.inc_connections();
        Ok(backend)
    }

    /// Like [`Registry::acquire`], but the slot is released when the guard drops.
    pub fn acquire_guard(&self) -> Result<BackendGuard, RegistryError> {
        self.acquire().map(BackendGuard::new)
    }

    /// Release a slot previously claimed with [`Registry::acquire`].
    ///
    /// Works on backends that have since been removed.
    pub fn release(&self, backend: &Backend) {
        backend.dec_connections();
    }

    /// Register a new backend. It starts unhealthy (unless the registry was
    /// built [`with_initial_health`](Registry::with_initial_health)) and
    /// subscribers to [`Registry::subscribe_additions`] are asked to probe it
    /// right away.
    pub fn add_backend(&self, address: &str) -> Result<Arc<Backend>, RegistryError> {
        let backend = Arc::new(Backend::new(address)?);
        if self.initial_healthy {
            backend.set_healthy(true);
        }

        {
            let mut backends = self.lock();
            if backends.iter().any(|b| b.address() == backend.address()) {
                return Err(RegistryError::DuplicateBackend(backend.address().to_string()));
            }
            backends.push(backend.clone());
        }

        tracing::info!(backend = %backend.address(), "Backend added");
        // No subscriber just means no scheduler is running yet.
        let _ = self.additions.send(backend.clone());
        Ok(backend)
    }

    /// Remove a backend from future selection.
    ///
    /// In-flight requests keep their handle and release it normally.
    pub fn remove_backend(&self, address: &str) -> Result<Arc<Backend>, RegistryError> {
        let key = lookup_key(address);
        let removed = {
            let mut backends = self.lock();
            let index = backends
                .iter()
                .position(|b| b.address() == key)
                .ok_or_else(|| RegistryError::BackendNotFound(key.clone()))?;
            backends.remove(index)
        };

        tracing::info!(
            backend = %removed.address(),
            active_connections = removed.active_connections(),
            "Backend removed"
        );
        Ok(removed)
    }

    /// Point-in-time views in registry order.
    pub fn snapshot(&self) -> Vec<BackendView> {
        self.lock().iter().map(|b| b.view()).collect()
    }

    /// Shared handles to every registered backend (for health checking).
    pub fn backends(&self) -> Vec<Arc<Backend>> {
        self.lock().clone()
    }

    pub fn get(&self, address: &str) -> Option<Arc<Backend>> {
        let key = lookup_key(address);
        self.lock().iter().find(|b| b.address() == key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Write a probe result back to the backend registered under `address`.
    ///
    /// Returns the previous health flag, or `None` if the address is no
    /// longer registered.
    pub(crate) fn set_healthy(&self, address: &str, healthy: bool) -> Option<bool> {
        let backends = self.lock();
        backends
            .iter()
            .find(|b| b.address() == address)
            .map(|b| b.set_healthy(healthy))
    }

    /// Receive every backend added from now on.
    pub fn subscribe_additions(&self) -> broadcast::Receiver<Arc<Backend>> {
        self.additions.subscribe()
    }
}

/// Normalized form when the address parses, raw trimmed text otherwise.
/// A malformed address can never be registered, so it simply is not found.
fn lookup_key(address: &str) -> String {
    normalize_address(address)
        .map(|(_, key)| key)
        .unwrap_or_else(|_| address.trim().to_string())
}
