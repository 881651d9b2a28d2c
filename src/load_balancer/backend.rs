//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single downstream server by its normalized base URL
//! - Track active connections (for least-connections selection)
//! - Track the healthy flag written by the health scheduler
//! - Release slots through an RAII guard

use serde::Serialize;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

use crate::load_balancer::RegistryError;
use crate::observability::metrics;

/// Parse and normalize a backend base address.
///
/// Accepts absolute `http` URLs with a host and an optional path prefix.
/// The normalized form drops the default port, lowercases the host and
/// strips any trailing slash, so `http://A:80/api/` and `http://a/api`
/// name the same backend.
pub fn normalize_address(raw: &str) -> Result<(Url, String), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidAddress {
        address: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if url.scheme() != "http" {
        return Err(invalid("scheme must be http"));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(invalid("missing host")),
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query and fragment are not allowed"));
    }

    let key = url.as_str().trim_end_matches('/').to_string();
    Ok((url, key))
}

/// A single backend server.
pub struct Backend {
    url: Url,
    address: String,
    active_connections: AtomicUsize,
    healthy: AtomicBool,
}

impl Backend {
    /// Create a detached backend. New backends start unhealthy until probed.
    pub fn new(address: &str) -> Result<Self, RegistryError> {
        let (url, address) = normalize_address(address)?;
        Ok(Self {
            url,
            address,
            active_connections: AtomicUsize::new(0),
            healthy: AtomicBool::new(false),
        })
    }

    /// Normalized base address; the identity key in the registry.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Parsed base URL, used to rewrite forwarded requests.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get the current number of active connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Point-in-time copy of the observable state.
    pub fn view(&self) -> BackendView {
        BackendView {
            url: self.address.clone(),
            active_connections: self.active_connections(),
            healthy: self.is_healthy(),
        }
    }

    pub(crate) fn inc_connections(&self) {
        let now = self.active_connections.fetch_add(1, Ordering::AcqRel) + 1;
        metrics::record_active_connections(&self.address, now);
    }

    /// Decrement the counter, refusing to go below zero.
    ///
    /// Returns false when there was no slot to release.
    pub(crate) fn dec_connections(&self) -> bool {
        match self
            .active_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(prev) => {
                metrics::record_active_connections(&self.address, prev - 1);
                true
            }
            Err(_) => {
                tracing::warn!(backend = %self.address, "Release without matching acquire ignored");
                false
            }
        }
    }

    /// Store the health flag, returning the previous value.
    pub(crate) fn set_healthy(&self, healthy: bool) -> bool {
        self.healthy.swap(healthy, Ordering::AcqRel)
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("address", &self.address)
            .field("active_connections", &self.active_connections())
            .field("healthy", &self.is_healthy())
            .finish()
    }
}

/// Lightweight read-only view of a backend, safe to hand outside the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendView {
    pub url: String,
    pub active_connections: usize,
    pub healthy: bool,
}

/// A RAII guard that holds one connection slot on a backend.
///
/// Dropping the guard releases the slot, whether or not the backend is
/// still registered.
#[derive(Debug)]
pub struct BackendGuard {
    backend: Arc<Backend>,
}

impl BackendGuard {
    /// Wrap a backend whose counter has already been incremented.
    pub(crate) fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }

    /// Shared handle to the underlying backend.
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Deref for BackendGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for BackendGuard {
    fn drop(&mut self) {
        self.backend.dec_connections();
    }
}
