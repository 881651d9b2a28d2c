//! Startup orchestration.
//!
//! # Responsibilities
//! - Seed the registry with the configured backends
//! - Run the first health pass before traffic is accepted
//! - Start the background scheduler
//!
//! Fail fast: a bad startup backend is fatal, since config validation
//! should already have rejected it.

use std::sync::Arc;

use crate::config::RouterConfig;
use crate::health::{HealthScheduler, SchedulerHandle};
use crate::lifecycle::Shutdown;
use crate::load_balancer::{Registry, RegistryError};

/// Build a registry holding every backend listed in the configuration.
///
/// With health checks disabled nothing would ever probe a backend, so every
/// backend, including ones added later, starts healthy.
pub fn seed_registry(config: &RouterConfig) -> Result<Arc<Registry>, RegistryError> {
    let registry = Arc::new(Registry::new().with_initial_health(!config.health_check.enabled));
    for address in &config.backends {
        registry.add_backend(address)?;
    }
    tracing::info!(backends = registry.len(), "Registry seeded");
    Ok(registry)
}

/// Probe every backend once and spawn the periodic scheduler.
///
/// With health checks disabled, every backend is marked healthy so traffic
/// can flow, and `None` is returned. Pair this with [`seed_registry`] so that
/// runtime additions start healthy too.
pub async fn start_health_checks(
    registry: Arc<Registry>,
    config: &RouterConfig,
    shutdown: &Shutdown,
) -> Option<SchedulerHandle> {
    if !config.health_check.enabled {
        tracing::info!("Active health checks disabled, marking all backends healthy");
        for backend in registry.backends() {
            registry.set_healthy(backend.address(), true);
        }
        return None;
    }

    let scheduler = HealthScheduler::new(registry, &config.health_check);
    Some(scheduler.start(shutdown).await)
}
