//! Least Connections load balancing strategy.

use std::sync::Arc;
use crate::load_balancer::{LoadBalancer, backend::Backend};

/// Least connections selector.
/// Selects the healthy backend with the minimum number of active connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        // Strictly smaller wins, so ties keep the first one in list order.
        let mut best: Option<(&Arc<Backend>, usize)> = None;
        for backend in backends.iter().filter(|b| b.is_healthy()) {
            let conns = backend.active_connections();
            match best {
                Some((_, min)) if conns >= min => {}
                _ => best = Some((backend, conns)),
            }
        }
        best.map(|(b, _)| b.clone())
    }
}
