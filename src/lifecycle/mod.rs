//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Seed registry → Initial probe pass → Scheduler → Listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → scheduler and servers stop → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Listeners start last, after the first health pass, so traffic is not
//!   rejected for backends that are in fact reachable
//! - Every long-running task subscribes to the same shutdown broadcast

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
