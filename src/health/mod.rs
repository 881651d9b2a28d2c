//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! scheduler.rs:
//!     Periodic timer (or backend added)
//!     → registry snapshot
//!     → prober.rs, one concurrent probe per backend
//!     → registry.set_healthy(address, result)
//! ```
//!
//! # Design Decisions
//! - Probe failures are routine outcomes, never errors
//! - A single probe result flips the flag; there is no hysteresis
//! - The prober is a trait so tests can script backend health

pub mod prober;
pub mod scheduler;

pub use prober::{HttpProber, Probe, classify};
pub use scheduler::{HealthScheduler, PassSummary, SchedulerHandle, SchedulerState};
