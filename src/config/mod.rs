//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → passed by value/clone to each subsystem constructor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; backends change through the admin API
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigError, load_config};
pub use schema::{
    AdminConfig, HealthCheckConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    RouterConfig, TimeoutConfig,
};
