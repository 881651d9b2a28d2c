//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID assigned or kept)
//!     → registry acquire (503 when nothing can serve)
//!     → forward.rs (rewrite URI/Host, stream body to backend)
//!     → response streamed back; slot released when the body ends
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::HttpServer;
