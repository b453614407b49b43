//! catapultd — assembles the Catapult subsystems into one process.
//!
//! The binary in `main.rs` is a thin CLI over this library:
//! - `logging` installs the tracing subscriber
//! - `service` wires config, metrics, event loop, readiness and router
//!
//! Keeping the wiring in a library lets the integration tests under
//! `tests/` drive a fully assembled service without binding a socket.

pub mod logging;
pub mod service;

pub use service::{SHUTDOWN_TIMEOUT, Service, spawn_event_loop_metrics, state_check_callback};
