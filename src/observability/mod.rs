//! Logging
//!
//! The crate emits `tracing` events with structured fields at builder steps,
//! guard decisions and evictions. Binaries call `init` once at startup.

mod logger;

pub use logger::{env_filter, init, LOG_ENV};
