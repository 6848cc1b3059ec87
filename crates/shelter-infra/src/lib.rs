//! Shelter Infrastructure Library
//!
//! Process-level plumbing shared by the shelter binaries. Today that is
//! telemetry initialization.

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry, LogFormat};
