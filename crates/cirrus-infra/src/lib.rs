//! Cirrus Infrastructure Library
//!
//! Process-level setup shared by binaries that embed the storage and messaging adapters.

pub mod telemetry;

pub use telemetry::{init_telemetry, LogFormat};
