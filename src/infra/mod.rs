//! Infrastructure adapters and runtime bootstrap.

pub mod content;
pub mod error;
pub mod telemetry;
