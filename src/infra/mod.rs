//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod remote;
pub mod storage;
pub mod telemetry;
