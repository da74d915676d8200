//! Remote gateway adapters.

mod http;
mod memory;

pub use http::{RestGateway, user_agent};
pub use memory::{CallCounts, MemoryBackend};
