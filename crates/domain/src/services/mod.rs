//! Shared service helpers: the collection cache, the write retry helper and
//! telemetry wiring.

pub mod cache;
pub mod retry;
pub mod telemetry;

pub use cache::*;
pub use retry::*;
pub use telemetry::*;
