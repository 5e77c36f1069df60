//! Domain-level building blocks shared across the storage and API crates:
//! portal records and their validation, environment configuration, the
//! collection cache, the write retry helper, telemetry, and the accessor
//! traits implemented on top of the config store.

pub mod config;
pub mod model;
pub mod services;

pub mod storage {
    mod traits;

    pub use traits::*;
}

pub use model::*;
pub use services::*;
pub use storage::*;
