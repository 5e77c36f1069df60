use portal_domain::services::telemetry::TelemetryGuard;
use portal_storage::ConfigStorage;

#[derive(Clone)]
pub struct AppState {
    storage: ConfigStorage,
    telemetry: TelemetryGuard,
}

impl AppState {
    pub fn new(storage: ConfigStorage, telemetry: TelemetryGuard) -> Self {
        Self { storage, telemetry }
    }

    pub fn storage(&self) -> &ConfigStorage {
        &self.storage
    }

    pub fn telemetry(&self) -> &TelemetryGuard {
        &self.telemetry
    }
}
