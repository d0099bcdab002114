//! Application state shared by every handler.

use imgshift_core::Config;
use imgshift_processing::Transcoder;
use imgshift_services::EntitlementGate;
use imgshift_storage::ScratchStore;
use std::sync::Arc;

/// Read-only after startup. The only per-request mutable resource is the scratch
/// directory, and each request works on its own uniquely named files there.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub scratch: ScratchStore,
    pub transcoder: Arc<dyn Transcoder>,
    pub gate: Arc<EntitlementGate>,
}

impl AppState {
    pub fn new(
        config: Config,
        scratch: ScratchStore,
        transcoder: Arc<dyn Transcoder>,
        gate: Arc<EntitlementGate>,
    ) -> Self {
        Self {
            config,
            scratch,
            transcoder,
            gate,
        }
    }
}
