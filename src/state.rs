//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the configuration and the room registry. `main` builds exactly
//! one registry and every session reaches it through this handle; tests
//! build their own independent instances.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::rooms::RoomRegistry;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<RoomRegistry>,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self { config: Arc::new(config), registry: Arc::new(RoomRegistry::new()) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
