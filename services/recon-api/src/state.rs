//! Application state for the Reconciliation API service.

use std::sync::Arc;

use paylane_db::DbPool;
use paylane_recon::{Reconciler, SignatureVerifier};

use crate::config::Config;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// The reconciliation engine
    pub reconciler: Arc<Reconciler>,
    /// Webhook signature verification
    pub verifier: Arc<SignatureVerifier>,
    /// Database pool (readiness probe)
    pub pool: DbPool,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        reconciler: Reconciler,
        verifier: SignatureVerifier,
        pool: DbPool,
        config: Config,
    ) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            verifier: Arc::new(verifier),
            pool,
            config: Arc::new(config),
        }
    }

    /// Get request timeout from config
    pub fn request_timeout(&self) -> std::time::Duration {
        self.config.request_timeout
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
