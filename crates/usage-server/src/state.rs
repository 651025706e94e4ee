use std::sync::Arc;
use tokio::sync::RwLock;
use usage_core::config::AppConfig;
use usage_core::store::{JsonFileStore, UsageStore};
use usage_core::tracker::UsageTracker;

/// Shared application state for the server.
///
/// The tracker sits behind a write lock so each load-mutate-save cycle is
/// exclusive; reporter reads take the read side and see consistent
/// snapshots.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub tracker: Arc<RwLock<UsageTracker>>,
}

impl AppState {
    /// File-backed state at the configured stats path.
    pub fn new(config: AppConfig) -> Self {
        let store = Arc::new(JsonFileStore::new(config.stats_file()));
        Self::with_store(config, store)
    }

    /// State over an explicit store implementation (tests, embedding).
    pub fn with_store(config: AppConfig, store: Arc<dyn UsageStore>) -> Self {
        Self {
            config,
            tracker: Arc::new(RwLock::new(UsageTracker::new(store))),
        }
    }
}
