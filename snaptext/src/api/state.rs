use std::sync::Arc;

use crate::config::Config;
use crate::db::ScreenshotStore;
use crate::extraction::ExtractionService;
use crate::ratelimit::FixedWindowLimiter;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ScreenshotStore>,
    pub extraction: ExtractionService,
    pub limiter: Arc<FixedWindowLimiter>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn ScreenshotStore>,
        extraction: ExtractionService,
        limiter: Arc<FixedWindowLimiter>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            extraction,
            limiter,
        }
    }
}
