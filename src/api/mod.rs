pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::config::ModelVariant;
use crate::ml::ResourceLoader;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub loader: Arc<ResourceLoader>,
    pub started_at: Instant,
    pub metrics_enabled: bool,
}

impl AppState {
    pub fn new(loader: Arc<ResourceLoader>) -> Self {
        Self {
            loader,
            started_at: Instant::now(),
            metrics_enabled: true,
        }
    }

    /// Toggle the `/metrics` route and HTTP metrics middleware
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    pub fn variant(&self) -> ModelVariant {
        self.loader.variant()
    }
}
