//! Cached model listing, refreshed in the background from the provider.

use chrono::{DateTime, Utc};
use ironquill_core::{Provider, ProviderError};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How often the background task re-pulls the provider's model listing.
pub const REFRESH_PERIOD: Duration = Duration::from_secs(300);

/// Read-only cache of the model names the provider reports.
///
/// The registry is advisory. While it is empty (listing not yet fetched,
/// or the provider reports none) request validation accepts any model name
/// and lets the provider reject unknowns itself.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: RwLock<Vec<String>>,
    refreshed_at: RwLock<Option<DateTime<Utc>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current model names. Empty until the first successful refresh.
    pub fn snapshot(&self) -> Vec<String> {
        self.models
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.models
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    /// When the listing was last fetched successfully.
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        *self.refreshed_at.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Pull the listing once. A failure leaves the previous snapshot in
    /// place.
    pub async fn refresh(&self, provider: &dyn Provider) -> Result<usize, ProviderError> {
        let models = provider.list_models().await?;
        let count = models.len();
        *self.models.write().unwrap_or_else(|e| e.into_inner()) = models;
        *self.refreshed_at.write().unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());
        debug!(count, provider = provider.name(), "model registry refreshed");
        Ok(count)
    }

    /// Spawn the periodic refresh task. The first tick fires immediately,
    /// so the registry is usually populated before the first request.
    pub fn spawn_refresher(
        self: &Arc<Self>,
        provider: Arc<dyn Provider>,
        period: Duration,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = registry.refresh(provider.as_ref()).await {
                    warn!(error = %e, "model listing refresh failed, keeping previous snapshot");
                }
            }
        })
    }
}
