//! Application state - Dependency injection container.

use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppResult;
use crate::infra::{Cache, Database, ExchangeGateway};
use crate::services::{ServiceContainer, Services};

/// Shared state handed to every handler.
///
/// `cache` and `database` are optional so routers can be exercised with
/// fake services and no infrastructure. The server always sets both.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<dyn ServiceContainer>,
    /// Redis: rate limits, wallet locks, rate cache
    pub cache: Option<Cache>,
    /// Used by the health check
    pub database: Option<Database>,
}

impl AppState {
    /// Build the full service graph on top of live infrastructure.
    pub fn from_config(
        database: Database,
        cache: Cache,
        config: Config,
        gateway: Option<Arc<dyn ExchangeGateway>>,
    ) -> Self {
        let services = Services::from_connection(
            database.get_connection(),
            Some(cache.clone()),
            config,
            gateway,
        );

        Self {
            services: Arc::new(services),
            cache: Some(cache),
            database: Some(database),
        }
    }

    /// State with injected services, typically fakes in tests.
    pub fn new(services: Arc<dyn ServiceContainer>) -> Self {
        Self {
            services,
            cache: None,
            database: None,
        }
    }

    /// Run a money-moving request while holding the user's wallet lock.
    ///
    /// Without Redis only the database row locks apply.
    pub async fn with_wallet_lock<T, F>(&self, user_id: Uuid, operation: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        let guard = match &self.cache {
            Some(cache) => Some(cache.lock_wallet(user_id).await?),
            None => None,
        };

        let result = operation.await;

        if let Some(guard) = guard {
            if let Err(e) = guard.release().await {
                tracing::warn!(user_id = %user_id, error = %e, "Wallet lock release failed");
            }
        }
        result
    }
}
