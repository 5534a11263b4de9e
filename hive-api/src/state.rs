use std::sync::Arc;

use axum::extract::FromRef;
use metrics_exporter_prometheus::PrometheusHandle;

use hive_core::store::{PgStore, Store};
use hive_core::Engine;
use hive_shared::clients::email::EmailClient;
use hive_shared::clients::rabbitmq::RabbitMQClient;
use hive_shared::clients::redis::RedisClient;
use hive_shared::errors::{AppError, AppResult};
use hive_shared::types::auth::JwtKeys;

use crate::chat::ChatHub;
use crate::config::AppConfig;

/// Shared by every handler. Cheap to clone.
///
/// Generic over the store so the router can run on the in-memory store;
/// the binary always uses Postgres.
pub struct AppState<S: Store = PgStore> {
    pub engine: Arc<Engine<S>>,
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub email: EmailClient,
    /// Login and resend throttling is skipped without Redis.
    pub redis: Option<RedisClient>,
    /// Domain events are dropped without a broker.
    pub rabbitmq: Option<RabbitMQClient>,
    pub chat: ChatHub,
    pub metrics: Option<PrometheusHandle>,
}

impl<S: Store> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            config: self.config.clone(),
            keys: self.keys.clone(),
            email: self.email.clone(),
            redis: self.redis.clone(),
            rabbitmq: self.rabbitmq.clone(),
            chat: self.chat.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<S: Store> AppState<S> {
    pub fn new(engine: Engine<S>, config: AppConfig) -> Self {
        let keys = engine.token_settings().keys.clone();
        let email = EmailClient::new(&config.resend_api_key, &config.from_email, "InterfaceHive");
        Self {
            engine: Arc::new(engine),
            config: Arc::new(config),
            keys,
            email,
            redis: None,
            rabbitmq: None,
            chat: ChatHub::default(),
            metrics: None,
        }
    }

    /// Runs a synchronous engine operation on the blocking pool.
    pub async fn run<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&Engine<S>) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || f(&engine))
            .await
            .map_err(|e| AppError::internal(format!("engine task failed: {e}")))?
    }
}

impl<S: Store> FromRef<AppState<S>> for JwtKeys {
    fn from_ref(state: &AppState<S>) -> Self {
        state.keys.clone()
    }
}
