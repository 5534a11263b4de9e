use hive_api::{router, AppConfig, AppState};
use hive_core::store::PgStore;
use hive_core::Engine;
use hive_shared::clients::db::create_pool;
use hive_shared::clients::rabbitmq::RabbitMQClient;
use hive_shared::clients::redis::RedisClient;
use hive_shared::middleware::{init_metrics, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("hive-api");

    let config = AppConfig::load()?;
    let port = config.port;

    let pool = create_pool(&config.database_url, config.db_pool_size)?;
    let engine = Engine::new(PgStore::new(pool), config.workflow_policy(), config.token_settings());

    let admin_emails: Vec<String> = config.admin_emails().into_iter().map(str::to_string).collect();
    let mut state = AppState::new(engine, config.clone());
    for email in admin_emails {
        state.run(move |engine| engine.ensure_admin(&email)).await?;
    }

    state.redis = Some(RedisClient::connect(&config.redis_url).await?);
    state.rabbitmq = Some(RabbitMQClient::connect(&config.rabbitmq_url).await?);
    state.metrics = Some(init_metrics()?);
    if !state.email.is_configured() {
        tracing::warn!("no Resend API key configured, verification emails will be logged only");
    }

    let app = router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, soft_delete = ?config.soft_delete_policy, "hive-api starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
