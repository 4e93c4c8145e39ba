use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fitroom::audit::{self, AuditHandle};
use fitroom::catalog::Catalog;
use fitroom::channels::telegram::TelegramChannel;
use fitroom::clock;
use fitroom::config::Config;
use fitroom::locks::UserLockRegistry;
use fitroom::orchestrator::Orchestrator;
use fitroom::providers::gemini::GeminiImageProvider;
use fitroom::quota::{CounterStore, QuotaManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;

    let catalog = Catalog::load(&config.catalog_path).context("loading product catalog")?;
    info!(products = catalog.product_count(), "catalog loaded");

    let tz = clock::resolve_tz(&config.quota_timezone);
    let store = CounterStore::connect(config.redis_url.as_deref()).await;
    info!(
        backend = store.backend_name(),
        daily_limit = config.daily_limit,
        zone = %tz,
        "quota configured",
    );
    let quota = QuotaManager::new(store, config.daily_limit, tz);

    let generator = Arc::new(GeminiImageProvider::new(
        &config.gemini_api_key,
        &config.gemini_model,
        catalog.clone(),
        config.logo_path.clone(),
    ));
    info!(model = %config.gemini_model, "Gemini provider ready");

    let audit = match config.admin_log.clone() {
        Some(admin) => audit::spawn_admin_logger(admin),
        None => AuditHandle::disabled(),
    };

    let orchestrator = Orchestrator::new(
        quota,
        Arc::new(UserLockRegistry::new()),
        generator,
        audit,
    );

    let channel = Arc::new(TelegramChannel::new(catalog, orchestrator));
    channel.run(&config.telegram_token).await;
    Ok(())
}
