use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::FixedOffset;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use outfit_api::{
    api::{create_router, AppState},
    config::Config,
    db::{
        create_pool, create_redis_client, run_migrations, Cache, PgAuditLog, PgClothingCatalog,
        PgWeatherStore,
    },
    services::{
        ComfortClient, OpenWeatherProvider, RecommendationClient, RecommendationPipeline,
        RecommendationService, UpstreamTransport, WeatherService,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("outfit_api=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let offset = FixedOffset::east_opt(config.reference_utc_offset_hours * 3600)
        .context("REFERENCE_UTC_OFFSET_HOURS is out of range")?;

    // Storage
    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let redis_client = create_redis_client(&config.redis_url)?;
    let (cache, cache_writer) = Cache::new(redis_client).await;

    // Weather
    let provider = OpenWeatherProvider::new(
        config.openweather_api_key.clone(),
        config.openweather_api_url.clone(),
        Duration::from_secs(config.weather_timeout_secs),
    )?;
    let weather = WeatherService::new(
        Arc::new(PgWeatherStore::new(pool.clone())),
        Arc::new(provider),
        offset,
    )
    .with_cache(cache);

    // AI upstream
    let transport = UpstreamTransport::new(
        &config.ai_base_url,
        config.ai_connect_timeout(),
        config.ai_read_timeout(),
    )?;
    let pipeline = RecommendationPipeline::new(
        Arc::new(RecommendationClient::new(
            transport.clone(),
            &config.ai_recommend_path,
        )),
        Arc::new(PgAuditLog::new(pool.clone())),
    );
    let recommendations = RecommendationService::new(
        weather.clone(),
        Arc::new(PgClothingCatalog::new(pool.clone())),
        pipeline.clone(),
    );
    let comfort = ComfortClient::new(transport, &config.ai_comfort_path);

    let state = AppState::new(
        weather,
        recommendations,
        pipeline,
        comfort,
        config.default_location(),
    );
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cache_writer.shutdown().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
