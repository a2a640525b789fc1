//! AI Check Server - REST API for image verification
//!
//! Wires the configured store, cache and image processor into the HTTP router:
//! - POST /verify - Score and record an uploaded image
//! - GET /result/{id} - Look up a verification
//! - GET /duplicates/{id} - Other verifications of the same image
//! - GET /metrics/summary - Aggregate metrics

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use aicheck_core::{
    CacheAside, GrpcScorer, KeyValueCache, MemoryCache, MemoryStore, PostgresStore, RedisCache,
    RequestContext, VerificationRepository, VerificationService, VerificationStore,
};
use aicheck_server::{create_router, AppState, Config, JwtVerifier};
use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Notify;

/// Bound on connecting to and preparing the durable store at startup
const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env();
    let addr = config.socket_addr();

    tracing::info!(
        addr = %addr,
        version = env!("CARGO_PKG_VERSION"),
        "AI Check server starting"
    );

    let jwt_secret = config
        .jwt_secret
        .as_deref()
        .context("JWT_SECRET must be set")?;
    let jwt = JwtVerifier::new(jwt_secret, config.jwt_audience.clone());

    let repository = connect_store(&config).await?;
    let cache = connect_cache(&config).await?;

    let scorer = GrpcScorer::connect_lazy(
        &config.image_processor_addr,
        config.image_processor_connect_timeout(),
    )
    .context("invalid IMAGE_PROCESSOR_ADDR")?;

    let service = VerificationService::new(
        repository,
        cache,
        Arc::new(scorer),
        tracing::info_span!("verification"),
    )
    .with_duplicate_scope(config.duplicate_scope);

    let state = AppState::new(service, jwt, &config);
    let app = create_router(state, &config);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "Server listening");

    // Fires once the shutdown signal has been received
    let draining = Arc::new(Notify::new());
    let trigger = draining.clone();

    let mut server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            trigger.notify_one();
        })
        .await
    });

    let grace = config.shutdown_timeout();
    tokio::select! {
        result = &mut server => {
            result.context("server task failed")?.context("server error")?;
        }
        _ = async {
            draining.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!(grace_secs = grace.as_secs(), "In-flight requests did not finish in time, aborting");
            server.abort();
        }
    }

    tracing::info!("AI Check server shutdown complete");
    Ok(())
}

/// Open the durable store, check it answers and create the schema.
async fn connect_store(config: &Config) -> anyhow::Result<VerificationRepository> {
    let store: Arc<dyn VerificationStore> = match &config.database_url {
        Some(url) => Arc::new(
            PostgresStore::connect(url, config.pool_settings())
                .await
                .context("failed to connect to PostgreSQL")?,
        ),
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store (records are lost on restart)");
            Arc::new(MemoryStore::new())
        }
    };

    let repository = VerificationRepository::new(store, tracing::info_span!("repository"));
    let ctx = RequestContext::with_timeout(STARTUP_TIMEOUT);

    repository
        .ping(&ctx)
        .await
        .context("durable store did not answer")?;
    repository
        .ensure_schema(&ctx)
        .await
        .context("failed to prepare schema")?;

    tracing::info!(backend = repository.backend_name(), "Durable store ready");
    Ok(repository)
}

async fn connect_cache(config: &Config) -> anyhow::Result<CacheAside> {
    let cache: Arc<dyn KeyValueCache> = match &config.redis_url {
        Some(url) => Arc::new(
            RedisCache::connect(url)
                .await
                .context("failed to connect to Redis")?,
        ),
        None => {
            tracing::warn!("REDIS_URL not set, using in-process cache");
            Arc::new(MemoryCache::new())
        }
    };

    tracing::info!(backend = cache.backend_name(), "Cache ready");
    Ok(CacheAside::new(cache, tracing::info_span!("cache")))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
