//! voice-match server binary.
//!
//! Loads configuration, picks Redis/PostgreSQL or in-memory backends and
//! serves the REST and websocket surface until SIGINT/SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use voice_match::adapters::auth::JwtIdentityVerifier;
use voice_match::adapters::http::{app_router, AppServices};
use voice_match::adapters::matching::{
    InMemoryActiveFlags, InMemoryWaitingQueue, MatchKeys, RedisActiveFlags, RedisInstanceLease,
    RedisWaitingQueue,
};
use voice_match::adapters::persistence::{InMemoryMatchStore, PostgresMatchStore};
use voice_match::adapters::rate_limiter::{InMemoryRateLimiter, RateLimitConfig, RedisRateLimiter};
use voice_match::application::{MatchBackends, MatchCoordinator, RateSessionHandler};
use voice_match::config::{AppConfig, ServerConfig};
use voice_match::ports::{ActiveFlags, IdentityVerifier, MatchStore, RateLimiter, WaitingQueue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.server);
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        "Starting voice-match"
    );

    let verifier: Arc<dyn IdentityVerifier> = Arc::new(JwtIdentityVerifier::new(&config.auth));
    let (backends, lease) = build_backends(&config).await?;
    let renewal = lease.as_ref().map(RedisInstanceLease::spawn_renewal);
    let rate_handler = Arc::new(RateSessionHandler::new(backends.store.clone()));
    let coordinator = Arc::new(MatchCoordinator::new(
        config.matching.clone(),
        verifier.clone(),
        backends,
    ));

    let app = app_router(
        AppServices {
            coordinator: coordinator.clone(),
            rate_handler,
            verifier,
        },
        &config.server,
    );

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    coordinator.shutdown().await;
    if let Some(renewal) = renewal {
        renewal.abort();
    }
    if let Some(lease) = lease {
        if let Err(e) = lease.release().await {
            tracing::warn!(error = %e, "Failed to release instance lease");
        }
    }
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if server.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Returns the backends plus the instance lease when Redis is shared state.
async fn build_backends(
    config: &AppConfig,
) -> anyhow::Result<(MatchBackends, Option<RedisInstanceLease>)> {
    let matching = &config.matching;
    let limits = RateLimitConfig::from(matching);

    let queue: Arc<dyn WaitingQueue>;
    let flags: Arc<dyn ActiveFlags>;
    let rate_limiter: Arc<dyn RateLimiter>;
    let mut lease = None;
    match &config.redis {
        Some(redis_config) => {
            let client = redis::Client::open(redis_config.url.as_str())
                .context("Invalid Redis URL")?;
            let conn = client
                .get_multiplexed_tokio_connection()
                .await
                .context("Failed to connect to Redis")?;
            let keys = MatchKeys::new(redis_config.key_prefix.clone());

            // Connections and live sessions are process-local, so only one
            // server may use a prefix at a time.
            let instance = RedisInstanceLease::new(conn.clone(), &keys);
            if !instance
                .acquire()
                .await
                .context("Failed to take instance lease")?
            {
                anyhow::bail!(
                    "Another server holds {}; run one instance per Redis key prefix",
                    instance.key()
                );
            }
            tracing::info!(key = instance.key(), "Instance lease acquired");
            lease = Some(instance);

            queue = Arc::new(RedisWaitingQueue::new(
                conn.clone(),
                keys.clone(),
                matching.queue_entry_ttl_secs,
            ));
            flags = Arc::new(RedisActiveFlags::new(
                conn.clone(),
                keys,
                matching.active_flag_ttl_secs,
            ));
            rate_limiter = Arc::new(RedisRateLimiter::new(conn, limits));
            tracing::info!("Queue, active flags and rate limits backed by Redis");
        }
        None => {
            queue = Arc::new(InMemoryWaitingQueue::new());
            flags = Arc::new(InMemoryActiveFlags::new());
            rate_limiter = Arc::new(InMemoryRateLimiter::new(limits));
            tracing::warn!("Redis not configured, matching state is process-local");
        }
    }

    let store: Arc<dyn MatchStore> = match &config.database {
        Some(database) => {
            let pool = PgPoolOptions::new()
                .max_connections(database.max_connections)
                .acquire_timeout(database.acquire_timeout())
                .connect(&database.url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            if database.run_migrations {
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .context("Failed to run migrations")?;
            }
            tracing::info!("Sessions and presence backed by PostgreSQL");
            Arc::new(PostgresMatchStore::new(pool))
        }
        None => {
            tracing::warn!("Database not configured, sessions are kept in memory");
            Arc::new(InMemoryMatchStore::new())
        }
    };

    Ok((
        MatchBackends {
            queue,
            flags,
            rate_limiter,
            store,
        },
        lease,
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
