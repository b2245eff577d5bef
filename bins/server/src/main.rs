//! Cambio API Server
//!
//! Main entry point for the Cambio wallet backend.

use std::{sync::Arc, time::Duration};

use axum::http::StatusCode;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cambio_api::{AppState, PaymentSettings, create_router, reconciler::Reconciler};
use cambio_core::exchange::RateCache;
use cambio_core::poller::{PollPolicy, PollRegistry};
use cambio_db::{ExchangeRateRepository, connect_with, repositories::exchange_rate::to_domain};
use cambio_gateway::PaystackClient;
use cambio_shared::{AppConfig, JwtConfig, JwtService, config::LogConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_tracing(&config.log);

    // Connect to database
    let db = connect_with(&config.database).await?;
    info!("Connected to database");

    // Create JWT service
    let jwt_config = JwtConfig {
        secret: config.jwt.secret.clone(),
        #[allow(clippy::cast_possible_wrap)]
        access_token_expires_minutes: (config.jwt.access_token_expiry_secs / 60) as i64,
        #[allow(clippy::cast_possible_wrap)]
        refresh_token_expires_days: (config.jwt.refresh_token_expiry_secs / 86400) as i64,
    };
    let jwt_service = JwtService::new(jwt_config);

    // Payment gateway
    let gateway = Arc::new(PaystackClient::new(&config.paystack)?);
    info!(base_url = %config.paystack.base_url, "Paystack client configured");

    // Exchange rates, warmed from the database
    let rates = RateCache::with_ttl(Duration::from_secs(config.exchange.rate_cache_ttl_secs));
    let stored = ExchangeRateRepository::new(db.clone()).list_all().await?;
    for rate in stored.iter().filter_map(to_domain) {
        rates.insert(rate).await;
    }
    info!(count = stored.len(), "Exchange rates loaded");

    let shutdown = CancellationToken::new();

    let policy = PollPolicy::new(
        Duration::from_millis(config.confirmation.interval_ms),
        config.confirmation.max_attempts,
    )
    .with_jitter(Duration::from_millis(config.confirmation.jitter_ms));
    let polls = Arc::new(PollRegistry::new(policy, shutdown.child_token()));

    let reconciler = if config.reconciliation.enabled {
        let job = Reconciler::new(db.clone(), gateway.clone(), config.reconciliation.clone());
        Some(job.spawn(shutdown.child_token()))
    } else {
        warn!("Reconciliation job disabled");
        None
    };

    let state = AppState {
        db: Arc::new(db),
        jwt_service: Arc::new(jwt_service),
        gateway,
        rates,
        polls,
        payments: Arc::new(PaymentSettings {
            webhook_secret: config.paystack.secret_key.clone(),
            exchange_fee_percent: config.exchange.fee_percent,
        }),
    };

    let app = create_router(state).layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.server.request_timeout_secs),
    ));

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Some(handle) = reconciler {
        if let Err(e) = handle.await {
            warn!(error = %e, "Reconciliation job ended abnormally");
        }
    }
    info!("Server shutdown complete");

    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cambio=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if log.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolves on Ctrl+C or SIGTERM, and stops background work.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}
