//! Boxoffice HTTP server.
//!
//! Connects to `PostgreSQL`, applies migrations, starts the reservation sweeper
//! and serves the checkout API until Ctrl+C or SIGTERM.
//!
//! # Environment
//!
//! See [`boxoffice_web::Config`] for every variable. `RUST_LOG` controls log
//! filtering (default `info,boxoffice=debug,sqlx=warn`).

use anyhow::Context as _;
use boxoffice_core::{OsRngTokenSource, SystemClock};
use boxoffice_postgres::PostgresStores;
use boxoffice_runtime::{CheckoutEnvironment, ReservationSweeper, TracingNotifier};
use boxoffice_web::{AppState, Config, router};
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,boxoffice=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Boxoffice server");

    let config = Config::from_env();

    let metrics_addr = config.metrics_addr()?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    boxoffice_runtime::metrics::register_business_metrics();
    info!(%metrics_addr, "Metrics exporter listening");

    let pool_options = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout));
    let stores = PostgresStores::connect(&config.database.url, pool_options).await?;
    stores.migrate().await?;
    info!("Database ready");

    let environment = CheckoutEnvironment {
        clock: Arc::new(SystemClock),
        ledger: Arc::new(stores.ledger()),
        discounts: Arc::new(stores.discounts()),
        orders: Arc::new(stores.orders()),
        notifier: Arc::new(TracingNotifier),
        tokens: Arc::new(OsRngTokenSource),
    };

    let (sweeper, stop_sweeper) = ReservationSweeper::new(
        Arc::clone(&environment.ledger),
        Arc::clone(&environment.clock),
        config.sweep_interval(),
    );
    let sweeper_handle = tokio::spawn(sweeper.run());

    let state = AppState::new(environment, config.checkout_config())?;

    let http_addr = config.http_addr()?;
    let listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("Failed to bind {http_addr}"))?;
    info!(%http_addr, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    stop_sweeper.send(true).ok();
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout);
    if tokio::time::timeout(shutdown_timeout, sweeper_handle).await.is_err() {
        tracing::warn!("Reservation sweeper did not stop in time");
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
