use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use crate::{app_state::AppState, config::Config, db, identity::HttpIdentityProvider};

pub fn init_tracing() {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();
}

pub fn init_env() {
    if dotenvy::dotenv().is_err() {
        info!("No .env file found, relying on the process environment");
    }
}

/// Builds the shared state: connection pool, HTTP client and identity provider.
pub async fn init_state(config: Config) -> Result<AppState> {
    let db_pool = db::create_pool(&config.database).await?;
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .context("Failed to build HTTP client")?;
    let identity = Arc::new(HttpIdentityProvider::new(
        http_client.clone(),
        config.identity.userinfo_url.clone(),
    ));

    Ok(AppState {
        db_pool,
        http_client,
        identity,
        config: Arc::new(config),
    })
}

fn cors_layer(config: &Config) -> Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Ok(match &config.server.cors_allowed_origin {
        Some(origin) => cors.allow_origin(
            origin
                .parse::<HeaderValue>()
                .context("CORS_ALLOWED_ORIGIN is not a valid header value")?,
        ),
        None => cors.allow_origin(Any),
    })
}

/// Serves `app` until ctrl-c / SIGTERM.
pub async fn serve(service_name: &str, app: Router, config: &Config) -> Result<()> {
    let app = app
        .layer(cors_layer(config)?)
        .layer(TraceLayer::new_for_http());

    let address = format!("0.0.0.0:{}", config.server.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("{service_name} running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server terminated unexpectedly")?;

    info!("{service_name} stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to listen for ctrl-c: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => tracing::warn!("Failed to listen for SIGTERM: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
