use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::routing::{get, post};
use clap::Parser;
use oracle_protocol::paths;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

mod config;
mod error;
mod proxy;
mod relay;

use crate::config::{Cli, GatewayConfig};

#[derive(Clone)]
struct AppState {
    config: Arc<GatewayConfig>,
    /// Shared upstream client. No overall timeout: streams are open-ended.
    http: reqwest::Client,
}

impl AppState {
    fn new(config: GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route(paths::HEALTH, get(proxy::healthz))
        .route(paths::STREAM, post(relay::stream_plan))
        .route(paths::RUN, post(proxy::run_plan))
        .route(paths::ASSESS, post(proxy::assess_ride))
        .route(
            &format!("{}/{{session_id}}", paths::ARTIFACTS),
            get(proxy::list_artifacts),
        )
        .route(paths::DOWNLOAD_ARTIFACT, post(proxy::download_artifact))
        .fallback(proxy::not_found)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let config = GatewayConfig::from(Cli::parse());
    let listen = config.listen;
    let upstream = config.orchestrator_url.clone();
    let risk_fallback = config.risk_fallback;
    let app = router(AppState::new(config)?);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!(%listen, %upstream, risk_fallback, "oracle-gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    {
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(error) => {
                    tracing::error!(%error, "failed to install SIGTERM handler");
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}

#[cfg(test)]
mod testing {
    use axum::Router;

    use super::{AppState, router};
    use crate::config::GatewayConfig;

    pub async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}")
    }

    /// Gateway on an ephemeral port; returns its base URL.
    pub async fn spawn_gateway(config: GatewayConfig) -> String {
        serve(router(AppState::new(config).unwrap())).await
    }
}
