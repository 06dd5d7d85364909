use std::sync::Arc;

use anyhow::{Context, Result};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpListener;
use tracing::{info, warn};

use shared::types::hub_config::AppConfig;

pub mod handlers;
pub mod notify;

use notify::NotificationManager;

/// Shared state handed to every request handler.
///
/// The [`NotificationManager`] is constructed exactly once at startup and
/// passed here by reference — never reached through a global — so tests can
/// spin up a fresh instance per case.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub manager: Arc<NotificationManager>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let manager = Arc::new(NotificationManager::new(config.websocket.heartbeat_secs));
        Self {
            config: Arc::new(config),
            manager,
        }
    }
}

/// Accept loop: serve HTTP/1.1 connections on `listener`, with upgrades
/// enabled so `/ws` can switch protocols. Runs until the listener errors.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr().context("listener has no local addr")?;
    info!("Notification hub listening on http://{}", addr);

    loop {
        let (stream, peer) = listener.accept().await.context("accept failed")?;
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| {
                let state = state.clone();
                async move { handlers::routes::dispatch(req, state).await }
            });

            // with_upgrades keeps the TCP stream alive past the 101 response
            if let Err(err) = http1::Builder::new()
                .timer(TokioTimer::new())
                .serve_connection(io, service)
                .with_upgrades()
                .await
            {
                warn!("Error serving connection from {}: {:?}", peer, err);
            }
        });
    }
}
