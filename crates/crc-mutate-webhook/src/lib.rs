//! HTTP(S) front-end of the CRC mutating admission webhook.
//!
//! The server hands every admission review it receives to [`crc_mutate`] and
//! sends back the resulting review.

mod api;
mod certs;
pub mod cli;
pub mod config;
pub mod tracing;

use std::{net::SocketAddr, time::Duration};

use ::tracing::{error, info};
use anyhow::Result;
use axum::{
    Router,
    routing::{get, post},
};
use axum_server::{Handle, tls_rustls::RustlsConfig};
use tower_http::trace::{self, TraceLayer};

use crate::api::handlers::{mutate_handler, readiness_handler};
use crate::certs::create_tls_config_and_watch_certificate_changes;
use crate::config::Config;

/// Time given to in-flight requests to complete once a shutdown signal is received.
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WebhookServer {
    addr: SocketAddr,
    tls_config: Option<RustlsConfig>,
    handle: Handle,
}

impl WebhookServer {
    pub async fn new_from_config(config: Config) -> Result<Self> {
        let tls_config = match config.tls_config {
            Some(tls_config) => {
                Some(create_tls_config_and_watch_certificate_changes(tls_config).await?)
            }
            None => None,
        };

        Ok(Self {
            addr: config.addr,
            tls_config,
            handle: Handle::new(),
        })
    }

    /// Handle used to find out the bound address and to stop the server.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/mutate", post(mutate_handler))
            .route("/readiness", get(readiness_handler))
            // the API server can be pointed to any path of the service
            .fallback(post(mutate_handler))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace::DefaultMakeSpan::new().level(::tracing::Level::INFO))
                    .on_response(trace::DefaultOnResponse::new().level(::tracing::Level::INFO)),
            )
    }

    /// Serve requests until SIGTERM or SIGINT is received, or until
    /// `graceful_shutdown` is invoked on the [`Handle`].
    pub async fn run(self) -> Result<()> {
        let router = self.router();

        let signal_handle = self.handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("shutdown signal received, draining connections");
            signal_handle.graceful_shutdown(Some(GRACEFUL_SHUTDOWN_TIMEOUT));
        });

        match self.tls_config {
            Some(tls_config) => {
                info!(address = %self.addr, "started HTTPS server");
                axum_server::bind_rustls(self.addr, tls_config)
                    .handle(self.handle)
                    .serve(router.into_make_service())
                    .await?;
            }
            None => {
                info!(address = %self.addr, "started HTTP server");
                axum_server::bind(self.addr)
                    .handle(self.handle)
                    .serve(router.into_make_service())
                    .await?;
            }
        }

        info!("server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for SIGINT: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {},
        _ = terminate => {},
    }
}
