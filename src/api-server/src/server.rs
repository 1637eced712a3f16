//! Listener lifecycle
//!
//! [`Server::bind`] claims the socket before any request is served, so the
//! caller knows the bound address (an ephemeral port included). The router
//! then runs until its shutdown future resolves; in production that is
//! SIGINT or SIGTERM, after which in-flight requests are drained.

use crate::{routes, state::AppState};
use anyhow::{Context, Result};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

/// Bind address
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// `0` asks the OS for a free port
    pub port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("0.0.0.0", 8080)
    }
}

/// A bound listener with the gatekeeper router ready to serve it
pub struct Server {
    listener: TcpListener,
    router: Router,
}

impl Server {
    pub async fn bind(config: &ServerConfig, state: AppState) -> Result<Self> {
        let addr = config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        Ok(Self {
            listener,
            router: routes::create_router(state),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("listener has no local address")
    }

    /// Serve until SIGINT or SIGTERM
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves, then drain open connections
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        info!(%addr, "Gatekeeper listening");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("server terminated abnormally")?;

        info!(%addr, "Gatekeeper stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let received = tokio::select! {
        _ = interrupt() => "SIGINT",
        _ = terminate() => "SIGTERM",
    };
    info!(signal = received, "Draining in-flight requests");
}

async fn interrupt() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "SIGINT handler unavailable");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use signal::unix::SignalKind;

    match signal::unix::signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
