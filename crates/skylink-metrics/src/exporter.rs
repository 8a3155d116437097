//! ---
//! sky_section: "06-observability"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "HTTP scrape endpoint for the Prometheus registry."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use std::net::SocketAddr;

use anyhow::{anyhow, Context, Result};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Registry, TextEncoder};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::SharedRegistry;

/// Render every registered family in the text exposition format.
pub fn render(registry: &Registry) -> prometheus::Result<String> {
    TextEncoder::new().encode_to_string(&registry.gather())
}

async fn scrape(State(registry): State<SharedRegistry>) -> Response {
    match render(&registry) {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(err) => {
            error!(error = %err, "metrics scrape failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable\n").into_response()
        }
    }
}

/// A running `/metrics` endpoint.
#[derive(Debug)]
pub struct MetricsExporter {
    local_addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl MetricsExporter {
    /// Bind `addr` and serve `registry` on a background task.
    pub async fn start(registry: SharedRegistry, addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("cannot bind metrics endpoint on {addr}"))?;
        let local_addr = listener.local_addr()?;
        let router = Router::new()
            .route("/metrics", get(scrape))
            .with_state(registry);

        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    stopped.await.ok();
                })
                .await
        });
        info!(address = %local_addr, "metrics endpoint listening");
        Ok(Self {
            local_addr,
            stop: Some(stop),
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting scrapes and wait for in-flight ones to finish.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(stop) = self.stop.take() {
            stop.send(()).ok();
        }
        let served = self
            .task
            .await
            .map_err(|err| anyhow!("metrics task panicked: {err}"))?;
        served.context("metrics endpoint failed")?;
        debug!(address = %self.local_addr, "metrics endpoint stopped");
        Ok(())
    }
}
