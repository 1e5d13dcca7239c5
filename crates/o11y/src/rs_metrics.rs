use axum::{Router, routing::get};
use metrics::{Unit, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::{net::SocketAddr, time::Duration};
use tokio::net::TcpListener;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();
static LISTENER: OnceCell<SocketAddr> = OnceCell::new();

#[derive(Clone, Debug)]
pub struct Config {
    pub enable: bool,
    /// Serve `/metrics` on this address. Requires a running tokio runtime.
    pub http_listener: Option<SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable: true,
            http_listener: None,
        }
    }
}

pub fn init(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if !cfg.enable {
        return Ok(());
    }

    HANDLE.get_or_try_init(|| PrometheusBuilder::new().install_recorder())?;

    if let Some(addr) = cfg.http_listener {
        if LISTENER.set(addr).is_ok() {
            tokio::spawn(serve(addr));
        } else {
            tracing::debug!(%addr, running = ?LISTENER.get(), "metrics listener already started");
        }
    }

    describe_metrics();

    Ok(())
}

async fn serve(addr: SocketAddr) {
    let router = router_with_metrics();
    // Retry binding a few times in case of startup races (tests)
    let mut tries = 0;
    loop {
        match TcpListener::bind(addr).await {
            Ok(l) => {
                tracing::info!(%addr, "serving metrics");
                axum::serve(l, router).await.ok();
                break;
            }
            Err(e) if tries < 5 => {
                tries += 1;
                tracing::warn!(error=%e, tries, "metrics listener bind failed; retrying");
                tokio::time::sleep(Duration::from_millis(150)).await;
            }
            Err(e) => {
                tracing::error!(error=%e, "metrics listener failed; giving up");
                break;
            }
        }
    }
}

/// Address of the `/metrics` listener, once one has been started.
pub fn listener_addr() -> Option<SocketAddr> {
    LISTENER.get().copied()
}

/// Axum handler that renders the current metrics snapshot.
pub async fn metrics_handler() -> String {
    render()
}

/// Current Prometheus text exposition.
pub fn render() -> String {
    HANDLE
        .get()
        .map(|h| h.render())
        .unwrap_or_else(|| "# recorder not installed\n".into())
}

pub fn router_with_metrics() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

pub fn describe_metrics() {
    describe_counter!(
        "route_schema_events_total",
        Unit::Count,
        "Observed exchanges fed into route schema accumulators"
    );
    describe_counter!(
        "route_schema_frozen_total",
        Unit::Count,
        "Accumulators frozen, by schema key"
    );
    describe_counter!(
        "route_schema_crystallised_total",
        Unit::Count,
        "Routes whose whitelist crystallised"
    );
    describe_counter!(
        "route_schema_cache_writes_total",
        Unit::Count,
        "Whitelist cache writes, by outcome"
    );
    describe_counter!(
        "route_schema_panics_total",
        Unit::Count,
        "Panics captured by the panic hook"
    );
}
