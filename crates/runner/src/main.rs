use anyhow::{Context, Result, anyhow};
use clap::Parser;
use route_schema::{RouteSchemaConfig, RouteSchemaRegistry};
use runner::version::VERSION;
use runner::{replay, whitelists};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "route-schema-replay", version = VERSION)]
struct Args {
    /// YAML config; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// NDJSON file of recorded exchanges, or `-` for stdin.
    #[arg(short, long, default_value = "-")]
    events: String,
    /// Serve Prometheus metrics on this address while replaying.
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,
    /// Log filter, e.g. `info` or `route_schema=debug`.
    #[arg(long)]
    log_level: Option<String>,
    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = o11y::O11yConfig {
        logging: o11y::logging::Config {
            level: args.log_level.clone(),
            json: args.json_logs,
            with_targets: false,
        },
        metrics: o11y::rs_metrics::Config {
            enable: true,
            http_listener: args.metrics_addr,
        },
        install_panic_hook: true,
    };
    o11y::init_all(&cfg).map_err(|e| anyhow!("init observability: {e}"))?;
    info!(version = VERSION, "route-schema-replay starting");

    let config = load_config(args.config.as_ref())?;
    let mut registry = RouteSchemaRegistry::new(config);

    let events = args.events.clone();
    let (mut registry, stats) = tokio::task::spawn_blocking(move || -> Result<_> {
        let stats = if events == "-" {
            replay(&mut registry, io::stdin().lock())?
        } else {
            let file = File::open(&events).with_context(|| format!("open events file {events}"))?;
            replay(&mut registry, BufReader::new(file))?
        };
        Ok((registry, stats))
    })
    .await
    .context("replay task")??;

    let report = whitelists(&mut registry);
    debug!(?stats, snapshots = ?registry.snapshots(), "registry state");

    {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, &report).context("write whitelists")?;
        writeln!(out).context("write whitelists")?;
    }

    registry.flush().await;
    info!(
        routes = report.len(),
        crystallised = report.keys().filter(|r| registry.is_crystallised(r)).count(),
        cache = ?registry.cache_mode(),
        "done"
    );
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<RouteSchemaConfig> {
    let Some(path) = path else {
        info!("no config given; using defaults");
        return Ok(RouteSchemaConfig::default());
    };
    let config = route_schema_config::load_from_path(path)
        .with_context(|| format!("load config {}", path.display()))?;
    info!(path = %path.display(), cache = config.cache, "config loaded");
    debug!(config = ?config, "route schema config");
    Ok(config)
}
