//! winperfd - Windows performance-counter exporter.
//!
//! Builds the selected collectors once at startup and serves one scrape
//! round per `/metrics` request in the Prometheus text format.

mod handlers;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use clap::Parser;
use tower_http::compression::CompressionLayer;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

use winperf_core::collector::{BuildContext, Registry, Scheduler, SlotState};
use winperf_core::config::{NoDataPolicy, ScrapeConfig};
use winperf_core::pdh::PdhApi;

use state::{AppInner, SharedState};

// ============================================================
// CLI
// ============================================================

#[derive(Parser)]
#[command(name = "winperfd", about = "Windows performance counter exporter", version = winperf_core::VERSION)]
struct Args {
    /// Listen address.
    #[arg(long, default_value = "0.0.0.0:9182", env = "WINPERF_LISTEN")]
    listen: String,

    /// Comma-separated list of collectors to enable.
    #[arg(
        long,
        default_value = "logical_disk",
        env = "WINPERF_COLLECTORS",
        value_delimiter = ','
    )]
    collectors: Vec<String>,

    /// Scrape deadline in seconds when the scraper announces none.
    #[arg(long, default_value = "10", env = "WINPERF_SCRAPE_TIMEOUT", value_parser = parse_seconds)]
    scrape_timeout: Duration,

    /// Seconds subtracted from the scraper's announced timeout.
    #[arg(long, default_value = "0.5", env = "WINPERF_TIMEOUT_MARGIN", value_parser = parse_seconds)]
    timeout_margin: Duration,

    /// Treatment of collectors that report no data: "transient" or "permanent".
    #[arg(long, default_value = "transient", env = "WINPERF_NO_DATA_POLICY")]
    no_data_policy: NoDataPolicy,

    /// Seconds shutdown waits for busy collectors.
    #[arg(long, default_value = "5", env = "WINPERF_SHUTDOWN_GRACE", value_parser = parse_seconds)]
    shutdown_grace: Duration,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn scrape_config(&self) -> ScrapeConfig {
        ScrapeConfig {
            default_timeout: self.scrape_timeout,
            timeout_margin: self.timeout_margin,
            no_data_policy: self.no_data_policy,
            shutdown_grace: self.shutdown_grace,
        }
    }
}

/// Parses a non-negative number of seconds, e.g. "10" or "0.5".
fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("invalid seconds '{}': {}", s, e))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid seconds '{}': {}", s, e))
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["winperfd", "winperf_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

// ============================================================
// Main
// ============================================================

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let config = args.scrape_config();
    info!(
        version = winperf_core::VERSION,
        collectors = ?args.collectors,
        no_data_policy = %config.no_data_policy,
        "winperfd starting"
    );

    // Collectors are built before the runtime exists; build is synchronous.
    let mut scheduler = Scheduler::from_registry(&Registry::builtin(), &args.collectors, config)
        .context("invalid collector selection")?;
    scheduler.build_all(&BuildContext::new(create_pdh()));
    for descriptor in scheduler.descriptors().iter().filter(|d| d.enabled) {
        match &descriptor.state {
            SlotState::Built => info!(collector = descriptor.name, "collector ready"),
            SlotState::Closed(reason) => warn!(collector = descriptor.name, reason = %reason, "collector disabled"),
            SlotState::Unbuilt => {}
        }
    }

    let addr: SocketAddr = args
        .listen
        .parse()
        .with_context(|| format!("invalid listen address '{}'", args.listen))?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?
        .block_on(async_main(addr, scheduler))
}

async fn async_main(addr: SocketAddr, scheduler: Scheduler) -> anyhow::Result<()> {
    let grace = scheduler.config().shutdown_grace;
    let state: SharedState = Arc::new(AppInner::new(scheduler));
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutting down collectors");
    state.scheduler.lock().await.close_all(grace).await;
    info!("winperfd stopped");
    Ok(())
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/metrics", get(handlers::handle_metrics))
        .route("/health", get(handlers::handle_health))
        .route("/api/v1/collectors", get(handlers::handle_collectors))
        .with_state(state)
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[cfg(windows)]
fn create_pdh() -> Arc<dyn PdhApi> {
    Arc::new(winperf_core::pdh::WinPdh::new())
}

#[cfg(not(windows))]
fn create_pdh() -> Arc<dyn PdhApi> {
    warn!("PDH is only available on Windows, serving a simulated host");
    Arc::new(winperf_core::pdh::MockPdh::adfs_host())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;
    use winperf_core::exposition::CONTENT_TYPE;
    use winperf_core::pdh::MockPdh;

    fn typical_host_router() -> Router {
        let mut scheduler = Scheduler::from_registry(
            &Registry::builtin(),
            &["adfs", "logical_disk"],
            ScrapeConfig::default(),
        )
        .unwrap();
        scheduler.build_all(&BuildContext::new(Arc::new(MockPdh::typical_host())));
        build_router(Arc::new(AppInner::new(scheduler)))
    }

    async fn get_body(app: &Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let request = Request::builder()
            .uri(uri)
            .header(handlers::SCRAPE_TIMEOUT_HEADER, "2")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_endpoint_serves_partial_scrape() {
        let app = typical_host_router();

        let (status, content_type, body) = get_body(&app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(CONTENT_TYPE));
        assert!(body.contains("windows_logical_disk_free_bytes{volume=\"C:\"}"), "{}", body);
        assert!(body.contains("windows_exporter_collector_success{collector=\"adfs\"} 0"));
        assert!(body.contains("windows_exporter_collector_success{collector=\"logical_disk\"} 1"));
        assert!(body.contains("windows_exporter_scrape_failed_collectors 1"));

        let (status, _, body) = get_body(&app, "/api/v1/collectors").await;
        assert_eq!(status, StatusCode::OK);
        let status: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(status["last_scrape"]["failed_collectors"], 1);
        assert_eq!(status["collectors"][0]["name"], "adfs");
        assert_eq!(status["collectors"][0]["state"]["state"], "closed");
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = typical_host_router();
        let (status, _, body) = get_body(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("10"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_seconds(" 0.5 "), Ok(Duration::from_millis(500)));
        assert!(parse_seconds("-1").is_err());
        assert!(parse_seconds("ten").is_err());
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["winperfd"]);
        assert_eq!(args.collectors, vec!["logical_disk"]);
        assert_eq!(args.scrape_config(), ScrapeConfig::default());
    }

    #[test]
    fn test_args_collector_list() {
        let args = Args::parse_from(["winperfd", "--collectors", "adfs,logical_disk", "--no-data-policy", "permanent"]);
        assert_eq!(args.collectors, vec!["adfs", "logical_disk"]);
        assert_eq!(args.no_data_policy, NoDataPolicy::Permanent);
    }
}
