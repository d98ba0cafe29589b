//! winperf-core: Windows performance-counter acquisition and scrape
//! orchestration for the winperf agent.
//!
//! Provides:
//! - `pdh` - typed PDH acquisition layer (paths, query sessions, buffer
//!   negotiation, record decoding) behind the `PdhApi` seam
//! - `collector` - domain collectors, registry, scheduler, scrape aggregation
//! - `metric` - metric model and per-collector sink
//! - `exposition` - Prometheus text rendering
//! - `config` - scrape configuration

pub mod collector;
pub mod config;
pub mod exposition;
pub mod metric;
pub mod pdh;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
