//! Domain collectors and their orchestration.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Scheduler                           │
//! │   Unbuilt -> Built -> Closed, one shared deadline per round  │
//! │  ┌───────────────┐  ┌────────────────────┐  ┌─────────────┐  │
//! │  │ adfs          │  │ logical_disk       │  │ ...         │  │
//! │  │ PerfCollector │  │ PerfCollector      │  │ Collector   │  │
//! │  └───────┬───────┘  └─────────┬──────────┘  └──────┬──────┘  │
//! │          └──────────┬─────────┴────────────────────┘         │
//! │                     │  MetricSink per collector and round    │
//! │              ┌──────▼───────────┐                            │
//! │              │ ScrapeAggregator │ -> ScrapeOutcome           │
//! │              └──────────────────┘                            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Collectors are instantiated from an explicit [`Registry`], built once
//! at startup, collected on the blocking thread pool once per scrape and
//! closed at shutdown.

pub mod adfs;
pub mod logical_disk;
mod outcome;
mod perf;
mod registry;
mod scheduler;

use std::sync::Arc;

use crate::metric::MetricSink;
use crate::pdh::{CollectError, PdhApi};

pub use outcome::{CollectorReport, CollectorSummary, FailureReason, ScrapeAggregator, ScrapeOutcome, ScrapeSummary};
pub use perf::{MetricDef, PerfCollector, PerfSpec};
pub use registry::{CollectorFactory, Registry};
pub use scheduler::{CollectorDescriptor, Scheduler, SlotState};

/// Externally owned management connection (WMI/MI) some collectors need in
/// addition to performance counters.
///
/// The core only passes it through; it never opens or closes it.
pub trait SystemSession: Send + Sync {
    /// Namespace the session is bound to, e.g. `root/cimv2`.
    fn namespace(&self) -> &str;
}

/// Capabilities handed to [`Collector::build`].
#[derive(Clone)]
pub struct BuildContext {
    pdh: Arc<dyn PdhApi>,
    session: Option<Arc<dyn SystemSession>>,
}

impl BuildContext {
    pub fn new(pdh: Arc<dyn PdhApi>) -> Self {
        Self { pdh, session: None }
    }

    pub fn with_session(mut self, session: Arc<dyn SystemSession>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn pdh(&self) -> Arc<dyn PdhApi> {
        Arc::clone(&self.pdh)
    }

    pub fn session(&self) -> Option<&Arc<dyn SystemSession>> {
        self.session.as_ref()
    }
}

/// Lifecycle contract of a domain collector.
///
/// The scheduler calls `build` once, `collect` at most once at a time while
/// built, and `close` once. Logging goes through the `tracing` span the
/// scheduler enters around each call.
pub trait Collector: Send {
    /// Stable collector name, also the metric subsystem.
    fn name(&self) -> &'static str;

    fn build(&mut self, ctx: &BuildContext) -> Result<(), CollectError>;

    /// Emits this round's metrics into `sink`.
    fn collect(&mut self, sink: &mut MetricSink) -> Result<(), CollectError>;

    fn close(&mut self) -> Result<(), CollectError>;
}

/// Infrastructure errors of the orchestration layer.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("unknown collector '{0}'")]
    UnknownCollector(String),

    #[error("collector '{0}' is registered twice")]
    DuplicateCollector(String),
}
