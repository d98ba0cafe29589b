//! Scrape aggregation: merged metric stream plus per-collector bookkeeping.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::metric::{Metric, fq_name};

const EXPORTER: &str = "exporter";

/// Why a collector contributed nothing to a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// Still running at the round deadline.
    Timeout,
    /// Still running from an earlier, abandoned round.
    Busy,
    Panicked,
    /// Retired earlier (failed build or permanent error).
    Disabled(String),
    /// The collector returned an error this round.
    Error(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => f.write_str("timeout"),
            FailureReason::Busy => f.write_str("busy"),
            FailureReason::Panicked => f.write_str("panicked"),
            FailureReason::Disabled(reason) => write!(f, "disabled: {}", reason),
            FailureReason::Error(reason) => f.write_str(reason),
        }
    }
}

/// Outcome of one collector in one round.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorReport {
    pub name: String,
    pub duration: Duration,
    /// `None` on success.
    pub failure: Option<FailureReason>,
}

impl CollectorReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn is_timeout(&self) -> bool {
        self.failure == Some(FailureReason::Timeout)
    }
}

/// Result of one scrape round.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    /// One report per enabled collector, in registration order.
    pub reports: Vec<CollectorReport>,
    /// Collector metrics in registration order, then exporter meta-metrics.
    pub metrics: Vec<Metric>,
}

impl ScrapeOutcome {
    pub fn failed_count(&self) -> usize {
        self.reports.iter().filter(|r| !r.is_success()).count()
    }

    pub fn report(&self, name: &str) -> Option<&CollectorReport> {
        self.reports.iter().find(|r| r.name == name)
    }

    pub fn summary(&self) -> ScrapeSummary {
        ScrapeSummary {
            started_at: self.started_at.to_rfc3339(),
            duration_seconds: self.duration.as_secs_f64(),
            failed_collectors: self.failed_count(),
            collectors: self
                .reports
                .iter()
                .map(|r| CollectorSummary {
                    name: r.name.clone(),
                    success: r.is_success(),
                    duration_seconds: r.duration.as_secs_f64(),
                    failure: r.failure.clone(),
                })
                .collect(),
        }
    }
}

/// Serializable per-collector view of a round.
#[derive(Debug, Clone, Serialize)]
pub struct CollectorSummary {
    pub name: String,
    pub success: bool,
    pub duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

/// Serializable view of a round, for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeSummary {
    pub started_at: String,
    pub duration_seconds: f64,
    pub failed_collectors: usize,
    pub collectors: Vec<CollectorSummary>,
}

/// Accumulates collector results of one round.
///
/// Results must be added in registration order; the aggregator does not
/// reorder.
pub struct ScrapeAggregator {
    started_at: DateTime<Utc>,
    started: Instant,
    reports: Vec<CollectorReport>,
    metrics: Vec<Metric>,
}

impl Default for ScrapeAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrapeAggregator {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
            reports: Vec::new(),
            metrics: Vec::new(),
        }
    }

    pub fn success(&mut self, name: &str, duration: Duration, metrics: Vec<Metric>) {
        self.metrics.extend(metrics);
        self.reports.push(CollectorReport {
            name: name.to_string(),
            duration,
            failure: None,
        });
    }

    pub fn failure(&mut self, name: &str, duration: Duration, reason: FailureReason) {
        self.reports.push(CollectorReport {
            name: name.to_string(),
            duration,
            failure: Some(reason),
        });
    }

    /// Closes the round and appends the exporter meta-metrics.
    pub fn finish(mut self) -> ScrapeOutcome {
        let duration_name = fq_name(EXPORTER, "collector_duration_seconds");
        let success_name = fq_name(EXPORTER, "collector_success");
        let timeout_name = fq_name(EXPORTER, "collector_timeout");

        for r in &self.reports {
            self.metrics.push(
                Metric::gauge(
                    duration_name.as_str(),
                    "windows_exporter: Duration of a collection.",
                    r.duration.as_secs_f64(),
                )
                .with_label("collector", r.name.as_str()),
            );
        }
        for r in &self.reports {
            self.metrics.push(
                Metric::gauge(
                    success_name.as_str(),
                    "windows_exporter: Whether the collector was successful.",
                    if r.is_success() { 1.0 } else { 0.0 },
                )
                .with_label("collector", r.name.as_str()),
            );
        }
        for r in &self.reports {
            self.metrics.push(
                Metric::gauge(
                    timeout_name.as_str(),
                    "windows_exporter: Whether the collector timed out.",
                    if r.is_timeout() { 1.0 } else { 0.0 },
                )
                .with_label("collector", r.name.as_str()),
            );
        }

        let failed = self.reports.iter().filter(|r| !r.is_success()).count();
        self.metrics.push(Metric::gauge(
            fq_name(EXPORTER, "scrape_failed_collectors"),
            "windows_exporter: Number of collectors that failed in this scrape.",
            failed as f64,
        ));

        ScrapeOutcome {
            started_at: self.started_at,
            duration: self.started.elapsed(),
            reports: self.reports,
            metrics: self.metrics,
        }
    }
}
