//! Protocol-level metric model.
//!
//! Collectors emit [`Metric`] values into a per-round [`MetricSink`]; the
//! scrape aggregator concatenates sinks and the exposition layer renders the
//! result.

use std::fmt;

use serde::Serialize;

/// Prefix of every metric exported by this agent.
pub const NAMESPACE: &str = "windows";

/// Joins namespace, subsystem and name with `_`, skipping empty parts.
pub fn fq_name(subsystem: &str, name: &str) -> String {
    [NAMESPACE, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// Type tag of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        })
    }
}

/// One sample with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    /// Label pairs in emission order.
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

impl Metric {
    pub fn new(name: impl Into<String>, help: impl Into<String>, kind: MetricKind, value: f64) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind,
            labels: Vec::new(),
            value,
        }
    }

    pub fn counter(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self::new(name, help, MetricKind::Counter, value)
    }

    pub fn gauge(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self::new(name, help, MetricKind::Gauge, value)
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((name.into(), value.into()));
        self
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Append-only buffer a collector writes into during one `collect` call.
#[derive(Debug, Default)]
pub struct MetricSink {
    metrics: Vec<Metric>,
}

impl MetricSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, metric: Metric) {
        self.metrics.push(metric);
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn into_metrics(self) -> Vec<Metric> {
        self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fq_name() {
        assert_eq!(fq_name("adfs", "passive_requests_total"), "windows_adfs_passive_requests_total");
        assert_eq!(fq_name("", "up"), "windows_up");
    }

    #[test]
    fn test_sink_keeps_emission_order() {
        let mut sink = MetricSink::new();
        sink.push(Metric::gauge("b", "second", 2.0));
        sink.push(Metric::counter("a", "first", 1.0).with_label("volume", "C:"));

        let metrics = sink.into_metrics();
        assert_eq!(metrics[0].name, "b");
        assert_eq!(metrics[1].label("volume"), Some("C:"));
        assert_eq!(metrics[1].kind, MetricKind::Counter);
    }
}
