//! Prometheus text exposition of a scrape outcome.

use prometheus::proto::{self, LabelPair, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};

use crate::metric::{Metric, MetricKind};

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, thiserror::Error)]
pub enum ExpositionError {
    #[error("failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),

    #[error("encoded metrics are not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Groups samples into families by name, in first-seen order.
///
/// HELP and TYPE of a family come from its first sample.
pub fn encode_families(metrics: &[Metric]) -> Vec<MetricFamily> {
    let mut families: Vec<MetricFamily> = Vec::new();

    for metric in metrics {
        let index = match families.iter().position(|f| f.get_name() == metric.name) {
            Some(index) => index,
            None => {
                let mut family = MetricFamily::default();
                family.set_name(metric.name.clone());
                family.set_help(metric.help.clone());
                family.set_field_type(match metric.kind {
                    MetricKind::Counter => MetricType::COUNTER,
                    MetricKind::Gauge => MetricType::GAUGE,
                });
                families.push(family);
                families.len() - 1
            }
        };

        let mut sample = proto::Metric::default();
        for (name, value) in &metric.labels {
            let mut pair = LabelPair::default();
            pair.set_name(name.clone());
            pair.set_value(value.clone());
            sample.mut_label().push(pair);
        }
        match families[index].get_field_type() {
            MetricType::COUNTER => {
                let mut counter = proto::Counter::default();
                counter.set_value(metric.value);
                sample.set_counter(counter);
            }
            _ => {
                let mut gauge = proto::Gauge::default();
                gauge.set_value(metric.value);
                sample.set_gauge(gauge);
            }
        }
        families[index].mut_metric().push(sample);
    }

    families
}

/// Renders samples in the Prometheus text format.
pub fn render(metrics: &[Metric]) -> Result<String, ExpositionError> {
    let families = encode_families(metrics);
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_families_grouped_in_first_seen_order() {
        let metrics = vec![
            Metric::gauge("windows_logical_disk_free_bytes", "Free space in bytes", 1.0).with_label("volume", "C:"),
            Metric::gauge("windows_exporter_scrape_failed_collectors", "failed", 0.0),
            Metric::gauge("windows_logical_disk_free_bytes", "Free space in bytes", 2.0).with_label("volume", "D:"),
        ];
        let families = encode_families(&metrics);

        assert_eq!(families.len(), 2);
        assert_eq!(families[0].get_name(), "windows_logical_disk_free_bytes");
        assert_eq!(families[0].get_metric().len(), 2);
        assert_eq!(families[1].get_name(), "windows_exporter_scrape_failed_collectors");
    }

    #[test]
    fn test_render_text_format() {
        let metrics = vec![
            Metric::counter(
                "windows_adfs_passive_requests_total",
                "Total passive (browser-based) requests",
                42.0,
            ),
            Metric::gauge("windows_exporter_collector_success", "success", 1.0).with_label("collector", "adfs"),
        ];
        let text = render(&metrics).unwrap();

        assert!(text.contains("# HELP windows_adfs_passive_requests_total Total passive (browser-based) requests\n"));
        assert!(text.contains("# TYPE windows_adfs_passive_requests_total counter\n"));
        assert!(text.contains("windows_adfs_passive_requests_total 42\n"));
        assert!(text.contains("# TYPE windows_exporter_collector_success gauge\n"));
        assert!(text.contains("windows_exporter_collector_success{collector=\"adfs\"} 1\n"));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&[]).unwrap(), "");
    }
}
