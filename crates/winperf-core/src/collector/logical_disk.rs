//! Per-volume counters of the `LogicalDisk` object.

use crate::pdh::ValueFormat;

use super::perf::{MetricDef, PerfCollector, PerfSpec};

pub const NAME: &str = "logical_disk";

/// Raw time counters tick in 100 ns units.
const TICKS_TO_SECONDS: f64 = 1e-7;
const MEGABYTE: f64 = 1024.0 * 1024.0;

crate::counter_record! {
    /// Raw values of one `LogicalDisk` instance (volume).
    pub struct LogicalDiskCounters {
        #[instance] volume,
        requests_queued: f64 => "Current Disk Queue Length",
        read_bytes: f64 => "Disk Read Bytes/sec",
        reads: f64 => "Disk Reads/sec",
        write_bytes: f64 => "Disk Write Bytes/sec",
        writes: f64 => "Disk Writes/sec",
        read_time: f64 => "% Disk Read Time",
        write_time: f64 => "% Disk Write Time",
        free_megabytes: f64 => "Free Megabytes",
        idle_time: f64 => "% Idle Time",
        split_ios: f64 => "Split IO/Sec",
    }
}

type R = LogicalDiskCounters;

const METRICS: &[MetricDef<R>] = &[
    MetricDef::gauge(
        "requests_queued",
        "The number of requests queued to the disk",
        |r: &R| r.requests_queued,
    ),
    MetricDef::counter(
        "read_bytes_total",
        "The number of bytes transferred from the disk during read operations",
        |r: &R| r.read_bytes,
    ),
    MetricDef::counter(
        "reads_total",
        "The number of read operations on the disk",
        |r: &R| r.reads,
    ),
    MetricDef::counter(
        "write_bytes_total",
        "The number of bytes transferred to the disk during write operations",
        |r: &R| r.write_bytes,
    ),
    MetricDef::counter(
        "writes_total",
        "The number of write operations on the disk",
        |r: &R| r.writes,
    ),
    MetricDef::counter(
        "read_seconds_total",
        "Seconds the disk was busy servicing read requests",
        |r: &R| r.read_time,
    )
    .scaled(TICKS_TO_SECONDS),
    MetricDef::counter(
        "write_seconds_total",
        "Seconds the disk was busy servicing write requests",
        |r: &R| r.write_time,
    )
    .scaled(TICKS_TO_SECONDS),
    MetricDef::gauge(
        "free_bytes",
        "Free space in bytes",
        |r: &R| r.free_megabytes,
    )
    .scaled(MEGABYTE),
    MetricDef::counter(
        "idle_seconds_total",
        "Seconds that the disk was idle",
        |r: &R| r.idle_time,
    )
    .scaled(TICKS_TO_SECONDS),
    MetricDef::counter(
        "split_ios_total",
        "The number of I/Os to the disk were split into multiple I/Os",
        |r: &R| r.split_ios,
    ),
];

pub static SPEC: PerfSpec<LogicalDiskCounters> = PerfSpec {
    name: NAME,
    object: "LogicalDisk",
    format: ValueFormat::Raw,
    instance_label: Some("volume"),
    exclude_instances: &["_Total"],
    metrics: METRICS,
};

pub fn new() -> PerfCollector<LogicalDiskCounters> {
    PerfCollector::new(&SPEC)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::collector::{BuildContext, Collector};
    use crate::metric::MetricSink;
    use crate::pdh::{CounterRecord, InstanceFilter, MockPdh, TypedCollector};

    #[test]
    fn test_out_of_order_volumes_are_joined() {
        let pdh = Arc::new(MockPdh::new());
        // D: is reported before C:.
        pdh.set_instance_value("LogicalDisk", "D:", "Free Megabytes", 2048.0);
        pdh.set_instance_value("LogicalDisk", "C:", "Free Megabytes", 1024.0);
        pdh.set_instance_value("LogicalDisk", "C:", "Current Disk Queue Length", 3.0);
        pdh.set_instance_value("LogicalDisk", "D:", "Current Disk Queue Length", 5.0);
        for field in LogicalDiskCounters::FIELDS {
            for volume in ["C:", "D:"] {
                if field.counter != "Free Megabytes" && field.counter != "Current Disk Queue Length" {
                    pdh.set_instance_value("LogicalDisk", volume, field.counter, 0.0);
                }
            }
        }

        let mut typed: TypedCollector<LogicalDiskCounters> =
            TypedCollector::new(pdh, "LogicalDisk", ValueFormat::Raw, InstanceFilter::All);
        typed.build().unwrap();
        let mut records = Vec::new();
        typed.collect(&mut records).unwrap();

        assert_eq!(records.len(), 2);
        let c = records.iter().find(|r| r.volume == "C:").unwrap();
        let d = records.iter().find(|r| r.volume == "D:").unwrap();
        assert_eq!((c.free_megabytes, c.requests_queued), (1024.0, 3.0));
        assert_eq!((d.free_megabytes, d.requests_queued), (2048.0, 5.0));
    }

    #[test]
    fn test_total_is_excluded_and_units_converted() {
        let pdh = Arc::new(MockPdh::typical_host());
        let mut collector = new();
        collector.build(&BuildContext::new(pdh)).unwrap();

        let mut sink = MetricSink::new();
        collector.collect(&mut sink).unwrap();

        assert!(sink.metrics().iter().all(|m| m.label("volume") != Some("_Total")));
        let free_c = sink
            .metrics()
            .iter()
            .find(|m| m.name == "windows_logical_disk_free_bytes" && m.label("volume") == Some("C:"))
            .unwrap();
        assert_eq!(free_c.value, 51_200.0 * MEGABYTE);
    }

    #[test]
    fn test_unmounted_volume_disappears() {
        let pdh = Arc::new(MockPdh::typical_host());
        let mut collector = new();
        collector.build(&BuildContext::new(pdh.clone())).unwrap();

        pdh.remove_instance("LogicalDisk", "D:");
        let mut sink = MetricSink::new();
        collector.collect(&mut sink).unwrap();
        assert!(sink.metrics().iter().all(|m| m.label("volume") != Some("D:")));
    }
}
