//! Declarative collector over one performance object.
//!
//! A domain collector is a static [`PerfSpec`]: which object to read, in
//! which value format, and a table mapping record fields to metrics. The
//! generic [`PerfCollector`] does the rest.

use tracing::trace;

use crate::metric::{Metric, MetricKind, MetricSink, fq_name};
use crate::pdh::{CollectError, CounterRecord, InstanceFilter, TypedCollector, ValueFormat};

use super::{BuildContext, Collector};

/// One metric of a collector's table.
pub struct MetricDef<R> {
    /// Name after `windows_<collector>_`.
    pub suffix: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub value: fn(&R) -> f64,
    /// Unit conversion applied at emission.
    pub multiplier: f64,
}

impl<R> MetricDef<R> {
    pub const fn counter(suffix: &'static str, help: &'static str, value: fn(&R) -> f64) -> Self {
        Self {
            suffix,
            help,
            kind: MetricKind::Counter,
            value,
            multiplier: 1.0,
        }
    }

    pub const fn gauge(suffix: &'static str, help: &'static str, value: fn(&R) -> f64) -> Self {
        Self {
            suffix,
            help,
            kind: MetricKind::Gauge,
            value,
            multiplier: 1.0,
        }
    }

    pub const fn scaled(self, multiplier: f64) -> Self {
        Self { multiplier, ..self }
    }
}

/// Static description of a declarative collector.
pub struct PerfSpec<R: 'static> {
    pub name: &'static str,
    pub object: &'static str,
    pub format: ValueFormat,
    /// Label carrying the instance name, for multi-instance records.
    pub instance_label: Option<&'static str>,
    /// Instances that are never emitted (e.g. `_Total`).
    pub exclude_instances: &'static [&'static str],
    pub metrics: &'static [MetricDef<R>],
}

/// [`Collector`] driven by a [`PerfSpec`].
pub struct PerfCollector<R: CounterRecord> {
    spec: &'static PerfSpec<R>,
    filter: InstanceFilter,
    typed: Option<TypedCollector<R>>,
    records: Vec<R>,
}

impl<R: CounterRecord> PerfCollector<R> {
    pub fn new(spec: &'static PerfSpec<R>) -> Self {
        Self {
            spec,
            filter: InstanceFilter::All,
            typed: None,
            records: Vec::new(),
        }
    }

    /// Restricts the subscription to the named instances.
    pub fn with_filter(mut self, filter: InstanceFilter) -> Self {
        self.filter = filter;
        self
    }

    fn emit(&self, sink: &mut MetricSink) {
        let spec = self.spec;
        let records: Vec<&R> = self
            .records
            .iter()
            .filter(|r| {
                r.instance()
                    .is_none_or(|name| !spec.exclude_instances.contains(&name))
            })
            .collect();

        for def in spec.metrics {
            for record in &records {
                let mut metric = Metric::new(
                    fq_name(spec.name, def.suffix),
                    def.help,
                    def.kind,
                    (def.value)(record) * def.multiplier,
                );
                if let (Some(label), Some(instance)) = (spec.instance_label, record.instance()) {
                    metric = metric.with_label(label, instance);
                }
                sink.push(metric);
            }
        }
        trace!(collector = spec.name, records = records.len(), metrics = sink.len(), "emitted");
    }
}

impl<R: CounterRecord> Collector for PerfCollector<R> {
    fn name(&self) -> &'static str {
        self.spec.name
    }

    fn build(&mut self, ctx: &BuildContext) -> Result<(), CollectError> {
        if self.typed.is_some() {
            return Err(CollectError::Configuration(format!(
                "collector '{}' was already built",
                self.spec.name
            )));
        }
        let mut typed = TypedCollector::new(
            ctx.pdh(),
            self.spec.object,
            self.spec.format,
            self.filter.clone(),
        );
        let result = typed.build();
        self.typed = Some(typed);
        result
    }

    fn collect(&mut self, sink: &mut MetricSink) -> Result<(), CollectError> {
        let typed = self.typed.as_mut().ok_or_else(|| {
            CollectError::Configuration(format!("collector '{}' is not built", self.spec.name))
        })?;
        typed.collect(&mut self.records)?;
        self.emit(sink);
        Ok(())
    }

    fn close(&mut self) -> Result<(), CollectError> {
        match self.typed.as_mut() {
            Some(typed) => typed.close(),
            None => Ok(()),
        }
    }
}
