//! Typed collector: the generic acquisition primitive of domain collectors.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use super::api::{PdhApi, ValueFormat};
use super::decode::decode_records;
use super::error::CollectError;
use super::path::{InstanceFilter, build_counter_set};
use super::record::CounterRecord;
use super::session::QuerySession;

enum State {
    Unbuilt,
    Built(QuerySession),
    Closed,
}

/// Collects one performance object into records of type `R`.
///
/// Lifecycle: [`new`](Self::new) touches nothing, [`build`](Self::build)
/// opens and primes the query, [`collect`](Self::collect) runs once per
/// scrape, [`close`](Self::close) (or drop) releases the query.
pub struct TypedCollector<R: CounterRecord> {
    api: Arc<dyn PdhApi>,
    object: String,
    format: ValueFormat,
    filter: InstanceFilter,
    state: State,
    _record: PhantomData<fn() -> R>,
}

impl<R: CounterRecord> TypedCollector<R> {
    pub fn new(
        api: Arc<dyn PdhApi>,
        object: impl Into<String>,
        format: ValueFormat,
        filter: InstanceFilter,
    ) -> Self {
        Self {
            api,
            object: object.into(),
            format,
            filter,
            state: State::Unbuilt,
            _record: PhantomData,
        }
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    pub fn is_built(&self) -> bool {
        matches!(self.state, State::Built(_))
    }

    /// Builds the counter paths, opens the query, subscribes and primes it.
    ///
    /// On failure everything opened so far is released and the collector is
    /// left closed.
    pub fn build(&mut self) -> Result<(), CollectError> {
        if !matches!(self.state, State::Unbuilt) {
            return Err(CollectError::Configuration(format!(
                "collector for '{}' was already built",
                self.object
            )));
        }
        self.state = State::Closed;

        let set = build_counter_set(
            &self.object,
            R::FIELDS,
            R::HAS_INSTANCE,
            &self.filter,
            self.format,
        )?;

        let mut session = QuerySession::open(self.api.clone(), &self.object, self.format)?;
        if let Err(e) = session.add_counters(&set).and_then(|()| session.prime()) {
            session.close();
            return Err(e);
        }

        debug!(
            object = %self.object,
            counters = set.counters.len(),
            multi_instance = set.multi_instance,
            "typed collector built"
        );
        self.state = State::Built(session);
        Ok(())
    }

    /// Replaces the contents of `out` with freshly decoded records.
    ///
    /// Zero records is reported as [`CollectError::NoData`].
    pub fn collect(&mut self, out: &mut Vec<R>) -> Result<(), CollectError> {
        out.clear();
        let State::Built(session) = &mut self.state else {
            return Err(CollectError::Configuration(format!(
                "collect on '{}' outside the built state",
                self.object
            )));
        };
        let samples = session.collect()?;
        decode_records(&self.object, samples, out)
    }

    /// Releases the query. Succeeds before build and when repeated.
    pub fn close(&mut self) -> Result<(), CollectError> {
        if let State::Built(mut session) = std::mem::replace(&mut self.state, State::Closed) {
            session.close();
        }
        Ok(())
    }
}

impl<R: CounterRecord> Drop for TypedCollector<R> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdh::api::PdhStatus;
    use crate::pdh::mock::MockPdh;

    crate::counter_record! {
        struct Volume {
            #[instance] name,
            free_space: f64 => "Free Megabytes",
        }
    }

    crate::counter_record! {
        struct Timing {
            query_time: f64 => "Average Config Database Query Time" [scale = 1e-8],
        }
    }

    fn volumes(pdh: &Arc<MockPdh>) -> TypedCollector<Volume> {
        TypedCollector::new(pdh.clone(), "LogicalDisk", ValueFormat::Raw, InstanceFilter::All)
    }

    #[test]
    fn test_new_touches_nothing() {
        let pdh = Arc::new(MockPdh::new());
        let collector = volumes(&pdh);
        assert!(!collector.is_built());
        assert_eq!(pdh.stats(), Default::default());
    }

    #[test]
    fn test_collect_yields_one_record_per_instance() {
        let pdh = Arc::new(MockPdh::new());
        for (i, name) in ["C:", "D:", "E:"].iter().enumerate() {
            pdh.set_instance_value("LogicalDisk", name, "Free Megabytes", i as f64);
        }
        let mut collector = volumes(&pdh);
        collector.build().unwrap();

        let mut out = Vec::new();
        collector.collect(&mut out).unwrap();
        assert_eq!(out.len(), 3);

        pdh.remove_instance("LogicalDisk", "E:");
        collector.collect(&mut out).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_zero_instances_is_no_data() {
        let pdh = Arc::new(MockPdh::new());
        pdh.add_object("LogicalDisk", &["Free Megabytes"]);
        let mut collector = volumes(&pdh);
        collector.build().unwrap();

        let mut out = vec![Volume::default()];
        let err = collector.collect(&mut out).unwrap_err();
        assert!(err.is_no_data());
        assert!(out.is_empty());
    }

    #[test]
    fn test_missing_object_fails_build_without_leaking() {
        let pdh = Arc::new(MockPdh::new());
        let mut collector = volumes(&pdh);

        let err = collector.build().unwrap_err();
        assert!(matches!(err, CollectError::CounterObjectUnavailable { .. }));
        assert!(!collector.is_built());
        assert_eq!(pdh.open_queries(), 0);
    }

    #[test]
    fn test_unknown_counter_fails_build_and_closes_query() {
        let pdh = Arc::new(MockPdh::new());
        pdh.add_object("LogicalDisk", &["% Idle Time"]);
        let mut collector = volumes(&pdh);

        let err = collector.build().unwrap_err();
        assert!(matches!(err, CollectError::Configuration(_)));
        assert_eq!(pdh.stats().queries_opened, 1);
        assert_eq!(pdh.stats().queries_closed, 1);
        assert_eq!(pdh.open_queries(), 0);
    }

    #[test]
    fn test_build_twice_is_configuration_error() {
        let pdh = Arc::new(MockPdh::new());
        pdh.set_instance_value("LogicalDisk", "C:", "Free Megabytes", 1.0);
        let mut collector = volumes(&pdh);
        collector.build().unwrap();
        assert!(matches!(
            collector.build(),
            Err(CollectError::Configuration(_))
        ));
    }

    #[test]
    fn test_collect_before_build_and_after_close() {
        let pdh = Arc::new(MockPdh::new());
        pdh.set_instance_value("LogicalDisk", "C:", "Free Megabytes", 1.0);
        let mut collector = volumes(&pdh);
        let mut out = Vec::new();

        assert!(matches!(
            collector.collect(&mut out),
            Err(CollectError::Configuration(_))
        ));
        collector.build().unwrap();
        collector.close().unwrap();
        assert!(matches!(
            collector.collect(&mut out),
            Err(CollectError::Configuration(_))
        ));
        assert_eq!(pdh.stats().collect_calls, 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let pdh = Arc::new(MockPdh::new());
        pdh.set_instance_value("LogicalDisk", "C:", "Free Megabytes", 1.0);

        let mut unbuilt = volumes(&pdh);
        assert!(unbuilt.close().is_ok());
        assert!(unbuilt.close().is_ok());

        let mut collector = volumes(&pdh);
        collector.build().unwrap();
        assert!(collector.close().is_ok());
        assert!(collector.close().is_ok());
        drop(collector);

        assert_eq!(pdh.stats().queries_opened, 1);
        assert_eq!(pdh.stats().queries_closed, 1);
    }

    #[test]
    fn test_drop_closes_built_collector() {
        let pdh = Arc::new(MockPdh::new());
        pdh.set_instance_value("LogicalDisk", "C:", "Free Megabytes", 1.0);
        let mut collector = volumes(&pdh);
        collector.build().unwrap();
        drop(collector);
        assert_eq!(pdh.open_queries(), 0);
    }

    #[test]
    fn test_scale_round_trip() {
        let pdh = Arc::new(MockPdh::new());
        let ticks = 987_654_321.0;
        pdh.set_value("AD FS", "Average Config Database Query Time", ticks);
        let mut collector: TypedCollector<Timing> =
            TypedCollector::new(pdh.clone(), "AD FS", ValueFormat::Double, InstanceFilter::All);
        collector.build().unwrap();

        let mut out = Vec::new();
        collector.collect(&mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert!((out[0].query_time - ticks * 1e-8).abs() < 1e-9);
    }

    #[test]
    fn test_decode_attempts_bounded() {
        let pdh = Arc::new(MockPdh::new());
        pdh.set_instance_value("LogicalDisk", "C:", "Free Megabytes", 1.0);
        let mut collector = volumes(&pdh);
        collector.build().unwrap();
        pdh.set_always_more_data(true);

        let before = pdh.stats().array_calls;
        let mut out = Vec::new();
        let err = collector.collect(&mut out).unwrap_err();
        assert!(matches!(err, CollectError::Decode(_)));
        assert_eq!(pdh.stats().array_calls - before, 2);
    }

    #[test]
    fn test_transient_prime_does_not_fail_build() {
        let pdh = Arc::new(MockPdh::new());
        pdh.set_instance_value("LogicalDisk", "C:", "Free Megabytes", 1.0);
        pdh.fail_next_collects(1, PdhStatus::CALC_NEGATIVE_DENOMINATOR);
        let mut collector = volumes(&pdh);
        assert!(collector.build().is_ok());
    }
}
