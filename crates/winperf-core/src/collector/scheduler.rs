//! Scrape scheduling with a shared deadline and per-collector isolation.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn};

use crate::config::{NoDataPolicy, ScrapeConfig};
use crate::metric::MetricSink;
use crate::pdh::CollectError;

use super::outcome::{FailureReason, ScrapeAggregator, ScrapeOutcome};
use super::{BuildContext, Collector, Registry, SchedulerError};

/// Lifecycle state of a registered collector. Transitions only move forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SlotState {
    Unbuilt,
    Built,
    /// Closed, with the reason it was retired.
    Closed(String),
}

/// Registry slot as seen from outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectorDescriptor {
    pub name: &'static str,
    pub enabled: bool,
    pub state: SlotState,
}

type SharedCollector = Arc<Mutex<Box<dyn Collector>>>;
type CollectorGuard = OwnedMutexGuard<Box<dyn Collector>>;

/// What a collect task hands back: the lock, so the collector can be
/// retired, plus its result, output and own duration.
type Finished = (CollectorGuard, Result<(), CollectError>, MetricSink, Duration);

/// Deadlines further out than this are clamped.
const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 3600);

struct Slot {
    name: &'static str,
    enabled: bool,
    state: SlotState,
    collector: SharedCollector,
    /// Collect call abandoned by an earlier round at its deadline.
    in_flight: Option<JoinHandle<Finished>>,
}

enum Pending {
    Started(JoinHandle<Finished>),
    Skipped(FailureReason),
}

/// Runs the enabled collectors once per scrape.
///
/// Every collector sits behind its own lock. A collect call holds it on the
/// blocking thread pool until it returns, even when the round that started
/// it has already given up, so there is never more than one call in flight
/// per collector.
pub struct Scheduler {
    slots: Vec<Slot>,
    config: ScrapeConfig,
}

impl Scheduler {
    /// Schedules `collectors`, all enabled, in the given order.
    pub fn new(collectors: Vec<Box<dyn Collector>>, config: ScrapeConfig) -> Result<Self, SchedulerError> {
        Self::with_slots(collectors.into_iter().map(|c| (c, true)).collect(), config)
    }

    /// Schedules every registry entry, enabling those named in `enabled`.
    pub fn from_registry<S: AsRef<str>>(
        registry: &Registry,
        enabled: &[S],
        config: ScrapeConfig,
    ) -> Result<Self, SchedulerError> {
        Self::with_slots(registry.instantiate(enabled)?, config)
    }

    fn with_slots(collectors: Vec<(Box<dyn Collector>, bool)>, config: ScrapeConfig) -> Result<Self, SchedulerError> {
        let mut slots: Vec<Slot> = Vec::with_capacity(collectors.len());
        for (collector, enabled) in collectors {
            let name = collector.name();
            if slots.iter().any(|s| s.name == name) {
                return Err(SchedulerError::DuplicateCollector(name.to_string()));
            }
            slots.push(Slot {
                name,
                enabled,
                state: SlotState::Unbuilt,
                collector: Arc::new(Mutex::new(collector)),
                in_flight: None,
            });
        }
        Ok(Self { slots, config })
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    pub fn descriptors(&self) -> Vec<CollectorDescriptor> {
        self.slots
            .iter()
            .map(|s| CollectorDescriptor {
                name: s.name,
                enabled: s.enabled,
                state: s.state.clone(),
            })
            .collect()
    }

    pub fn state(&self, name: &str) -> Option<&SlotState> {
        self.slots.iter().find(|s| s.name == name).map(|s| &s.state)
    }

    /// Builds every enabled, unbuilt collector.
    ///
    /// A failed build retires the collector with the error as reason; the
    /// other collectors are unaffected.
    pub fn build_all(&mut self, ctx: &BuildContext) {
        for slot in self.slots.iter_mut() {
            if !slot.enabled || slot.state != SlotState::Unbuilt {
                continue;
            }
            let _span = info_span!("collector.build", collector = slot.name).entered();

            let Ok(mut collector) = slot.collector.try_lock() else {
                warn!("collector locked during build");
                slot.state = SlotState::Closed("locked during build".to_string());
                continue;
            };

            let start = Instant::now();
            match catch_unwind(AssertUnwindSafe(|| collector.build(ctx))) {
                Ok(Ok(())) => {
                    info!(duration_ms = start.elapsed().as_millis() as u64, "collector built");
                    slot.state = SlotState::Built;
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "collector build failed, disabling");
                    if let Err(close_err) = collector.close() {
                        debug!(error = %close_err, "close after failed build");
                    }
                    slot.state = SlotState::Closed(e.to_string());
                }
                Err(_) => {
                    error!("collector build panicked, disabling");
                    slot.state = SlotState::Closed("build panicked".to_string());
                }
            }
        }
    }

    /// Runs one round with a deadline of `timeout` shared by all collectors.
    ///
    /// Always produces an outcome; collector failures are recorded per
    /// collector and never fail the round.
    pub async fn scrape(&mut self, timeout: Duration) -> ScrapeOutcome {
        let deadline = deadline_after(timeout);
        let round_start = Instant::now();
        let policy = self.config.no_data_policy;
        let mut aggregator = ScrapeAggregator::new();

        // Settle calls abandoned by earlier rounds that have returned since.
        for slot in self.slots.iter_mut() {
            if let Some(handle) = slot.in_flight.take_if(|h| h.is_finished()) {
                let joined = handle.await;
                settle_abandoned(slot, joined, policy);
            }
        }

        let pending: Vec<Option<Pending>> = self
            .slots
            .iter()
            .map(|slot| {
                if !slot.enabled {
                    return None;
                }
                Some(match &slot.state {
                    SlotState::Unbuilt => Pending::Skipped(FailureReason::Disabled("not built".to_string())),
                    SlotState::Closed(reason) => Pending::Skipped(FailureReason::Disabled(reason.clone())),
                    SlotState::Built if slot.in_flight.is_some() => Pending::Skipped(FailureReason::Busy),
                    SlotState::Built => match Arc::clone(&slot.collector).try_lock_owned() {
                        Ok(guard) => Pending::Started(spawn_collect(slot.name, guard)),
                        Err(_) => Pending::Skipped(FailureReason::Busy),
                    },
                })
            })
            .collect();

        for (slot, pending) in self.slots.iter_mut().zip(pending) {
            let Some(pending) = pending else {
                continue;
            };
            let mut handle = match pending {
                Pending::Started(handle) => handle,
                Pending::Skipped(reason) => {
                    debug!(collector = slot.name, %reason, "collector skipped");
                    aggregator.failure(slot.name, Duration::ZERO, reason);
                    continue;
                }
            };

            match tokio::time::timeout_at(deadline, &mut handle).await {
                Err(_) => {
                    warn!(
                        collector = slot.name,
                        timeout_ms = timeout.as_millis() as u64,
                        "collector timed out, discarding its output"
                    );
                    slot.in_flight = Some(handle);
                    aggregator.failure(slot.name, round_start.elapsed(), FailureReason::Timeout);
                }
                Ok(Err(join_error)) => {
                    let reason = if join_error.is_panic() {
                        error!(collector = slot.name, "collector panicked, disabling");
                        retire_panicked(slot);
                        FailureReason::Panicked
                    } else {
                        warn!(collector = slot.name, error = %join_error, "collector task cancelled");
                        FailureReason::Error("cancelled".to_string())
                    };
                    aggregator.failure(slot.name, round_start.elapsed(), reason);
                }
                Ok(Ok((guard, Ok(()), sink, elapsed))) => {
                    debug!(
                        collector = slot.name,
                        metrics = sink.len(),
                        duration_ms = elapsed.as_millis() as u64,
                        "collector succeeded"
                    );
                    drop(guard);
                    aggregator.success(slot.name, elapsed, sink.into_metrics());
                }
                Ok(Ok((mut guard, Err(e), _, elapsed))) => {
                    if matches!(e, CollectError::Decode(_)) {
                        error!(collector = slot.name, error = %e, "collector failed to decode counters");
                    } else {
                        warn!(collector = slot.name, error = %e, "collector failed");
                    }
                    if retires(&e, policy) {
                        retire(slot, &mut guard, &e);
                    }
                    aggregator.failure(slot.name, elapsed, FailureReason::Error(e.to_string()));
                }
            }
        }

        let outcome = aggregator.finish();
        debug!(
            collectors = outcome.reports.len(),
            failed = outcome.failed_count(),
            metrics = outcome.metrics.len(),
            duration_ms = outcome.duration.as_millis() as u64,
            "scrape finished"
        );
        outcome
    }

    /// Closes every collector that is not closed yet.
    ///
    /// Collectors still busy after `grace` are marked closed and release
    /// their query when the in-flight call returns and drops them.
    pub async fn close_all(&mut self, grace: Duration) {
        let deadline = deadline_after(grace);
        let policy = self.config.no_data_policy;
        for slot in self.slots.iter_mut() {
            // A finished abandoned call still holds the lock in its output.
            if let Some(handle) = slot.in_flight.take() {
                match tokio::time::timeout_at(deadline, handle).await {
                    Ok(joined) => settle_abandoned(slot, joined, policy),
                    Err(_) => {
                        warn!(collector = slot.name, "collector still busy at shutdown, closing on drop");
                        slot.state = SlotState::Closed("shut down".to_string());
                        continue;
                    }
                }
            }
            if matches!(slot.state, SlotState::Closed(_)) {
                continue;
            }
            match tokio::time::timeout_at(deadline, Arc::clone(&slot.collector).lock_owned()).await {
                Ok(mut guard) => match guard.close() {
                    Ok(()) => debug!(collector = slot.name, "collector closed"),
                    Err(e) => warn!(collector = slot.name, error = %e, "collector close failed"),
                },
                Err(_) => warn!(collector = slot.name, "collector still busy at shutdown, closing on drop"),
            }
            slot.state = SlotState::Closed("shut down".to_string());
        }
    }
}

fn retires(err: &CollectError, policy: NoDataPolicy) -> bool {
    err.is_permanent() || (err.is_no_data() && policy == NoDataPolicy::Permanent)
}

fn deadline_after(timeout: Duration) -> tokio::time::Instant {
    let now = tokio::time::Instant::now();
    now.checked_add(timeout.min(FAR_FUTURE)).unwrap_or(now)
}

fn retire(slot: &mut Slot, collector: &mut CollectorGuard, err: &CollectError) {
    if let Err(close_err) = collector.close() {
        debug!(collector = slot.name, error = %close_err, "close after permanent failure");
    }
    info!(collector = slot.name, reason = %err, "collector disabled");
    slot.state = SlotState::Closed(err.to_string());
}

/// Closes a collector whose collect call panicked; unwinding released its lock.
fn retire_panicked(slot: &mut Slot) {
    match slot.collector.try_lock() {
        Ok(mut collector) => {
            if let Err(close_err) = collector.close() {
                debug!(collector = slot.name, error = %close_err, "close after panic");
            }
        }
        Err(_) => warn!(collector = slot.name, "panicked collector still locked, closing on drop"),
    }
    slot.state = SlotState::Closed("collect panicked".to_string());
}

/// Applies the result of a call that returned after its round gave up on it.
/// The output is stale and dropped; permanent failures still retire.
fn settle_abandoned(slot: &mut Slot, joined: Result<Finished, tokio::task::JoinError>, policy: NoDataPolicy) {
    match joined {
        Ok((_, Ok(()), _, elapsed)) => debug!(
            collector = slot.name,
            duration_ms = elapsed.as_millis() as u64,
            "late collector result discarded"
        ),
        Ok((mut guard, Err(e), _, _)) => {
            warn!(collector = slot.name, error = %e, "abandoned collect call failed");
            if retires(&e, policy) {
                retire(slot, &mut guard, &e);
            }
        }
        Err(join_error) if join_error.is_panic() => {
            error!(collector = slot.name, "abandoned collect call panicked, disabling");
            retire_panicked(slot);
        }
        Err(join_error) => debug!(collector = slot.name, error = %join_error, "abandoned collect call cancelled"),
    }
}

fn spawn_collect(name: &'static str, mut guard: CollectorGuard) -> JoinHandle<Finished> {
    let span = info_span!("collector.collect", collector = name);
    tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        let start = Instant::now();
        let mut sink = MetricSink::new();
        let result = guard.collect(&mut sink);
        (guard, result, sink, start.elapsed())
    })
}
