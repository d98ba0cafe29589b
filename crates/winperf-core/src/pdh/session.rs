//! Query session: the single owner of one native query handle.

use std::sync::Arc;

use tracing::{debug, warn};

use super::api::{CounterHandle, PdhApi, PdhStatus, QueryHandle, ValueFormat};
use super::buffer::BufferNegotiator;
use super::decode::RawSample;
use super::error::CollectError;
use super::path::CounterSet;

/// One open PDH query and its counter subscriptions.
///
/// The handle is released exactly once: by [`QuerySession::close`] or, on any
/// other exit path, when the session is dropped.
pub struct QuerySession {
    api: Arc<dyn PdhApi>,
    object: String,
    format: ValueFormat,
    query: Option<QueryHandle>,
    /// `(field index, handle)` in subscription order.
    counters: Vec<(usize, CounterHandle)>,
    negotiator: BufferNegotiator,
}

impl QuerySession {
    /// Opens an empty query for `object`. A missing object surfaces when
    /// its counters are subscribed.
    pub fn open(
        api: Arc<dyn PdhApi>,
        object: &str,
        format: ValueFormat,
    ) -> Result<Self, CollectError> {
        let query = api.open_query().map_err(|status| CollectError::Pdh {
            call: "PdhOpenQueryW",
            status,
        })?;
        debug!(object, query = query.0, "query opened");

        Ok(Self {
            api,
            object: object.to_string(),
            format,
            query: Some(query),
            counters: Vec::new(),
            negotiator: BufferNegotiator::new(),
        })
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    pub fn is_open(&self) -> bool {
        self.query.is_some()
    }

    pub fn negotiator(&self) -> &BufferNegotiator {
        &self.negotiator
    }

    /// Subscribes every counter of `set`. Allowed once per session.
    pub fn add_counters(&mut self, set: &CounterSet) -> Result<(), CollectError> {
        let query = self.handle()?;
        if !self.counters.is_empty() {
            return Err(CollectError::Configuration(format!(
                "counters of '{}' are already subscribed",
                self.object
            )));
        }

        for (index, descriptor) in &set.counters {
            let path = descriptor.path();
            let handle = self.api.add_counter(query, &path).map_err(|status| match status {
                PdhStatus::CSTATUS_NO_OBJECT => CollectError::CounterObjectUnavailable {
                    object: self.object.clone(),
                },
                PdhStatus::CSTATUS_NO_COUNTER
                | PdhStatus::CSTATUS_BAD_COUNTERNAME
                | PdhStatus::INVALID_PATH => {
                    CollectError::Configuration(format!("cannot subscribe '{}': {}", path, status))
                }
                other => CollectError::Pdh {
                    call: "PdhAddEnglishCounterW",
                    status: other,
                },
            })?;
            self.counters.push((*index, handle));
        }

        debug!(object = %self.object, counters = self.counters.len(), "counters subscribed");
        Ok(())
    }

    /// Takes the first sample so rate counters have a baseline.
    ///
    /// Transient and no-data statuses are tolerated here: the object may
    /// legitimately have no instances yet.
    pub fn prime(&mut self) -> Result<(), CollectError> {
        let query = self.handle()?;
        match self.api.collect_query_data(query) {
            Ok(()) => Ok(()),
            Err(status) => {
                let err = CollectError::from_status("PdhCollectQueryData", &self.object, status);
                if err.is_transient() || err.is_no_data() {
                    debug!(object = %self.object, error = %err, "priming sample skipped");
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Samples the query and reads every subscribed counter.
    ///
    /// A transient error is retried exactly once before it is surfaced.
    pub fn collect(&mut self) -> Result<Vec<RawSample>, CollectError> {
        let query = self.handle()?;
        match self.acquire(query) {
            Err(err) if err.is_transient() => {
                debug!(object = %self.object, error = %err, "transient collection error, retrying");
                self.acquire(query)
            }
            other => other,
        }
    }

    fn acquire(&mut self, query: QueryHandle) -> Result<Vec<RawSample>, CollectError> {
        self.api
            .collect_query_data(query)
            .map_err(|status| CollectError::from_status("PdhCollectQueryData", &self.object, status))?;

        let mut samples = Vec::new();
        for &(counter_id, handle) in &self.counters {
            let items = self
                .negotiator
                .fetch(self.api.as_ref(), &self.object, handle, self.format)?;
            samples.extend(items.into_iter().map(|item| RawSample {
                counter_id,
                instance: item.instance,
                value: item.value,
            }));
        }
        Ok(samples)
    }

    /// Removes every subscription but keeps the query open.
    pub fn remove_counters(&mut self) {
        for (_, handle) in self.counters.drain(..) {
            if let Err(status) = self.api.remove_counter(handle) {
                debug!(object = %self.object, %status, "PdhRemoveCounter failed");
            }
        }
    }

    /// Releases the subscriptions and the query. Later calls are no-ops.
    pub fn close(&mut self) {
        let Some(query) = self.query.take() else {
            return;
        };
        self.remove_counters();
        match self.api.close_query(query) {
            Ok(()) => debug!(object = %self.object, query = query.0, "query closed"),
            Err(status) => warn!(object = %self.object, %status, "PdhCloseQuery failed"),
        }
    }

    fn handle(&self) -> Result<QueryHandle, CollectError> {
        self.query.ok_or_else(|| {
            CollectError::Configuration(format!("query session for '{}' is closed", self.object))
        })
    }
}

impl Drop for QuerySession {
    fn drop(&mut self) {
        self.close();
    }
}
