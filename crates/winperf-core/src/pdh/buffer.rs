//! Counter-array buffer negotiation.
//!
//! PDH cannot tell the caller up front how many bytes a multi-instance
//! counter array needs. The call is made with the current buffer; when the OS
//! answers "more data" with a required size, the buffer is grown to exactly
//! that size and the call is repeated once. A second "more data" after
//! resizing means the instance set changed twice in a row, which is reported
//! as a decode error instead of looping.

use tracing::{debug, trace};

use super::api::{ArrayError, ArrayItem, CounterHandle, PdhApi, PdhStatus, ValueFormat};
use super::error::CollectError;

/// Upper bound of counter-array calls per fetch.
pub const MAX_ATTEMPTS: usize = 2;

const WORD: usize = std::mem::size_of::<u64>();

/// Reusable counter-array buffer of one query.
///
/// The buffer keeps the size of the last successful fetch, so steady-state
/// scrapes need no resize round-trip.
#[derive(Debug, Default)]
pub struct BufferNegotiator {
    buffer: Vec<u64>,
    attempts: usize,
    resizes: usize,
}

impl BufferNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current buffer capacity in bytes.
    pub fn size_bytes(&self) -> usize {
        self.buffer.len() * WORD
    }

    /// Total counter-array calls issued.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Total reallocations performed.
    pub fn resizes(&self) -> usize {
        self.resizes
    }

    /// Fetches the value array of `counter`, growing the buffer at most once.
    pub fn fetch(
        &mut self,
        api: &dyn PdhApi,
        object: &str,
        counter: CounterHandle,
        format: ValueFormat,
    ) -> Result<Vec<ArrayItem>, CollectError> {
        let mut last_required = 0;

        for attempt in 1..=MAX_ATTEMPTS {
            self.attempts += 1;
            match api.counter_array(counter, format, &mut self.buffer) {
                Ok(items) => {
                    trace!(
                        counter = counter.0,
                        attempt,
                        items = items.len(),
                        buffer_bytes = self.size_bytes(),
                        "counter array fetched"
                    );
                    return Ok(items);
                }
                Err(ArrayError::MoreData { required }) => {
                    last_required = required;
                    if attempt < MAX_ATTEMPTS {
                        debug!(
                            counter = counter.0,
                            from_bytes = self.size_bytes(),
                            to_bytes = required,
                            "growing counter array buffer"
                        );
                        self.resize(required);
                    }
                }
                Err(ArrayError::Status(status)) if status == PdhStatus::MORE_DATA => {
                    return Err(CollectError::Decode(format!(
                        "counter {} of '{}' reported more data without a required size",
                        counter.0, object
                    )));
                }
                Err(ArrayError::Status(status)) => {
                    return Err(CollectError::from_status("PdhGetCounterArray", object, status));
                }
            }
        }

        Err(CollectError::Decode(format!(
            "counter {} of '{}' still reported more data after resizing to {} bytes (OS now requires {})",
            counter.0,
            object,
            self.size_bytes(),
            last_required
        )))
    }

    fn resize(&mut self, required_bytes: usize) {
        let words = required_bytes.div_ceil(WORD);
        self.buffer.clear();
        self.buffer.resize(words, 0);
        self.resizes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdh::mock::MockPdh;

    fn disk_host() -> (MockPdh, CounterHandle) {
        let pdh = MockPdh::new();
        pdh.set_instance_value("LogicalDisk", "C:", "Free Megabytes", 100.0);
        pdh.set_instance_value("LogicalDisk", "D:", "Free Megabytes", 200.0);
        let query = pdh.open_query().unwrap();
        let counter = pdh
            .add_counter(query, "\\LogicalDisk(*)\\Free Megabytes")
            .unwrap();
        pdh.collect_query_data(query).unwrap();
        (pdh, counter)
    }

    #[test]
    fn test_first_fetch_resizes_once() {
        let (pdh, counter) = disk_host();
        let mut negotiator = BufferNegotiator::new();

        let items = negotiator.fetch(&pdh, "LogicalDisk", counter, ValueFormat::Raw).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(negotiator.attempts(), 2);
        assert_eq!(negotiator.resizes(), 1);
        assert!(negotiator.size_bytes() >= pdh.required_bytes(counter));
    }

    #[test]
    fn test_steady_state_needs_no_resize() {
        let (pdh, counter) = disk_host();
        let mut negotiator = BufferNegotiator::new();
        negotiator.fetch(&pdh, "LogicalDisk", counter, ValueFormat::Raw).unwrap();

        let before = negotiator.attempts();
        negotiator.fetch(&pdh, "LogicalDisk", counter, ValueFormat::Raw).unwrap();

        assert_eq!(negotiator.attempts() - before, 1);
        assert_eq!(negotiator.resizes(), 1);
    }

    #[test]
    fn test_growing_instance_set_resizes_again() {
        let (pdh, counter) = disk_host();
        let mut negotiator = BufferNegotiator::new();
        negotiator.fetch(&pdh, "LogicalDisk", counter, ValueFormat::Raw).unwrap();

        pdh.set_instance_value("LogicalDisk", "E:", "Free Megabytes", 300.0);
        let items = negotiator.fetch(&pdh, "LogicalDisk", counter, ValueFormat::Raw).unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(negotiator.resizes(), 2);
    }

    #[test]
    fn test_always_too_small_is_bounded_decode_error() {
        let (pdh, counter) = disk_host();
        pdh.set_always_more_data(true);
        let mut negotiator = BufferNegotiator::new();

        let err = negotiator
            .fetch(&pdh, "LogicalDisk", counter, ValueFormat::Raw)
            .unwrap_err();

        assert!(matches!(err, CollectError::Decode(_)));
        assert_eq!(negotiator.attempts(), MAX_ATTEMPTS);
        assert_eq!(pdh.stats().array_calls, MAX_ATTEMPTS);
    }
}
