//! In-memory PDH for testing the acquisition layer without Windows.
//!
//! [`MockPdh`] simulates performance objects, their instances and counter
//! values, and implements the buffer-size protocol of the real API, so the
//! full acquisition path (session, negotiator, decoder) runs unchanged in
//! tests and on non-Windows builds.

mod scenarios;

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::api::{
    ArrayError, ArrayItem, CounterHandle, CounterValue, PdhApi, PdhStatus, QueryHandle,
    ValueFormat,
};
use super::path::InstanceSelector;

/// Bytes of a `PDH_RAW_COUNTER_ITEM_W` on 64-bit Windows.
const RAW_ITEM_BYTES: usize = 48;
/// Bytes of a `PDH_FMT_COUNTERVALUE_ITEM_W` on 64-bit Windows.
const FMT_ITEM_BYTES: usize = 24;

/// Call counters of a [`MockPdh`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockStats {
    pub queries_opened: usize,
    pub queries_closed: usize,
    pub counters_added: usize,
    pub counters_removed: usize,
    pub collect_calls: usize,
    pub array_calls: usize,
}

#[derive(Debug, Default)]
struct MockObject {
    name: String,
    counters: BTreeSet<String>,
    /// Instances in the order the OS reports them.
    instances: Vec<MockInstance>,
}

#[derive(Debug)]
struct MockInstance {
    name: Option<String>,
    values: HashMap<String, f64>,
}

#[derive(Debug)]
struct MockCounter {
    query: usize,
    object: String,
    counter: String,
    selector: InstanceSelector,
}

#[derive(Debug, Default)]
struct MockState {
    objects: Vec<MockObject>,
    queries: HashMap<usize, Vec<usize>>,
    counters: HashMap<usize, MockCounter>,
    next_handle: usize,
    stats: MockStats,
    failing_collects: Vec<PdhStatus>,
    always_more_data: bool,
}

impl MockState {
    fn object(&self, name: &str) -> Option<&MockObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    fn object_mut(&mut self, name: &str) -> &mut MockObject {
        if let Some(pos) = self.objects.iter().position(|o| o.name == name) {
            return &mut self.objects[pos];
        }
        self.objects.push(MockObject {
            name: name.to_string(),
            ..MockObject::default()
        });
        let last = self.objects.len() - 1;
        &mut self.objects[last]
    }

    fn handle(&mut self) -> usize {
        self.next_handle += 1;
        self.next_handle
    }

    fn items(&self, counter: &MockCounter, format: ValueFormat) -> Result<Vec<ArrayItem>, PdhStatus> {
        let object = self
            .object(&counter.object)
            .ok_or(PdhStatus::CSTATUS_NO_OBJECT)?;

        let matches = |instance: &MockInstance| match (&counter.selector, &instance.name) {
            (InstanceSelector::None, None) => true,
            (InstanceSelector::Wildcard, Some(_)) => true,
            (InstanceSelector::Named(wanted), Some(name)) => wanted == name,
            _ => false,
        };

        let items: Vec<ArrayItem> = object
            .instances
            .iter()
            .filter(|i| matches(i))
            .filter_map(|i| {
                i.values.get(&counter.counter).map(|&v| ArrayItem {
                    instance: i.name.clone(),
                    value: match format {
                        ValueFormat::Raw => CounterValue::Raw(v as u64),
                        ValueFormat::Double => CounterValue::Double(v),
                        ValueFormat::Large => CounterValue::Large(v as i64),
                    },
                })
            })
            .collect();

        if items.is_empty() && matches!(counter.selector, InstanceSelector::Named(_)) {
            return Err(PdhStatus::CSTATUS_NO_INSTANCE);
        }
        Ok(items)
    }
}

fn required_bytes(items: &[ArrayItem], format: ValueFormat) -> usize {
    let item = match format {
        ValueFormat::Raw => RAW_ITEM_BYTES,
        ValueFormat::Double | ValueFormat::Large => FMT_ITEM_BYTES,
    };
    items
        .iter()
        .map(|i| item + i.instance.as_ref().map_or(0, |n| (n.encode_utf16().count() + 1) * 2))
        .sum()
}

/// Splits `\Object(instance)\Counter` into its parts.
fn parse_path(path: &str) -> Option<(String, InstanceSelector, String)> {
    let rest = path.strip_prefix('\\')?;
    let (object_part, counter) = rest.rsplit_once('\\')?;
    if counter.is_empty() {
        return None;
    }

    let (object, selector) = match object_part.find('(') {
        Some(open) if object_part.ends_with(')') => {
            let instance = &object_part[open + 1..object_part.len() - 1];
            let selector = if instance == "*" {
                InstanceSelector::Wildcard
            } else {
                InstanceSelector::Named(instance.to_string())
            };
            (&object_part[..open], selector)
        }
        _ => (object_part, InstanceSelector::None),
    };

    Some((object.to_string(), selector, counter.to_string()))
}

/// In-memory PDH implementation.
#[derive(Debug, Default)]
pub struct MockPdh {
    state: Mutex<MockState>,
}

impl MockPdh {
    /// Creates an empty host without any performance object.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Registers a performance object without instances.
    pub fn add_object(&self, object: &str, counters: &[&str]) {
        let mut state = self.lock();
        let obj = state.object_mut(object);
        for counter in counters {
            obj.counters.insert((*counter).to_string());
        }
    }

    /// Sets a counter value of a single-instance object.
    pub fn set_value(&self, object: &str, counter: &str, value: f64) {
        self.set(object, None, counter, value);
    }

    /// Sets a counter value of one instance of a multi-instance object.
    ///
    /// New instances are appended, so insertion order is the order the mock
    /// reports instances in.
    pub fn set_instance_value(&self, object: &str, instance: &str, counter: &str, value: f64) {
        self.set(object, Some(instance), counter, value);
    }

    fn set(&self, object: &str, instance: Option<&str>, counter: &str, value: f64) {
        let mut state = self.lock();
        let obj = state.object_mut(object);
        obj.counters.insert(counter.to_string());

        let existing = obj
            .instances
            .iter_mut()
            .find(|i| i.name.as_deref() == instance);
        match existing {
            Some(inst) => {
                inst.values.insert(counter.to_string(), value);
            }
            None => {
                let mut values = HashMap::new();
                values.insert(counter.to_string(), value);
                obj.instances.push(MockInstance {
                    name: instance.map(str::to_string),
                    values,
                });
            }
        }
    }

    /// Removes an instance, as when a volume is unmounted.
    pub fn remove_instance(&self, object: &str, instance: &str) {
        let mut state = self.lock();
        let obj = state.object_mut(object);
        obj.instances.retain(|i| i.name.as_deref() != Some(instance));
    }

    /// Makes the next `count` `collect_query_data` calls fail with `status`.
    pub fn fail_next_collects(&self, count: usize, status: PdhStatus) {
        let mut state = self.lock();
        state.failing_collects.extend(std::iter::repeat_n(status, count));
    }

    /// Makes every counter-array call report "more data", whatever the
    /// buffer size.
    pub fn set_always_more_data(&self, enabled: bool) {
        self.lock().always_more_data = enabled;
    }

    pub fn stats(&self) -> MockStats {
        self.lock().stats
    }

    /// Number of queries currently open.
    pub fn open_queries(&self) -> usize {
        self.lock().queries.len()
    }

    /// Bytes the raw counter array of `counter` currently requires.
    pub fn required_bytes(&self, counter: CounterHandle) -> usize {
        let state = self.lock();
        state
            .counters
            .get(&counter.0)
            .and_then(|c| state.items(c, ValueFormat::Raw).ok())
            .map_or(0, |items| required_bytes(&items, ValueFormat::Raw))
    }
}

impl PdhApi for MockPdh {
    fn open_query(&self) -> Result<QueryHandle, PdhStatus> {
        let mut state = self.lock();
        let handle = state.handle();
        state.queries.insert(handle, Vec::new());
        state.stats.queries_opened += 1;
        Ok(QueryHandle(handle))
    }

    fn add_counter(&self, query: QueryHandle, path: &str) -> Result<CounterHandle, PdhStatus> {
        let mut state = self.lock();
        if !state.queries.contains_key(&query.0) {
            return Err(PdhStatus::INVALID_HANDLE);
        }
        let (object, selector, counter) = parse_path(path).ok_or(PdhStatus::INVALID_PATH)?;
        match state.object(&object) {
            None => return Err(PdhStatus::CSTATUS_NO_OBJECT),
            Some(obj) if !obj.counters.contains(&counter) => {
                return Err(PdhStatus::CSTATUS_NO_COUNTER);
            }
            Some(_) => {}
        }

        let handle = state.handle();
        state.counters.insert(
            handle,
            MockCounter {
                query: query.0,
                object,
                counter,
                selector,
            },
        );
        if let Some(counters) = state.queries.get_mut(&query.0) {
            counters.push(handle);
        }
        state.stats.counters_added += 1;
        Ok(CounterHandle(handle))
    }

    fn remove_counter(&self, counter: CounterHandle) -> Result<(), PdhStatus> {
        let mut state = self.lock();
        let removed = state
            .counters
            .remove(&counter.0)
            .ok_or(PdhStatus::INVALID_HANDLE)?;
        if let Some(counters) = state.queries.get_mut(&removed.query) {
            counters.retain(|&c| c != counter.0);
        }
        state.stats.counters_removed += 1;
        Ok(())
    }

    fn collect_query_data(&self, query: QueryHandle) -> Result<(), PdhStatus> {
        let mut state = self.lock();
        if !state.queries.contains_key(&query.0) {
            return Err(PdhStatus::INVALID_HANDLE);
        }
        state.stats.collect_calls += 1;
        if !state.failing_collects.is_empty() {
            return Err(state.failing_collects.remove(0));
        }
        Ok(())
    }

    fn counter_array(
        &self,
        counter: CounterHandle,
        format: ValueFormat,
        buffer: &mut [u64],
    ) -> Result<Vec<ArrayItem>, ArrayError> {
        let mut state = self.lock();
        state.stats.array_calls += 1;

        let available = buffer.len() * std::mem::size_of::<u64>();
        let mock_counter = state
            .counters
            .get(&counter.0)
            .ok_or(ArrayError::Status(PdhStatus::INVALID_HANDLE))?;
        let items = state.items(mock_counter, format).map_err(ArrayError::Status)?;
        let required = required_bytes(&items, format);

        if state.always_more_data {
            return Err(ArrayError::MoreData {
                required: available.max(required) + 64,
            });
        }
        if available < required {
            return Err(ArrayError::MoreData { required });
        }
        Ok(items)
    }

    fn close_query(&self, query: QueryHandle) -> Result<(), PdhStatus> {
        let mut state = self.lock();
        let counters = state
            .queries
            .remove(&query.0)
            .ok_or(PdhStatus::INVALID_HANDLE)?;
        for counter in counters {
            state.counters.remove(&counter);
        }
        state.stats.queries_closed += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path() {
        assert_eq!(
            parse_path("\\AD FS\\Token Requests"),
            Some((
                "AD FS".to_string(),
                InstanceSelector::None,
                "Token Requests".to_string()
            ))
        );
        assert_eq!(
            parse_path("\\LogicalDisk(*)\\Free Megabytes"),
            Some((
                "LogicalDisk".to_string(),
                InstanceSelector::Wildcard,
                "Free Megabytes".to_string()
            ))
        );
        assert_eq!(
            parse_path("\\LogicalDisk(C:)\\Free Megabytes").map(|p| p.1),
            Some(InstanceSelector::Named("C:".to_string()))
        );
        assert_eq!(parse_path("no leading slash"), None);
    }

    #[test]
    fn test_unknown_object_and_counter() {
        let pdh = MockPdh::new();
        pdh.set_value("AD FS", "Token Requests", 1.0);
        let query = pdh.open_query().unwrap();

        assert_eq!(
            pdh.add_counter(query, "\\Missing\\Token Requests"),
            Err(PdhStatus::CSTATUS_NO_OBJECT)
        );
        assert_eq!(
            pdh.add_counter(query, "\\AD FS\\Missing"),
            Err(PdhStatus::CSTATUS_NO_COUNTER)
        );
        assert_eq!(pdh.stats().counters_added, 0);
    }

    #[test]
    fn test_close_query_twice_reports_invalid_handle() {
        let pdh = MockPdh::new();
        let query = pdh.open_query().unwrap();
        assert!(pdh.close_query(query).is_ok());
        assert_eq!(pdh.close_query(query), Err(PdhStatus::INVALID_HANDLE));
        assert_eq!(pdh.stats().queries_closed, 1);
    }

    #[test]
    fn test_failing_collects_are_consumed_in_order() {
        let pdh = MockPdh::new();
        let query = pdh.open_query().unwrap();
        pdh.fail_next_collects(1, PdhStatus::INVALID_DATA);

        assert_eq!(pdh.collect_query_data(query), Err(PdhStatus::INVALID_DATA));
        assert_eq!(pdh.collect_query_data(query), Ok(()));
        assert_eq!(pdh.stats().collect_calls, 2);
    }

    #[test]
    fn test_counter_array_requires_buffer() {
        let pdh = MockPdh::new();
        pdh.set_instance_value("LogicalDisk", "C:", "Free Megabytes", 10.0);
        let query = pdh.open_query().unwrap();
        let counter = pdh
            .add_counter(query, "\\LogicalDisk(*)\\Free Megabytes")
            .unwrap();

        let required = match pdh.counter_array(counter, ValueFormat::Raw, &mut []) {
            Err(ArrayError::MoreData { required }) => required,
            other => panic!("expected MoreData, got {:?}", other),
        };
        assert_eq!(required, RAW_ITEM_BYTES + 3 * 2);

        let mut buffer = vec![0u64; required.div_ceil(8)];
        let items = pdh
            .counter_array(counter, ValueFormat::Raw, &mut buffer)
            .unwrap();
        assert_eq!(
            items,
            vec![ArrayItem {
                instance: Some("C:".to_string()),
                value: CounterValue::Raw(10),
            }]
        );
    }
}
