//! Abstraction over the PDH (Performance Data Helper) API.
//!
//! The `PdhApi` trait is the single seam between the acquisition layer and
//! the operating system. Production code on Windows uses [`WinPdh`]; tests
//! and non-Windows builds use [`MockPdh`], which simulates counter objects in
//! memory.
//!
//! [`WinPdh`]: crate::pdh::WinPdh
//! [`MockPdh`]: crate::pdh::MockPdh

use std::fmt;

/// Opaque handle of an open PDH query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryHandle(pub usize);

/// Opaque handle of a counter added to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CounterHandle(pub usize);

/// PDH status code as returned by the native API.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PdhStatus(pub u32);

impl PdhStatus {
    pub const SUCCESS: PdhStatus = PdhStatus(0);
    pub const CSTATUS_NEW_DATA: PdhStatus = PdhStatus(0x0000_0001);
    pub const CSTATUS_NO_INSTANCE: PdhStatus = PdhStatus(0x8000_07D1);
    pub const MORE_DATA: PdhStatus = PdhStatus(0x8000_07D2);
    pub const RETRY: PdhStatus = PdhStatus(0x8000_07D4);
    pub const NO_DATA: PdhStatus = PdhStatus(0x8000_07D5);
    pub const CALC_NEGATIVE_DENOMINATOR: PdhStatus = PdhStatus(0x8000_07D6);
    pub const CALC_NEGATIVE_TIMEBASE: PdhStatus = PdhStatus(0x8000_07D7);
    pub const CALC_NEGATIVE_VALUE: PdhStatus = PdhStatus(0x8000_07D8);
    pub const CSTATUS_NO_OBJECT: PdhStatus = PdhStatus(0xC000_0BB8);
    pub const CSTATUS_NO_COUNTER: PdhStatus = PdhStatus(0xC000_0BB9);
    pub const CSTATUS_INVALID_DATA: PdhStatus = PdhStatus(0xC000_0BBA);
    pub const INVALID_HANDLE: PdhStatus = PdhStatus(0xC000_0BBC);
    pub const INVALID_ARGUMENT: PdhStatus = PdhStatus(0xC000_0BBD);
    pub const CSTATUS_BAD_COUNTERNAME: PdhStatus = PdhStatus(0xC000_0BC0);
    pub const INSUFFICIENT_BUFFER: PdhStatus = PdhStatus(0xC000_0BC2);
    pub const INVALID_PATH: PdhStatus = PdhStatus(0xC000_0BC4);
    pub const INVALID_DATA: PdhStatus = PdhStatus(0xC000_0BC6);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS || self == Self::CSTATUS_NEW_DATA
    }

    /// Statuses the counter provider reports while it is momentarily unable
    /// to produce consistent data. Retrying the acquisition can succeed.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::INVALID_DATA
                | Self::CSTATUS_INVALID_DATA
                | Self::CSTATUS_NO_INSTANCE
                | Self::RETRY
                | Self::CALC_NEGATIVE_DENOMINATOR
                | Self::CALC_NEGATIVE_TIMEBASE
                | Self::CALC_NEGATIVE_VALUE
        )
    }

    fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::SUCCESS => "PDH_CSTATUS_VALID_DATA",
            Self::CSTATUS_NEW_DATA => "PDH_CSTATUS_NEW_DATA",
            Self::CSTATUS_NO_INSTANCE => "PDH_CSTATUS_NO_INSTANCE",
            Self::MORE_DATA => "PDH_MORE_DATA",
            Self::RETRY => "PDH_RETRY",
            Self::NO_DATA => "PDH_NO_DATA",
            Self::CALC_NEGATIVE_DENOMINATOR => "PDH_CALC_NEGATIVE_DENOMINATOR",
            Self::CALC_NEGATIVE_TIMEBASE => "PDH_CALC_NEGATIVE_TIMEBASE",
            Self::CALC_NEGATIVE_VALUE => "PDH_CALC_NEGATIVE_VALUE",
            Self::CSTATUS_NO_OBJECT => "PDH_CSTATUS_NO_OBJECT",
            Self::CSTATUS_NO_COUNTER => "PDH_CSTATUS_NO_COUNTER",
            Self::CSTATUS_INVALID_DATA => "PDH_CSTATUS_INVALID_DATA",
            Self::INVALID_HANDLE => "PDH_INVALID_HANDLE",
            Self::INVALID_ARGUMENT => "PDH_INVALID_ARGUMENT",
            Self::CSTATUS_BAD_COUNTERNAME => "PDH_CSTATUS_BAD_COUNTERNAME",
            Self::INSUFFICIENT_BUFFER => "PDH_INSUFFICIENT_BUFFER",
            Self::INVALID_PATH => "PDH_INVALID_PATH",
            Self::INVALID_DATA => "PDH_INVALID_DATA",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for PdhStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:08X})", name, self.0),
            None => write!(f, "PDH status 0x{:08X}", self.0),
        }
    }
}

impl fmt::Debug for PdhStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Format requested from the counter-array call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    /// Unprocessed `FirstValue` of the raw counter.
    Raw,
    /// Formatted by PDH as a double (rates, percentages, averages).
    Double,
    /// Formatted by PDH as a 64-bit integer.
    Large,
}

/// Kind of a decoded counter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Raw,
    FormattedDouble,
    FormattedLarge,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::Raw => "raw",
            ValueKind::FormattedDouble => "formatted double",
            ValueKind::FormattedLarge => "formatted large",
        })
    }
}

impl ValueFormat {
    /// Value kind produced by a counter-array call in this format.
    pub fn kind(self) -> ValueKind {
        match self {
            ValueFormat::Raw => ValueKind::Raw,
            ValueFormat::Double => ValueKind::FormattedDouble,
            ValueFormat::Large => ValueKind::FormattedLarge,
        }
    }
}

/// A single 64-bit counter value tagged with its kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CounterValue {
    Raw(u64),
    Double(f64),
    Large(i64),
}

impl CounterValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            CounterValue::Raw(_) => ValueKind::Raw,
            CounterValue::Double(_) => ValueKind::FormattedDouble,
            CounterValue::Large(_) => ValueKind::FormattedLarge,
        }
    }
}

/// One entry of a counter array: one per instance, or exactly one for
/// single-instance counters (with no instance name).
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayItem {
    pub instance: Option<String>,
    pub value: CounterValue,
}

/// Failure of a counter-array call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayError {
    /// The supplied buffer is too small; `required` is the byte size the OS
    /// asks for.
    MoreData { required: usize },
    /// Any other PDH status.
    Status(PdhStatus),
}

/// Abstraction over the native PDH calls used by the acquisition layer.
///
/// Implementations must be shareable between collectors: every collector
/// owns its own query handle, but the API object itself is global.
pub trait PdhApi: Send + Sync {
    /// Opens a new, empty query.
    fn open_query(&self) -> Result<QueryHandle, PdhStatus>;

    /// Adds a counter by its English path (e.g. `\LogicalDisk(*)\Free Megabytes`).
    ///
    /// Fails with `PdhStatus::CSTATUS_NO_OBJECT` when the object does not
    /// exist on this host.
    fn add_counter(&self, query: QueryHandle, path: &str) -> Result<CounterHandle, PdhStatus>;

    /// Removes a counter from its query.
    fn remove_counter(&self, counter: CounterHandle) -> Result<(), PdhStatus>;

    /// Samples every counter of the query.
    fn collect_query_data(&self, query: QueryHandle) -> Result<(), PdhStatus>;

    /// Reads the value array of a counter into `buffer`.
    ///
    /// The byte capacity of the buffer is `buffer.len() * 8`. When it is too
    /// small the call fails with [`ArrayError::MoreData`] carrying the size
    /// the OS requires.
    fn counter_array(
        &self,
        counter: CounterHandle,
        format: ValueFormat,
        buffer: &mut [u64],
    ) -> Result<Vec<ArrayItem>, ArrayError>;

    /// Closes a query and every counter still attached to it.
    fn close_query(&self, query: QueryHandle) -> Result<(), PdhStatus>;
}
