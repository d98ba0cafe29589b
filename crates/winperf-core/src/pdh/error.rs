//! Error taxonomy of the acquisition layer.

use super::api::{PdhStatus, ValueKind};
use super::record::Numeric;

/// Error type for counter acquisition and decoding.
///
/// Errors never panic the process. They travel as values up to the
/// scheduler, which turns each into a failure of the current scrape round.
/// [`CollectError::is_permanent`] decides whether the collector is retired.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// Invalid record shape, instance filter or lifecycle misuse.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The performance object does not exist on this host.
    #[error("performance object '{object}' is not available")]
    CounterObjectUnavailable { object: String },

    /// The counter provider was momentarily unable to produce data.
    #[error("transient collection error on '{object}': {status}")]
    Transient { object: String, status: PdhStatus },

    /// Buffer negotiation or sample decoding violated an invariant.
    #[error("decode error: {0}")]
    Decode(String),

    /// The collection ran but the host reported nothing.
    #[error("no data returned for '{object}'")]
    NoData { object: String },

    /// A declared field cannot hold the counter's native value kind.
    #[error("type mismatch on counter '{counter}': field is {expected}, counter value is {actual}")]
    TypeMismatch {
        counter: String,
        expected: Numeric,
        actual: ValueKind,
    },

    /// Any other status reported by PDH.
    #[error("PDH call {call} failed: {status}")]
    Pdh { call: &'static str, status: PdhStatus },
}

impl CollectError {
    /// Errors that are facts about the host or the code, not about the
    /// current moment. A collector hitting one is closed for good.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            CollectError::Configuration(_)
                | CollectError::CounterObjectUnavailable { .. }
                | CollectError::TypeMismatch { .. }
        )
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, CollectError::Transient { .. })
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, CollectError::NoData { .. })
    }

    /// Maps a status of a query-level call to the error taxonomy.
    pub(crate) fn from_status(call: &'static str, object: &str, status: PdhStatus) -> Self {
        if status.is_transient() {
            CollectError::Transient {
                object: object.to_string(),
                status,
            }
        } else if status == PdhStatus::NO_DATA {
            CollectError::NoData {
                object: object.to_string(),
            }
        } else if status == PdhStatus::CSTATUS_NO_OBJECT {
            CollectError::CounterObjectUnavailable {
                object: object.to_string(),
            }
        } else {
            CollectError::Pdh { call, status }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        let e = CollectError::from_status("PdhCollectQueryData", "AD FS", PdhStatus::INVALID_DATA);
        assert!(e.is_transient());

        let e = CollectError::from_status("PdhCollectQueryData", "AD FS", PdhStatus::NO_DATA);
        assert!(e.is_no_data());

        let e = CollectError::from_status("PdhAddEnglishCounterW", "AD FS", PdhStatus::CSTATUS_NO_OBJECT);
        assert!(e.is_permanent());

        let e = CollectError::from_status("PdhCloseQuery", "AD FS", PdhStatus::INVALID_HANDLE);
        assert!(!e.is_permanent());
        assert!(e.to_string().contains("PDH_INVALID_HANDLE"));
    }
}
