//! Typed performance-counter acquisition.
//!
//! This module turns a declarative record type into rows of counter values
//! read through the Windows PDH API, with an in-memory mock for testing on
//! other platforms.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     TypedCollector<R>                        │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────┐  │
//! │  │  Path Builder  │  │  QuerySession  │  │ Record Decoder │  │
//! │  │  R::FIELDS ->  │  │  - one query   │  │  RawSample ->  │  │
//! │  │  \Obj(*)\Ctr   │  │  - retry once  │  │  Vec<R>        │  │
//! │  └────────────────┘  └───────┬────────┘  └────────────────┘  │
//! │                              │                               │
//! │                     ┌────────▼─────────┐                     │
//! │                     │ BufferNegotiator │                     │
//! │                     └────────┬─────────┘                     │
//! │                              │                               │
//! │                       ┌──────▼──────┐                        │
//! │                       │   PdhApi    │ (trait)                │
//! │                       └──────┬──────┘                        │
//! └──────────────────────────────┼───────────────────────────────┘
//!                                │
//!                ┌───────────────┼───────────────┐
//!                │               │               │
//!         ┌──────▼──────┐ ┌──────▼──────┐ ┌──────▼──────┐
//!         │   WinPdh    │ │   MockPdh   │ │  Scenarios  │
//!         │  (Windows)  │ │  (Testing)  │ │ (Fixtures)  │
//!         └─────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use winperf_core::pdh::{InstanceFilter, MockPdh, TypedCollector, ValueFormat};
//!
//! winperf_core::counter_record! {
//!     struct Volume {
//!         #[instance] name,
//!         free_megabytes: f64 => "Free Megabytes",
//!     }
//! }
//!
//! let pdh = Arc::new(MockPdh::typical_host());
//! let mut collector: TypedCollector<Volume> =
//!     TypedCollector::new(pdh, "LogicalDisk", ValueFormat::Raw, InstanceFilter::All);
//! collector.build().unwrap();
//!
//! let mut volumes = Vec::new();
//! collector.collect(&mut volumes).unwrap();
//! assert!(volumes.iter().any(|v| v.name == "C:"));
//! ```

mod api;
mod buffer;
mod collector;
mod decode;
mod error;
pub mod mock;
mod path;
mod record;
mod session;
#[cfg(windows)]
mod windows;

pub use api::{
    ArrayError, ArrayItem, CounterHandle, CounterValue, PdhApi, PdhStatus, QueryHandle,
    ValueFormat, ValueKind,
};
pub use buffer::{BufferNegotiator, MAX_ATTEMPTS};
pub use collector::TypedCollector;
pub use decode::{RawSample, decode_records};
pub use error::CollectError;
pub use mock::{MockPdh, MockStats};
pub use path::{CounterDescriptor, CounterSet, InstanceFilter, InstanceSelector, build_counter_set};
pub use record::{CounterRecord, FieldSlot, FieldSpec, FieldType, FieldValue, Numeric};
pub use session::QuerySession;
#[cfg(windows)]
pub use windows::WinPdh;
