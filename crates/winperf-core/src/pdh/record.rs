//! Declarative typed records.
//!
//! A typed record is a plain struct whose numeric fields map one-to-one to
//! counters of a single performance object. The mapping lives in a static
//! field table ([`CounterRecord::FIELDS`]) that the path builder and the
//! decoder both consume, so a domain collector never writes per-field
//! acquisition code.
//!
//! Records are declared with [`counter_record!`](crate::counter_record):
//!
//! ```
//! winperf_core::counter_record! {
//!     /// Counters of the `LogicalDisk` object.
//!     pub struct DiskCounters {
//!         #[instance] name,
//!         free_megabytes: f64 => "Free Megabytes",
//!         reads: u64 => "Disk Reads/sec",
//!         read_seconds: f64 => "% Disk Read Time" [scale = 1e-7],
//!     }
//! }
//!
//! use winperf_core::pdh::CounterRecord;
//! assert!(DiskCounters::HAS_INSTANCE);
//! assert_eq!(DiskCounters::FIELDS[1].counter, "Disk Reads/sec");
//! ```

use std::fmt;

/// Numeric kind of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Numeric {
    U64,
    F64,
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Numeric::U64 => "u64",
            Numeric::F64 => "f64",
        })
    }
}

/// Static declaration of one record field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    /// Rust field name, for diagnostics.
    pub name: &'static str,
    /// English counter name within the object.
    pub counter: &'static str,
    pub numeric: Numeric,
    /// Multiplier applied to formatted values before assignment.
    pub scale: Option<f64>,
}

/// Decoded value ready for assignment into a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    U64(u64),
    F64(f64),
}

/// Maps a Rust field type to its [`Numeric`] kind.
pub trait FieldType {
    const NUMERIC: Numeric;
}

/// Assignment target for a decoded value.
pub trait FieldSlot {
    fn assign(&mut self, value: FieldValue);
}

impl FieldType for u64 {
    const NUMERIC: Numeric = Numeric::U64;
}

impl FieldType for f64 {
    const NUMERIC: Numeric = Numeric::F64;
}

impl FieldSlot for u64 {
    fn assign(&mut self, value: FieldValue) {
        *self = match value {
            FieldValue::U64(v) => v,
            FieldValue::F64(v) => v as u64,
        };
    }
}

impl FieldSlot for f64 {
    fn assign(&mut self, value: FieldValue) {
        *self = match value {
            FieldValue::U64(v) => v as f64,
            FieldValue::F64(v) => v,
        };
    }
}

/// A record type whose fields are filled from one performance object.
///
/// Implemented by [`counter_record!`](crate::counter_record); a manual
/// implementation must keep `set_field` indices aligned with `FIELDS`.
pub trait CounterRecord: Default + Send + 'static {
    /// Counter fields in declaration order.
    const FIELDS: &'static [FieldSpec];

    /// Whether the record carries an instance-name field, which makes the
    /// subscription multi-instance.
    const HAS_INSTANCE: bool;

    fn instance(&self) -> Option<&str>;

    fn set_instance(&mut self, name: &str);

    /// Assigns the value of the field at `index` in [`Self::FIELDS`].
    fn set_field(&mut self, index: usize, value: FieldValue);
}

/// Declares a struct implementing [`CounterRecord`](crate::pdh::CounterRecord).
///
/// Syntax: an optional `#[instance] ident,` line naming the `String` field that
/// receives the instance name, then `field: u64|f64 => "Counter Name"` entries,
/// each optionally followed by `[scale = expr]`.
#[macro_export]
macro_rules! counter_record {
    (@scale) => { None };
    (@scale $scale:expr) => { Some($scale) };
    (@flag) => { false };
    (@flag $inst:ident) => { true };
    (@get $self:ident) => { None };
    (@get $self:ident $inst:ident) => { Some($self.$inst.as_str()) };
    (@set $self:ident $name:ident) => { let _ = $name; };
    (@set $self:ident $name:ident $inst:ident) => { $self.$inst = $name.to_string(); };
    (
        $(#[$meta:meta])*
        $vis:vis struct $record:ident {
            $(#[instance] $inst:ident,)?
            $($field:ident: $ty:ty => $counter:literal $([scale = $scale:expr])?),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        $vis struct $record {
            $(pub $inst: String,)?
            $(pub $field: $ty,)*
        }

        impl $crate::pdh::CounterRecord for $record {
            const FIELDS: &'static [$crate::pdh::FieldSpec] = &[
                $($crate::pdh::FieldSpec {
                    name: stringify!($field),
                    counter: $counter,
                    numeric: <$ty as $crate::pdh::FieldType>::NUMERIC,
                    scale: $crate::counter_record!(@scale $($scale)?),
                },)*
            ];

            const HAS_INSTANCE: bool = $crate::counter_record!(@flag $($inst)?);

            fn instance(&self) -> Option<&str> {
                $crate::counter_record!(@get self $($inst)?)
            }

            fn set_instance(&mut self, name: &str) {
                $crate::counter_record!(@set self name $($inst)?);
            }

            fn set_field(&mut self, index: usize, value: $crate::pdh::FieldValue) {
                let slots: &mut [&mut dyn $crate::pdh::FieldSlot] = &mut [$(&mut self.$field),*];
                if let Some(slot) = slots.get_mut(index) {
                    slot.assign(value);
                }
            }
        }
    };
}
