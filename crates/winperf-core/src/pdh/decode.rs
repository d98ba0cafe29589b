//! Record decoding: raw samples into typed records.

use std::collections::HashMap;

use super::api::CounterValue;
use super::error::CollectError;
use super::record::{CounterRecord, FieldSpec, FieldValue, Numeric};

/// One value read from a counter array.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    /// Index of the field in the record's field table.
    pub counter_id: usize,
    pub instance: Option<String>,
    pub value: CounterValue,
}

/// Rebuilds `out` from `samples`.
///
/// Single-instance records produce exactly one record. Multi-instance records
/// produce one record per distinct instance name, in first-seen order, and
/// samples without an instance name are skipped. A later sample for the same
/// field overwrites an earlier one. An empty result is a
/// [`CollectError::NoData`].
pub fn decode_records<R: CounterRecord>(
    object: &str,
    samples: Vec<RawSample>,
    out: &mut Vec<R>,
) -> Result<(), CollectError> {
    out.clear();

    if R::HAS_INSTANCE {
        let mut index: HashMap<String, usize> = HashMap::new();
        for sample in samples {
            let Some(instance) = sample.instance else {
                continue;
            };
            let value = convert::<R>(object, sample.counter_id, sample.value)?;
            let slot = match index.get(&instance) {
                Some(&slot) => slot,
                None => {
                    let mut record = R::default();
                    record.set_instance(&instance);
                    out.push(record);
                    index.insert(instance, out.len() - 1);
                    out.len() - 1
                }
            };
            out[slot].set_field(sample.counter_id, value);
        }
    } else if !samples.is_empty() {
        let mut record = R::default();
        for sample in samples {
            let value = convert::<R>(object, sample.counter_id, sample.value)?;
            record.set_field(sample.counter_id, value);
        }
        out.push(record);
    }

    if out.is_empty() {
        return Err(CollectError::NoData {
            object: object.to_string(),
        });
    }
    Ok(())
}

fn field_spec<'a>(fields: &'a [FieldSpec], object: &str, id: usize) -> Result<&'a FieldSpec, CollectError> {
    fields.get(id).ok_or_else(|| {
        CollectError::Decode(format!(
            "sample for counter id {} of '{}' is outside the field table ({} fields)",
            id,
            object,
            fields.len()
        ))
    })
}

/// Applies the value-kind policy of one field.
///
/// Raw values pass through unchanged. Formatted values get the field's
/// static scale factor.
fn convert<R: CounterRecord>(
    object: &str,
    counter_id: usize,
    value: CounterValue,
) -> Result<FieldValue, CollectError> {
    let field = field_spec(R::FIELDS, object, counter_id)?;
    let scale = field.scale.unwrap_or(1.0);
    let mismatch = || CollectError::TypeMismatch {
        counter: field.counter.to_string(),
        expected: field.numeric,
        actual: value.kind(),
    };

    match (value, field.numeric) {
        (CounterValue::Raw(v), Numeric::U64) => Ok(FieldValue::U64(v)),
        (CounterValue::Raw(v), Numeric::F64) => Ok(FieldValue::F64(v as f64)),
        (CounterValue::Double(v), Numeric::F64) => Ok(FieldValue::F64(v * scale)),
        (CounterValue::Large(v), Numeric::F64) => Ok(FieldValue::F64(v as f64 * scale)),
        (CounterValue::Double(_), Numeric::U64) => Err(mismatch()),
        (CounterValue::Large(_), Numeric::U64) if field.scale.is_some() => Err(mismatch()),
        (CounterValue::Large(v), Numeric::U64) => u64::try_from(v).map(FieldValue::U64).map_err(|_| {
            CollectError::Decode(format!(
                "negative value {} for unsigned field '{}' of '{}'",
                v, field.name, object
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::counter_record! {
        struct Disk {
            #[instance] name,
            free_space: f64 => "Free Megabytes",
            reads: u64 => "Disk Reads/sec",
        }
    }

    crate::counter_record! {
        struct Adfs {
            passive_requests: f64 => "Passive Requests",
        }
    }

    crate::counter_record! {
        struct Timing {
            query_time: f64 => "Average Config Database Query Time" [scale = 1e-8],
        }
    }

    fn sample(id: usize, instance: Option<&str>, value: CounterValue) -> RawSample {
        RawSample {
            counter_id: id,
            instance: instance.map(str::to_string),
            value,
        }
    }

    #[test]
    fn test_single_instance_yields_one_record() {
        let mut out: Vec<Adfs> = Vec::new();
        decode_records("AD FS", vec![sample(0, None, CounterValue::Raw(42))], &mut out).unwrap();
        assert_eq!(out, vec![Adfs { passive_requests: 42.0 }]);
    }

    #[test]
    fn test_empty_input_is_no_data() {
        let mut out: Vec<Adfs> = vec![Adfs::default()];
        let err = decode_records("AD FS", Vec::new(), &mut out).unwrap_err();
        assert!(err.is_no_data());
        assert!(out.is_empty());

        let mut disks: Vec<Disk> = Vec::new();
        let err = decode_records("LogicalDisk", Vec::new(), &mut disks).unwrap_err();
        assert!(err.is_no_data());
    }

    #[test]
    fn test_out_of_order_instances_are_joined() {
        let samples = vec![
            sample(0, Some("D:"), CounterValue::Raw(200)),
            sample(0, Some("C:"), CounterValue::Raw(100)),
            sample(1, Some("C:"), CounterValue::Raw(7)),
            sample(1, Some("D:"), CounterValue::Raw(9)),
        ];
        let mut out: Vec<Disk> = Vec::new();
        decode_records("LogicalDisk", samples, &mut out).unwrap();

        assert_eq!(out.len(), 2);
        let c = out.iter().find(|d| d.name == "C:").unwrap();
        let d = out.iter().find(|d| d.name == "D:").unwrap();
        assert_eq!((c.free_space, c.reads), (100.0, 7));
        assert_eq!((d.free_space, d.reads), (200.0, 9));
        // First-seen order.
        assert_eq!(out[0].name, "D:");
    }

    #[test]
    fn test_duplicate_instance_later_sample_wins() {
        let samples = vec![
            sample(0, Some("C:"), CounterValue::Raw(1)),
            sample(0, Some("C:"), CounterValue::Raw(2)),
        ];
        let mut out: Vec<Disk> = Vec::new();
        decode_records("LogicalDisk", samples, &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].free_space, 2.0);
    }

    #[test]
    fn test_nameless_samples_skipped_in_multi_instance() {
        let samples = vec![sample(0, None, CounterValue::Raw(1))];
        let mut out: Vec<Disk> = Vec::new();
        let err = decode_records("LogicalDisk", samples, &mut out).unwrap_err();
        assert!(err.is_no_data());
    }

    #[test]
    fn test_scale_applied_to_formatted_values() {
        let ticks = 123_456_789.0;
        let mut out: Vec<Timing> = Vec::new();
        decode_records("AD FS", vec![sample(0, None, CounterValue::Double(ticks))], &mut out)
            .unwrap();
        assert!((out[0].query_time - ticks * 1e-8).abs() < 1e-12);

        decode_records("AD FS", vec![sample(0, None, CounterValue::Large(500))], &mut out).unwrap();
        assert!((out[0].query_time - 5e-6).abs() < 1e-15);
    }

    #[test]
    fn test_raw_values_pass_through_unscaled() {
        let mut out: Vec<Timing> = Vec::new();
        decode_records("AD FS", vec![sample(0, None, CounterValue::Raw(100))], &mut out).unwrap();
        assert_eq!(out[0].query_time, 100.0);
    }

    #[test]
    fn test_double_into_integer_field_is_type_mismatch() {
        let samples = vec![sample(1, Some("C:"), CounterValue::Double(1.5))];
        let mut out: Vec<Disk> = Vec::new();
        let err = decode_records("LogicalDisk", samples, &mut out).unwrap_err();
        assert!(matches!(err, CollectError::TypeMismatch { .. }));
        assert!(err.is_permanent());
    }

    #[test]
    fn test_unknown_counter_id_is_decode_error() {
        let mut out: Vec<Adfs> = Vec::new();
        let err =
            decode_records("AD FS", vec![sample(3, None, CounterValue::Raw(1))], &mut out).unwrap_err();
        assert!(matches!(err, CollectError::Decode(_)));
    }

    #[test]
    fn test_negative_large_into_integer_is_decode_error() {
        let samples = vec![sample(1, Some("C:"), CounterValue::Large(-1))];
        let mut out: Vec<Disk> = Vec::new();
        let err = decode_records("LogicalDisk", samples, &mut out).unwrap_err();
        assert!(matches!(err, CollectError::Decode(_)));
    }
}
