//! Counter path building.
//!
//! Derives the native counter paths of a typed record from its static field
//! table: `\Object\Counter` for single-instance records,
//! `\Object(*)\Counter` or `\Object(name)\Counter` for records with an
//! instance field.

use std::fmt;

use super::api::ValueFormat;
use super::error::CollectError;
use super::record::{FieldSpec, Numeric};

/// Instance part of a counter path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceSelector {
    None,
    Wildcard,
    Named(String),
}

/// Which instances a multi-instance collector subscribes to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InstanceFilter {
    /// Every instance (`*`).
    #[default]
    All,
    /// Only the listed instances, one path per instance and counter.
    Named(Vec<String>),
}

/// Fully resolved counter path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterDescriptor {
    pub object: String,
    pub counter: String,
    pub instance: InstanceSelector,
}

impl CounterDescriptor {
    /// Native English counter path.
    pub fn path(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CounterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance {
            InstanceSelector::None => write!(f, "\\{}\\{}", self.object, self.counter),
            InstanceSelector::Wildcard => write!(f, "\\{}(*)\\{}", self.object, self.counter),
            InstanceSelector::Named(name) => {
                write!(f, "\\{}({})\\{}", self.object, name, self.counter)
            }
        }
    }
}

/// Ordered subscriptions of one typed collector.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterSet {
    pub object: String,
    pub multi_instance: bool,
    /// `(field index, descriptor)` in field declaration order.
    pub counters: Vec<(usize, CounterDescriptor)>,
}

/// Builds the counter set for a record's field table.
///
/// Validates the record shape against the value format so that
/// configuration bugs surface at build time rather than on every scrape.
pub fn build_counter_set(
    object: &str,
    fields: &[FieldSpec],
    multi_instance: bool,
    filter: &InstanceFilter,
    format: ValueFormat,
) -> Result<CounterSet, CollectError> {
    if object.is_empty() {
        return Err(CollectError::Configuration(
            "counter object name is empty".to_string(),
        ));
    }
    if fields.is_empty() {
        return Err(CollectError::Configuration(format!(
            "record for '{}' declares no counter fields",
            object
        )));
    }
    if !multi_instance && matches!(filter, InstanceFilter::Named(_)) {
        return Err(CollectError::Configuration(format!(
            "instance filter on '{}' requires a record with an instance field",
            object
        )));
    }

    for field in fields {
        validate_field(object, field, format)?;
    }

    let selectors: Vec<InstanceSelector> = match (multi_instance, filter) {
        (false, _) => vec![InstanceSelector::None],
        (true, InstanceFilter::All) => vec![InstanceSelector::Wildcard],
        (true, InstanceFilter::Named(names)) => {
            if names.is_empty() {
                return Err(CollectError::Configuration(format!(
                    "empty instance filter on '{}'",
                    object
                )));
            }
            names
                .iter()
                .map(|n| InstanceSelector::Named(n.clone()))
                .collect()
        }
    };

    let mut counters = Vec::with_capacity(fields.len() * selectors.len());
    for (index, field) in fields.iter().enumerate() {
        for selector in &selectors {
            counters.push((
                index,
                CounterDescriptor {
                    object: object.to_string(),
                    counter: field.counter.to_string(),
                    instance: selector.clone(),
                },
            ));
        }
    }

    Ok(CounterSet {
        object: object.to_string(),
        multi_instance,
        counters,
    })
}

fn validate_field(object: &str, field: &FieldSpec, format: ValueFormat) -> Result<(), CollectError> {
    if field.counter.is_empty() {
        return Err(CollectError::Configuration(format!(
            "field '{}' of '{}' has an empty counter name",
            field.name, object
        )));
    }

    if let Some(scale) = field.scale {
        if !scale.is_finite() || scale == 0.0 {
            return Err(CollectError::Configuration(format!(
                "field '{}' has an invalid scale factor {}",
                field.name, scale
            )));
        }
        if format == ValueFormat::Raw {
            return Err(CollectError::Configuration(format!(
                "field '{}' declares a scale factor but '{}' is collected raw",
                field.name, object
            )));
        }
        if field.numeric == Numeric::U64 {
            return Err(CollectError::Configuration(format!(
                "field '{}' declares a scale factor on an integer field",
                field.name
            )));
        }
    }

    if format == ValueFormat::Double && field.numeric == Numeric::U64 {
        return Err(CollectError::TypeMismatch {
            counter: field.counter.to_string(),
            expected: field.numeric,
            actual: format.kind(),
        });
    }

    Ok(())
}
