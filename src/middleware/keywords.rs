//! Extra schema keywords beyond the draft vocabulary.
//!
//! - `range: [min, max]` holds a number to `min <= n <= max`
//! - `exclusiveRange: [min, max]` holds a number to `min < n < max`
//!
//! Both ignore non-numeric instances; pair them with `"type"` to require a
//! number.

use jsonschema::paths::{LazyLocation, Location};
use jsonschema::{Keyword, ValidationError};
use serde_json::{Map, Value};

struct Range {
    min: f64,
    max: f64,
    exclusive: bool,
    location: Location,
}

impl Range {
    fn contains(&self, n: f64) -> bool {
        if self.exclusive {
            self.min < n && n < self.max
        } else {
            self.min <= n && n <= self.max
        }
    }
}

impl Keyword for Range {
    fn validate<'i>(&self, instance: &'i Value, location: &LazyLocation) -> Result<(), ValidationError<'i>> {
        if self.is_valid(instance) {
            return Ok(());
        }
        let (open, close) = if self.exclusive { ('(', ')') } else { ('[', ']') };
        Err(ValidationError::custom(
            self.location.clone(),
            location.into(),
            instance,
            format!("{instance} is not in range {open}{}, {}{close}", self.min, self.max),
        ))
    }

    fn is_valid(&self, instance: &Value) -> bool {
        instance.as_f64().is_none_or(|n| self.contains(n))
    }
}

fn range_factory<'a>(
    value: &'a Value,
    location: Location,
    exclusive: bool,
) -> Result<Box<dyn Keyword>, ValidationError<'a>> {
    let bounds = match value.as_array().map(Vec::as_slice) {
        Some([min, max]) => min.as_f64().zip(max.as_f64()),
        _ => None,
    };
    match bounds {
        Some((min, max)) if min <= max => Ok(Box::new(Range { min, max, exclusive, location })),
        _ => Err(ValidationError::custom(
            location,
            Location::new(),
            value,
            "expected an array of two numbers [min, max] with min <= max",
        )),
    }
}

pub(crate) fn range<'a>(
    _parent: &'a Map<String, Value>,
    value: &'a Value,
    location: Location,
) -> Result<Box<dyn Keyword>, ValidationError<'a>> {
    range_factory(value, location, false)
}

pub(crate) fn exclusive_range<'a>(
    _parent: &'a Map<String, Value>,
    value: &'a Value,
    location: Location,
) -> Result<Box<dyn Keyword>, ValidationError<'a>> {
    range_factory(value, location, true)
}
