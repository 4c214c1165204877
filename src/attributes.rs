//! Conversion between attribute maps and the OpAMP `KeyValue` wire list.
//!
//! Attribute values are held as [`serde_json::Value`]: the same shape they have in remote
//! config sections and configuration files. Only strings, numbers and booleans can be put on
//! the wire. `Null` plays the role of an unset value and is skipped, arrays and objects are
//! rejected.
//!
//! A float with no fractional part, such as `3.0`, goes out as an integer and decodes back as
//! `3`. Round trips preserve the numeric value, not the float type.

use crate::api::ClientError;
use crate::opamp::spec::{any_value, AnyValue, KeyValue};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

/// Attribute map with unique, ordered keys.
pub type Attributes = BTreeMap<String, Value>;

/// Encodes an attribute map into wire pairs.
///
/// `None` in gives `None` out, which keeps "no attributes" apart from "empty attributes".
pub fn encode(attributes: Option<&Attributes>) -> Result<Option<Vec<KeyValue>>, ClientError> {
    let attributes = match attributes {
        Some(attributes) => attributes,
        None => return Ok(None),
    };

    let mut pairs = Vec::with_capacity(attributes.len());
    for (key, value) in attributes {
        if let Some(value) = encode_value(key, value)? {
            pairs.push(KeyValue {
                key: key.clone(),
                value: Some(value),
            });
        }
    }
    Ok(Some(pairs))
}

/// Encodes a single value. Returns `Ok(None)` for `Null`.
pub fn encode_value(key: &str, value: &Value) -> Result<Option<AnyValue>, ClientError> {
    let value = match value {
        Value::Null => return Ok(None),
        Value::String(s) => any_value::Value::StringValue(s.clone()),
        Value::Bool(b) => any_value::Value::BoolValue(*b),
        Value::Number(n) => encode_number(n),
        Value::Array(_) => return Err(unsupported(key, "array")),
        Value::Object(_) => return Err(unsupported(key, "object")),
    };
    Ok(Some(AnyValue { value: Some(value) }))
}

fn encode_number(n: &Number) -> any_value::Value {
    if let Some(i) = n.as_i64() {
        return any_value::Value::IntValue(i);
    }
    // u64 above i64::MAX and every float land here
    let f = n.as_f64().unwrap_or(f64::NAN);
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        any_value::Value::IntValue(f as i64)
    } else {
        any_value::Value::DoubleValue(f)
    }
}

fn unsupported(key: &str, kind: &'static str) -> ClientError {
    ClientError::UnsupportedAttributeType {
        key: key.to_string(),
        kind,
    }
}

/// Decodes wire pairs into an attribute map.
///
/// Unlike [`encode`], an absent list decodes to an empty map. Later duplicates of a key win.
/// Values without a scalar representation (arrays, key/value lists, bytes) are dropped.
pub fn decode(pairs: Option<&[KeyValue]>) -> Attributes {
    let mut attributes = Attributes::new();
    for pair in pairs.unwrap_or_default() {
        match pair.value.as_ref().and_then(decode_value) {
            Some(value) => {
                attributes.insert(pair.key.clone(), value);
            }
            None => log::debug!("Skipping attribute {} without a scalar value", pair.key),
        }
    }
    attributes
}

fn decode_value(value: &AnyValue) -> Option<Value> {
    match value.value.as_ref()? {
        any_value::Value::StringValue(s) => Some(Value::String(s.clone())),
        any_value::Value::BoolValue(b) => Some(Value::Bool(*b)),
        any_value::Value::IntValue(i) => Some(Value::from(*i)),
        any_value::Value::DoubleValue(f) => Number::from_f64(*f).map(Value::Number),
        _ => None,
    }
}

/// Builds a map from `(key, value)` pairs, later pairs overriding earlier ones.
pub fn from_pairs<I, K>(pairs: I) -> Attributes
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(key, value)| (key.into(), value)).collect()
}
