//! Decoded field values
//!
//! A decoded value is a tagged sum: null, integer, float, string, calendar
//! timestamp, enumeration label, or a sequence of those.  Integers widen to
//! 64 bits and floats to `f64` on the way in, so downstream consumers see a
//! single numeric width regardless of the wire type.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::message::RawValue;

/// A single decoded value.
///
/// Invalid-value masking introduces `Null` into otherwise-numeric
/// sequences, so arrays may mix `Null` with numbers.
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(untagged))]
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    /// The field carried its base type's invalid sentinel.
    Null,
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
    Time(DateTime<Utc>),
    /// A label resolved through a profile-defined enumeration.
    Label(String),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this is a scalar number.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Uint(_) | Value::Float(_))
    }

    /// Whether arithmetic (scale/offset) may be applied: a number, a null,
    /// or a sequence of numbers-or-nulls.
    pub(crate) fn admits_arithmetic(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Array(elements) => elements
                .iter()
                .all(|e| e.is_null() || e.is_numeric()),
            other => other.is_numeric(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(x) => Some(*x as f64),
            Value::Uint(x) => Some(*x as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// The value as a signed integer, used for enumeration lookups.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(x) => Some(*x),
            Value::Uint(x) => i64::try_from(*x).ok(),
            _ => None,
        }
    }

    /// Promotes one raw element to a decoded value.
    ///
    /// Signed integers widen to `i64`, unsigned to `u64`, floats to `f64`.
    /// A developer-field byte blob becomes a sequence of its bytes.
    pub(crate) fn from_raw_element(raw: &RawValue, idx: usize) -> Value {
        use RawValue::*;
        match raw {
            Sint8(v) => Value::Int(v[idx] as i64),
            Uint8(v) => Value::Uint(v[idx] as u64),
            Sint16(v) => Value::Int(v[idx] as i64),
            Uint16(v) => Value::Uint(v[idx] as u64),
            Sint32(v) => Value::Int(v[idx] as i64),
            Uint32(v) => Value::Uint(v[idx] as u64),
            Sint64(v) => Value::Int(v[idx]),
            Uint64(v) => Value::Uint(v[idx]),
            Float32(v) => Value::Float(v[idx] as f64),
            Float64(v) => Value::Float(v[idx]),
            String(s) => Value::Text(s.clone()),
            Bytes(b) => Value::Array(b.iter().map(|byte| Value::Uint(*byte as u64)).collect()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(x) => write!(f, "{x}"),
            Value::Uint(x) => write!(f, "{x}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Time(t) => write!(f, "{}", t.to_rfc3339()),
            Value::Label(s) => write!(f, "{s}"),
            Value::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Value;
    use crate::message::RawValue;

    #[test]
    fn promotion_widens_to_64_bits() {
        assert_eq!(
            Value::from_raw_element(&RawValue::Sint8(vec![-5]), 0),
            Value::Int(-5)
        );
        assert_eq!(
            Value::from_raw_element(&RawValue::Uint16(vec![65535]), 0),
            Value::Uint(65535)
        );
        assert_eq!(
            Value::from_raw_element(&RawValue::Float32(vec![1.5]), 0),
            Value::Float(1.5)
        );
        assert_eq!(
            Value::from_raw_element(&RawValue::Uint64(vec![u64::MAX]), 0),
            Value::Uint(u64::MAX)
        );
    }

    #[test]
    fn arithmetic_admission() {
        assert!(Value::Null.admits_arithmetic());
        assert!(Value::Int(3).admits_arithmetic());
        assert!(Value::Array(vec![Value::Uint(1), Value::Null]).admits_arithmetic());
        assert!(!Value::Text("x".to_owned()).admits_arithmetic());
        assert!(!Value::Array(vec![Value::Uint(1), Value::Label("a".to_owned())])
            .admits_arithmetic());
    }

    #[test]
    fn numeric_casts() {
        assert_eq!(Value::Int(-2).as_f64(), Some(-2.0));
        assert_eq!(Value::Uint(7).as_i64(), Some(7));
        assert_eq!(Value::Uint(u64::MAX).as_i64(), None);
        assert_eq!(Value::Text("9".to_owned()).as_i64(), None);
    }

    #[test]
    fn display() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(
            Value::Array(vec![Value::Uint(1), Value::Null, Value::Int(-3)]).to_string(),
            "[1, null, -3]"
        );
        assert_eq!(Value::Text("trail run".to_owned()).to_string(), "trail run");
    }
}
