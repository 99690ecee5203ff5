//! Index key types with a deterministic total order.
//!
//! Ordering across variants is fixed: Bool < Int < Float < Str < Max.
//! Floats are stored as order-preserving bit patterns so the derived
//! `Ord` is total. `Max` is a bound sentinel that sorts after every
//! real value, used to close composite prefix scans.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// A single component of an index key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    /// Boolean value (false < true).
    Bool(bool),
    /// Integer value. Timestamps index as UTC epoch microseconds.
    Int(i64),
    /// Float value, stored as bits with a total order.
    Float(u64),
    /// String value.
    Str(String),
    /// Upper-bound sentinel, greater than any stored key.
    Max,
}

impl IndexKey {
    pub fn from_bool(v: bool) -> Self {
        IndexKey::Bool(v)
    }

    pub fn from_int(v: i64) -> Self {
        IndexKey::Int(v)
    }

    /// Bit-twiddles the float so unsigned comparison matches numeric
    /// order: negative values flip all bits, positive flip the sign.
    pub fn from_float(v: f64) -> Self {
        let bits = v.to_bits();
        let ordered = if (bits >> 63) == 1 {
            !bits
        } else {
            bits ^ (1 << 63)
        };
        IndexKey::Float(ordered)
    }

    pub fn from_str(v: impl Into<String>) -> Self {
        IndexKey::Str(v.into())
    }

    /// Timestamps index as epoch microseconds so lexicographic RFC 3339
    /// offset variants cannot reorder them.
    pub fn from_timestamp(t: DateTime<Utc>) -> Self {
        IndexKey::Int(t.timestamp_micros())
    }

    /// Builds a key from a JSON scalar. Objects and arrays are not
    /// indexable.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(IndexKey::from_bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(IndexKey::from_int(i))
                } else {
                    n.as_f64().map(IndexKey::from_float)
                }
            }
            Value::String(s) => Some(IndexKey::from_str(s)),
            _ => None,
        }
    }
}

/// Composite key for ordered indexes, compared lexicographically by
/// component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OrderedKey(pub Vec<IndexKey>);

impl OrderedKey {
    pub fn single(key: IndexKey) -> Self {
        OrderedKey(vec![key])
    }
}
