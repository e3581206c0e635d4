//! # Value and Lookup Type System
//!
//! `RSValue` is the dynamically-typed value every result processor and
//! reducer operates on; `RLookup`/`RLookupRow` are the named, slot-indexed
//! field registry and the sparse row storage shared by every processor in a
//! pipeline.
//!
//! ## Usage
//!
//! ```rust
//! use aggflow::value::{RSValue, RLookup, RLookupRow};
//!
//! let mut lookup = RLookup::new();
//! let key = lookup.get_for_write("score", true).unwrap();
//!
//! let mut row = RLookupRow::new();
//! row.write_key(&key, RSValue::from(42.0));
//! assert_eq!(row.read(&key), Some(&RSValue::Number(42.0)));
//! ```

mod lookup;
mod row;

pub use lookup::{RLookup, RLookupKey, RLookupKeyFlags, RLookupMode};
pub use row::RLookupRow;

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Dynamically-typed value flowing through the pipeline.
///
/// Reference-counted variants (`String`, `Array`, `Map`, `Ref`) are cheap to
/// clone; a processor may "own" a value (it is free to mutate in place before
/// handing it downstream) or "borrow" it (it must not mutate, only read or
/// clone-on-write).
#[derive(Debug, Clone)]
pub enum RSValue {
    Null,
    Number(f64),
    String(Arc<str>),
    Array(Arc<Vec<RSValue>>),
    Map(Arc<Vec<(Arc<str>, RSValue)>>),
    /// Pointer to another value; used when a field's value is shared verbatim
    /// between rows (e.g. a document key reused by several group outputs).
    Ref(Arc<RSValue>),
    /// Two alternative representations of the same multi-typed field
    /// (e.g. a raw numeric sortable plus its stringified form).
    Duo(Box<RSValue>, Box<RSValue>),
    /// Three alternative representations (numeric, stringified, and a
    /// field-specific display form).
    Trio(Box<RSValue>, Box<RSValue>, Box<RSValue>),
}

impl RSValue {
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        RSValue::String(s.into())
    }

    pub fn array(values: Vec<RSValue>) -> Self {
        RSValue::Array(Arc::new(values))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RSValue::Null)
    }

    /// Truthiness as used by FILTER steps: null, 0, empty string/array are
    /// falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self.dereferenced() {
            RSValue::Null => false,
            RSValue::Number(n) => *n != 0.0,
            RSValue::String(s) => !s.is_empty(),
            RSValue::Array(a) => !a.is_empty(),
            RSValue::Map(m) => !m.is_empty(),
            RSValue::Duo(a, _) | RSValue::Trio(a, _, _) => a.is_truthy(),
            RSValue::Ref(_) => unreachable!("dereferenced() strips Ref"),
        }
    }

    /// Follows `Ref` indirection to the underlying value.
    pub fn dereferenced(&self) -> &RSValue {
        match self {
            RSValue::Ref(inner) => inner.dereferenced(),
            other => other,
        }
    }

    /// Numeric coercion used by reducers and arithmetic APPLY expressions.
    /// Non-numeric, non-coercible values yield `None`.
    pub fn to_number(&self) -> Option<f64> {
        match self.dereferenced() {
            RSValue::Number(n) => Some(*n),
            RSValue::String(s) => s.parse::<f64>().ok(),
            RSValue::Null => None,
            RSValue::Duo(a, _) | RSValue::Trio(a, _, _) => a.to_number(),
            RSValue::Array(_) | RSValue::Map(_) | RSValue::Ref(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.dereferenced() {
            RSValue::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RSValue]> {
        match self.dereferenced() {
            RSValue::Array(a) => Some(a.as_slice()),
            _ => None,
        }
    }
}

impl From<f64> for RSValue {
    fn from(n: f64) -> Self {
        RSValue::Number(n)
    }
}

impl From<i64> for RSValue {
    fn from(n: i64) -> Self {
        RSValue::Number(n as f64)
    }
}

impl From<&str> for RSValue {
    fn from(s: &str) -> Self {
        RSValue::string(s)
    }
}

impl From<String> for RSValue {
    fn from(s: String) -> Self {
        RSValue::string(s)
    }
}

impl fmt::Display for RSValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RSValue::Null => write!(f, "null"),
            RSValue::Number(n) => write!(f, "{n}"),
            RSValue::String(s) => write!(f, "{s}"),
            RSValue::Array(a) => {
                write!(f, "[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            RSValue::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                write!(f, "}}")
            }
            RSValue::Ref(inner) => write!(f, "{inner}"),
            RSValue::Duo(a, _) => write!(f, "{a}"),
            RSValue::Trio(a, _, _) => write!(f, "{a}"),
        }
    }
}

impl PartialEq for RSValue {
    fn eq(&self, other: &Self) -> bool {
        match (self.dereferenced(), other.dereferenced()) {
            (RSValue::Null, RSValue::Null) => true,
            (RSValue::Number(a), RSValue::Number(b)) => a == b,
            (RSValue::String(a), RSValue::String(b)) => a == b,
            (RSValue::Array(a), RSValue::Array(b)) => a == b,
            (RSValue::Map(a), RSValue::Map(b)) => a == b,
            (RSValue::Duo(a, _), RSValue::Duo(b, _)) => a == b,
            (RSValue::Trio(a, _, _), RSValue::Trio(b, _, _)) => a == b,
            _ => false,
        }
    }
}

/// Total ordering used by the SORTER processor: numbers and
/// strings compare naturally; NaN sorts as less than everything; mixed types
/// fall back to a stable type-rank ordering so heaps never panic.
impl PartialOrd for RSValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for RSValue {}

impl Ord for RSValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use RSValue::*;
        match (self.dereferenced(), other.dereferenced()) {
            (Null, Null) => Ordering::Equal,
            (Number(a), Number(b)) => a.partial_cmp(b).unwrap_or_else(|| match (a.is_nan(), b.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => unreachable!(),
            }),
            (String(a), String(b)) => a.cmp(b),
            (Array(a), Array(b)) => a.cmp(b),
            _ => type_rank(self).cmp(&type_rank(other)),
        }
    }
}

fn type_rank(v: &RSValue) -> u8 {
    match v.dereferenced() {
        RSValue::Null => 0,
        RSValue::Number(_) => 1,
        RSValue::String(_) => 2,
        RSValue::Array(_) => 3,
        RSValue::Map(_) => 4,
        RSValue::Duo(..) | RSValue::Trio(..) | RSValue::Ref(_) => 5,
    }
}

impl Hash for RSValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.dereferenced() {
            RSValue::Null => 0u8.hash(state),
            RSValue::Number(n) => {
                1u8.hash(state);
                n.to_bits().hash(state);
            }
            RSValue::String(s) => {
                2u8.hash(state);
                s.hash(state);
            }
            RSValue::Array(a) => {
                3u8.hash(state);
                for v in a.iter() {
                    v.hash(state);
                }
            }
            RSValue::Map(m) => {
                4u8.hash(state);
                for (k, v) in m.iter() {
                    k.hash(state);
                    v.hash(state);
                }
            }
            // dereferenced() only strips Ref; Duo/Trio hash via their first
            // element, matching is_truthy()/to_number()/PartialEq.
            RSValue::Duo(a, _) | RSValue::Trio(a, _, _) => a.hash(state),
            RSValue::Ref(_) => unreachable!("dereferenced() strips Ref"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!RSValue::Null.is_truthy());
        assert!(!RSValue::Number(0.0).is_truthy());
        assert!(RSValue::Number(1.0).is_truthy());
        assert!(!RSValue::string("").is_truthy());
        assert!(RSValue::string("x").is_truthy());
    }

    #[test]
    fn numeric_coercion_from_string() {
        assert_eq!(RSValue::string("3.5").to_number(), Some(3.5));
        assert_eq!(RSValue::string("nope").to_number(), None);
    }

    #[test]
    fn ordering_is_stable_for_heaps() {
        let mut values = vec![
            RSValue::Number(3.0),
            RSValue::Number(1.0),
            RSValue::Number(f64::NAN),
            RSValue::Number(2.0),
        ];
        values.sort();
        assert!(values[0].to_number().unwrap().is_nan());
    }

    #[test]
    fn ref_dereferences_transparently_for_equality() {
        let inner = RSValue::Number(5.0);
        let reffed = RSValue::Ref(Arc::new(inner.clone()));
        assert_eq!(inner, reffed);
    }
}
