//! Documents and the scalar values they carry.
//!
//! A [`Document`] is an insertion-ordered mapping from field name to
//! [`FieldValue`]. Documents in one run share a comparable schema but are not
//! required to share every key.

use chrono::{DateTime, FixedOffset, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{PluginError, Result};

/// One record flowing through the pipeline.
pub type Document = IndexMap<String, FieldValue>;

/// Scalar value held by a document field.
#[derive(Debug, Clone)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<FixedOffset>),
    Null,
}

impl FieldValue {
    /// Numeric view of the value, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::String(_) => "string",
            FieldValue::Int(_) => "int",
            FieldValue::Float(_) => "float",
            FieldValue::Bool(_) => "bool",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Null => "null",
        }
    }

    // Cross-variant ordering rank; ints and floats share a rank.
    fn rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Bool(_) => 1,
            FieldValue::Int(_) | FieldValue::Float(_) => 2,
            FieldValue::String(_) => 3,
            FieldValue::Timestamp(_) => 4,
        }
    }
}

impl Ord for FieldValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FieldValue::Int(a), FieldValue::Int(b)) => a.cmp(b),
            (FieldValue::String(a), FieldValue::String(b)) => a.cmp(b),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a.cmp(b),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => a.cmp(b),
            (FieldValue::Null, FieldValue::Null) => Ordering::Equal,
            (FieldValue::Float(a), FieldValue::Float(b)) => cmp_float(*a, *b),
            (FieldValue::Int(i), FieldValue::Float(f)) => cmp_int_float(*i, *f),
            (FieldValue::Float(f), FieldValue::Int(i)) => cmp_int_float(*i, *f).reverse(),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

// Numeric order with -0.0 == 0.0; NaNs sort past the infinities by sign.
fn cmp_float(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
}

// Exact comparison: an i64 above 2^53 must not be rounded into a float.
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

    if f.is_nan() {
        return if f.is_sign_negative() { Ordering::Greater } else { Ordering::Less };
    }
    if f >= TWO_POW_63 {
        return Ordering::Less;
    }
    if f < -TWO_POW_63 {
        return Ordering::Greater;
    }

    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(f - whole)).unwrap_or(Ordering::Equal),
        unequal => unequal,
    }
}

// Shortest round-trip digits, positional for decimal exponents in [-4, 16),
// otherwise `d.ddde+XX` with at least two exponent digits.
fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{:e}", value);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };

    if !(-4..16).contains(&exponent) {
        let direction = if exponent < 0 { '-' } else { '+' };
        return format!("{}{}e{}{:02}", sign, mantissa, direction, exponent.abs());
    }

    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let point = exponent + 1;
    let body = if point <= 0 {
        format!("0.{}{}", "0".repeat(point.unsigned_abs() as usize), digits)
    } else if point as usize >= digits.len() {
        format!("{}{}.0", digits, "0".repeat(point as usize - digits.len()))
    } else {
        let (whole, fraction) = digits.split_at(point as usize);
        format!("{}.{}", whole, fraction)
    };
    format!("{}{}", sign, body)
}

impl PartialOrd for FieldValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FieldValue {}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", format_float(*fl)),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<DateTime<FixedOffset>> for FieldValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value.fixed_offset())
    }
}

impl TryFrom<serde_json::Value> for FieldValue {
    type Error = PluginError;

    /// Strings in RFC 3339 form become timestamps; nested values are rejected.
    fn try_from(value: serde_json::Value) -> Result<Self> {
        field_from_json("<json>", value)
    }
}

fn field_from_json(field: &str, value: serde_json::Value) -> Result<FieldValue> {
    match value {
        serde_json::Value::String(s) => Ok(match DateTime::parse_from_rfc3339(&s) {
            Ok(ts) => FieldValue::Timestamp(ts),
            Err(_) => FieldValue::String(s),
        }),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(FieldValue::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(FieldValue::Float(f))
            } else {
                Err(PluginError::malformed(field, format!("unrepresentable number {}", n)))
            }
        }
        serde_json::Value::Bool(b) => Ok(FieldValue::Bool(b)),
        serde_json::Value::Null => Ok(FieldValue::Null),
        other => Err(PluginError::malformed(
            field,
            format!("expected a scalar, got {}", other),
        )),
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::String(s) => serializer.serialize_str(s),
            FieldValue::Int(i) => serializer.serialize_i64(*i),
            FieldValue::Float(f) => serializer.serialize_f64(*f),
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            FieldValue::Timestamp(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            FieldValue::Null => serializer.serialize_unit(),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        FieldValue::try_from(value).map_err(serde::de::Error::custom)
    }
}

/// Build a document from `(field, value)` pairs.
pub fn document<I, K, V>(pairs: I) -> Document
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<FieldValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Compact JSON rendering of a document for error messages.
pub fn describe(doc: &Document) -> String {
    serde_json::to_string(doc).unwrap_or_else(|_| format!("{:?}", doc))
}

/// Look up `field` in `doc`, failing with a missing-field error.
pub fn require<'a>(doc: &'a Document, field: &str) -> Result<&'a FieldValue> {
    doc.get(field).ok_or_else(|| PluginError::MissingField {
        field: field.to_string(),
        document: describe(doc),
    })
}

/// Parse a JSON array of flat objects into documents.
///
/// Invalid JSON is a config error; a nested array or object in a field is a
/// malformed-value error naming that field.
pub fn documents_from_json(json: &str) -> Result<Vec<Document>> {
    let raw: Vec<IndexMap<String, serde_json::Value>> = serde_json::from_str(json)
        .map_err(|e| PluginError::Config(format!("Failed to parse documents: {}", e)))?;

    raw.into_iter()
        .map(|fields| {
            fields
                .into_iter()
                .map(|(field, value)| -> Result<(String, FieldValue)> {
                    let value = field_from_json(&field, value)?;
                    Ok((field, value))
                })
                .collect::<Result<Document>>()
        })
        .collect()
}

/// Serialize documents to a JSON array.
pub fn documents_to_json(documents: &[Document], pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(documents)
    } else {
        serde_json::to_string(documents)
    };
    rendered.map_err(|e| PluginError::Config(format!("Failed to serialize documents: {}", e)))
}
