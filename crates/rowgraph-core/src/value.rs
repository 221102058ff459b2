//! Dynamically-typed cell values and the conversions between them and Rust types.
//!
//! Every cell of a [`Row`](crate::Row) is a [`Value`]. Drivers are expected to
//! normalise their backend-specific "no value" marker to [`Value::Null`] before
//! rows reach the hydrator; `Value::Null` is the null sentinel used for
//! presence detection on outer joins.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::field::FieldKind;

/// A single cell of a flat row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// The null sentinel.
    Null,
    Bool(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    /// Arbitrary precision decimal, kept in its textual form.
    Decimal(String),
    Text(String),
    Bytes(Vec<u8>),
    /// Days since the Unix epoch.
    Date(i32),
    /// Microseconds since midnight.
    Time(i64),
    /// Microseconds since the Unix epoch.
    Timestamp(i64),
    /// Microseconds since the Unix epoch, UTC.
    TimestampTz(i64),
    Uuid([u8; 16]),
    Json(serde_json::Value),
    Array(Vec<Value>),
}

impl Value {
    /// True if this is the null sentinel.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOL",
            Value::TinyInt(_) => "TINYINT",
            Value::SmallInt(_) => "SMALLINT",
            Value::Int(_) => "INT",
            Value::BigInt(_) => "BIGINT",
            Value::Float(_) => "FLOAT",
            Value::Double(_) => "DOUBLE",
            Value::Decimal(_) => "DECIMAL",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BYTES",
            Value::Date(_) => "DATE",
            Value::Time(_) => "TIME",
            Value::Timestamp(_) => "TIMESTAMP",
            Value::TimestampTz(_) => "TIMESTAMPTZ",
            Value::Uuid(_) => "UUID",
            Value::Json(_) => "JSON",
            Value::Array(_) => "ARRAY",
        }
    }

    /// Borrow the text payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Widen any integer variant to `i64`.
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Value::TinyInt(v) => Some(*v as i64),
            Value::SmallInt(v) => Some(*v as i64),
            Value::Int(v) => Some(*v as i64),
            Value::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    /// Widen any numeric variant to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            Value::Decimal(s) => s.trim().parse().ok(),
            other => other.as_i64().map(|v| v as f64),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::TinyInt(v) => write!(f, "{v}"),
            Value::SmallInt(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Decimal(s) => f.write_str(s),
            Value::Text(s) => write!(f, "'{s}'"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Date(d) => write!(f, "date({d})"),
            Value::Time(t) => write!(f, "time({t})"),
            Value::Timestamp(ts) | Value::TimestampTz(ts) => write!(f, "ts({ts})"),
            Value::Uuid(u) => {
                for byte in u {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Value::Json(j) => write!(f, "{j}"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

// ============================================================================
// Hashable keys
// ============================================================================

/// A [`Value`] usable as a hash-map key.
///
/// Equality is by value: floats compare by bit pattern and JSON by its
/// serialized text, so every value (including `Null`) has a stable identity.
#[derive(Debug, Clone)]
pub struct ValueKey(Value);

impl ValueKey {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for ValueKey {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<&Value> for ValueKey {
    fn from(value: &Value) -> Self {
        Self(value.clone())
    }
}

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        key_eq(&self.0, &other.0)
    }
}

impl Eq for ValueKey {}

impl Hash for ValueKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_value(&self.0, state);
    }
}

fn key_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
        (Value::Double(x), Value::Double(y)) => x.to_bits() == y.to_bits(),
        (Value::Json(x), Value::Json(y)) => x.to_string() == y.to_string(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| key_eq(l, r))
        }
        _ => a == b,
    }
}

fn hash_value(v: &Value, hasher: &mut impl Hasher) {
    match v {
        Value::Null => 0u8.hash(hasher),
        Value::Bool(b) => {
            1u8.hash(hasher);
            b.hash(hasher);
        }
        Value::TinyInt(i) => {
            2u8.hash(hasher);
            i.hash(hasher);
        }
        Value::SmallInt(i) => {
            3u8.hash(hasher);
            i.hash(hasher);
        }
        Value::Int(i) => {
            4u8.hash(hasher);
            i.hash(hasher);
        }
        Value::BigInt(i) => {
            5u8.hash(hasher);
            i.hash(hasher);
        }
        Value::Float(f) => {
            6u8.hash(hasher);
            f.to_bits().hash(hasher);
        }
        Value::Double(f) => {
            7u8.hash(hasher);
            f.to_bits().hash(hasher);
        }
        Value::Decimal(s) => {
            8u8.hash(hasher);
            s.hash(hasher);
        }
        Value::Text(s) => {
            9u8.hash(hasher);
            s.hash(hasher);
        }
        Value::Bytes(b) => {
            10u8.hash(hasher);
            b.hash(hasher);
        }
        Value::Date(d) => {
            11u8.hash(hasher);
            d.hash(hasher);
        }
        Value::Time(t) => {
            12u8.hash(hasher);
            t.hash(hasher);
        }
        Value::Timestamp(ts) => {
            13u8.hash(hasher);
            ts.hash(hasher);
        }
        Value::TimestampTz(ts) => {
            14u8.hash(hasher);
            ts.hash(hasher);
        }
        Value::Uuid(u) => {
            15u8.hash(hasher);
            u.hash(hasher);
        }
        Value::Json(j) => {
            16u8.hash(hasher);
            j.to_string().hash(hasher);
        }
        Value::Array(arr) => {
            17u8.hash(hasher);
            arr.len().hash(hasher);
            for item in arr {
                hash_value(item, hasher);
            }
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

/// Why a [`Value`] could not be converted into a field type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// The null sentinel was assigned to a non-nullable target.
    Null,
    /// The value's variant (or range) does not fit the target type.
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::Null => f.write_str("NULL assigned to a non-nullable target"),
            ConversionError::Mismatch { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
        }
    }
}

impl std::error::Error for ConversionError {}

/// Types that can be read out of a single cell.
pub trait FromValue: Sized {
    /// Classification used when a mapping is built by introspection.
    const KIND: FieldKind;
    /// Whether the null sentinel is a legal input.
    const NULLABLE: bool = false;

    fn from_value(value: &Value) -> Result<Self, ConversionError>;
}

/// Types that can be written into a single cell.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

fn mismatch<T>(expected: &'static str, value: &Value) -> Result<T, ConversionError> {
    Err(ConversionError::Mismatch {
        expected,
        found: value.type_name(),
    })
}

fn null_or_mismatch<T>(expected: &'static str, value: &Value) -> Result<T, ConversionError> {
    if value.is_null() {
        Err(ConversionError::Null)
    } else {
        mismatch(expected, value)
    }
}

impl FromValue for bool {
    const KIND: FieldKind = FieldKind::Bool;

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => match other.as_i64() {
                Some(i) => Ok(i != 0),
                None => null_or_mismatch("bool", other),
            },
        }
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

macro_rules! integer_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                const KIND: FieldKind = FieldKind::Integer;

                fn from_value(value: &Value) -> Result<Self, ConversionError> {
                    match value.as_i64() {
                        Some(i) => <$ty>::try_from(i).or_else(|_| mismatch(stringify!($ty), value)),
                        None => null_or_mismatch(stringify!($ty), value),
                    }
                }
            }

            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::$variant((*self).into())
                }
            }
        )*
    };
}

integer_conversions!(
    i8 => TinyInt,
    i16 => SmallInt,
    i32 => Int,
    i64 => BigInt,
    u8 => SmallInt,
    u16 => Int,
    u32 => BigInt,
);

impl FromValue for u64 {
    const KIND: FieldKind = FieldKind::Integer;

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value.as_i64() {
            Some(i) => u64::try_from(i).or_else(|_| mismatch("u64", value)),
            None => null_or_mismatch("u64", value),
        }
    }
}

impl ToValue for u64 {
    fn to_value(&self) -> Value {
        match i64::try_from(*self) {
            Ok(i) => Value::BigInt(i),
            Err(_) => Value::Decimal(self.to_string()),
        }
    }
}

impl FromValue for f64 {
    const KIND: FieldKind = FieldKind::Float;

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value.as_f64() {
            Some(f) => Ok(f),
            None => null_or_mismatch("f64", value),
        }
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Double(*self)
    }
}

impl FromValue for f32 {
    const KIND: FieldKind = FieldKind::Float;

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Float(f) => Ok(*f),
            other => match other.as_f64() {
                Some(f) => Ok(f as f32),
                None => null_or_mismatch("f32", other),
            },
        }
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FromValue for String {
    const KIND: FieldKind = FieldKind::Text;

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(s) | Value::Decimal(s) => Ok(s.clone()),
            other => null_or_mismatch("String", other),
        }
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl ToValue for &str {
    fn to_value(&self) -> Value {
        Value::Text((*self).to_string())
    }
}

impl FromValue for Vec<u8> {
    const KIND: FieldKind = FieldKind::Bytes;

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            other => null_or_mismatch("Vec<u8>", other),
        }
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

impl FromValue for [u8; 16] {
    const KIND: FieldKind = FieldKind::Uuid;

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::Bytes(b) => <[u8; 16]>::try_from(b.as_slice()).or_else(|_| mismatch("uuid", value)),
            other => null_or_mismatch("uuid", other),
        }
    }
}

impl ToValue for [u8; 16] {
    fn to_value(&self) -> Value {
        Value::Uuid(*self)
    }
}

impl FromValue for serde_json::Value {
    const KIND: FieldKind = FieldKind::Json;

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Json(j) => Ok(j.clone()),
            Value::Text(s) => serde_json::from_str(s).or_else(|_| mismatch("json", value)),
            other => null_or_mismatch("json", other),
        }
    }
}

impl ToValue for serde_json::Value {
    fn to_value(&self) -> Value {
        Value::Json(self.clone())
    }
}

impl FromValue for Value {
    const KIND: FieldKind = FieldKind::Opaque;
    const NULLABLE: bool = true;

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const KIND: FieldKind = T::KIND;
    const NULLABLE: bool = true;

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToValue::to_value)
    }
}
