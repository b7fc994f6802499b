//! Unified parameter/scalar value representation.
//!
//! `SqlValue` is the single value type carried across the gateway boundary:
//! setup callbacks bind them as parameters, and the scalar path hands one
//! back (first column, first row) for conversion via [`FromScalar`]. A
//! driver-level NULL is translated to `None` before conversion runs, so the
//! driver's null marker never leaks past the gateway.

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::error::GatewayError;

/// Values that can be bound as query parameters or returned by the scalar
/// path, independent of the underlying driver.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    Json(JsonValue),
    /// Binary data
    Bytes(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        if let SqlValue::Int(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        if let SqlValue::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        if let SqlValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(value) => Some(*value),
            // SQLite stores booleans as 0/1 integers.
            SqlValue::Int(0) => Some(false),
            SqlValue::Int(1) => Some(true),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            SqlValue::Timestamp(value) => Some(*value),
            SqlValue::Text(s) => {
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                    return Some(dt);
                }
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok()
            }
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        if let SqlValue::Bytes(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(value: NaiveDateTime) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl From<JsonValue> for SqlValue {
    fn from(value: JsonValue) -> Self {
        SqlValue::Json(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Bytes(value)
    }
}

/// Conversion from a non-null scalar result into a typed output.
///
/// Implemented for the common Rust primitives plus `SqlValue` itself, which
/// serves as the untyped escape hatch.
pub trait FromScalar: Sized {
    fn from_scalar(value: SqlValue) -> Result<Self, GatewayError>;
}

fn mismatch(expected: &str, got: &SqlValue) -> GatewayError {
    GatewayError::ScalarConversion(format!("expected {expected}, got {got:?}"))
}

impl FromScalar for SqlValue {
    fn from_scalar(value: SqlValue) -> Result<Self, GatewayError> {
        Ok(value)
    }
}

impl FromScalar for i64 {
    fn from_scalar(value: SqlValue) -> Result<Self, GatewayError> {
        value.as_int().ok_or_else(|| mismatch("integer", &value))
    }
}

impl FromScalar for i32 {
    fn from_scalar(value: SqlValue) -> Result<Self, GatewayError> {
        let wide = value.as_int().ok_or_else(|| mismatch("integer", &value))?;
        i32::try_from(wide).map_err(|_| {
            GatewayError::ScalarConversion(format!("integer {wide} does not fit in i32"))
        })
    }
}

impl FromScalar for f64 {
    fn from_scalar(value: SqlValue) -> Result<Self, GatewayError> {
        match value {
            SqlValue::Float(f) => Ok(f),
            SqlValue::Int(i) => Ok(i as f64),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl FromScalar for bool {
    fn from_scalar(value: SqlValue) -> Result<Self, GatewayError> {
        value.as_bool().ok_or_else(|| mismatch("boolean", &value))
    }
}

impl FromScalar for String {
    fn from_scalar(value: SqlValue) -> Result<Self, GatewayError> {
        match value {
            SqlValue::Text(s) => Ok(s),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl FromScalar for Vec<u8> {
    fn from_scalar(value: SqlValue) -> Result<Self, GatewayError> {
        match value {
            SqlValue::Bytes(b) => Ok(b),
            other => Err(mismatch("bytes", &other)),
        }
    }
}

impl FromScalar for NaiveDateTime {
    fn from_scalar(value: SqlValue) -> Result<Self, GatewayError> {
        value
            .as_timestamp()
            .ok_or_else(|| mismatch("timestamp", &value))
    }
}

impl FromScalar for JsonValue {
    fn from_scalar(value: SqlValue) -> Result<Self, GatewayError> {
        match value {
            SqlValue::Json(v) => Ok(v),
            SqlValue::Text(s) => serde_json::from_str(&s).map_err(|e| {
                GatewayError::ScalarConversion(format!("invalid JSON text: {e}"))
            }),
            other => Err(mismatch("json", &other)),
        }
    }
}
