//! Type catalog
//!
//! Supported field types:
//! - integer: 64-bit signed integer
//! - string: short UTF-8 string (VARCHAR(255))
//! - text: unbounded UTF-8 string
//! - date: calendar date
//! - datetime: UTC timestamp
//! - boolean: true/false
//! - json: any JSON value
//! - float: 64-bit floating point
//!
//! The catalog is closed. Each type maps 1:1 to a storage column type and to
//! the native value kind produced by coercion.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::errors::SchemaError;
use crate::storage::{DbValue, StorageType};

const STRING_LENGTH: u32 = 255;

/// Closed set of item field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Integer,
    String,
    Text,
    Date,
    DateTime,
    Boolean,
    Json,
    Float,
}

/// Kind of native value a type coerces to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeKind {
    Integer,
    String,
    Date,
    DateTime,
    Boolean,
    Json,
    Float,
}

impl ScalarType {
    /// Every catalog member, in declaration order
    pub const ALL: [ScalarType; 8] = [
        ScalarType::Integer,
        ScalarType::String,
        ScalarType::Text,
        ScalarType::Date,
        ScalarType::DateTime,
        ScalarType::Boolean,
        ScalarType::Json,
        ScalarType::Float,
    ];

    /// Lowercase catalog name
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Integer => "integer",
            ScalarType::String => "string",
            ScalarType::Text => "text",
            ScalarType::Date => "date",
            ScalarType::DateTime => "datetime",
            ScalarType::Boolean => "boolean",
            ScalarType::Json => "json",
            ScalarType::Float => "float",
        }
    }

    /// Resolves a case-insensitive type name.
    pub fn resolve(name: &str) -> Result<Self, SchemaError> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    /// Resolves a wire value: a type name string, or anything that
    /// deserializes to a catalog member.
    pub fn resolve_value(value: &Value) -> Result<Self, SchemaError> {
        match value {
            Value::String(name) => Self::resolve(name),
            other => Err(SchemaError::UnknownType(other.to_string())),
        }
    }

    pub fn storage_type(&self) -> StorageType {
        match self {
            ScalarType::Integer => StorageType::Integer,
            ScalarType::String => StorageType::Varchar(STRING_LENGTH),
            ScalarType::Text => StorageType::Text,
            ScalarType::Date => StorageType::Date,
            ScalarType::DateTime => StorageType::DateTime,
            ScalarType::Boolean => StorageType::Boolean,
            ScalarType::Json => StorageType::Json,
            ScalarType::Float => StorageType::Float,
        }
    }

    /// Inverse of [`ScalarType::storage_type`]. Any VARCHAR maps back to `string`.
    pub fn from_storage_type(storage: StorageType) -> Self {
        match storage {
            StorageType::Integer => ScalarType::Integer,
            StorageType::Varchar(_) => ScalarType::String,
            StorageType::Text => ScalarType::Text,
            StorageType::Date => ScalarType::Date,
            StorageType::DateTime => ScalarType::DateTime,
            StorageType::Boolean => ScalarType::Boolean,
            StorageType::Json => ScalarType::Json,
            StorageType::Float => ScalarType::Float,
        }
    }

    pub fn native_kind(&self) -> NativeKind {
        match self {
            ScalarType::Integer => NativeKind::Integer,
            ScalarType::String | ScalarType::Text => NativeKind::String,
            ScalarType::Date => NativeKind::Date,
            ScalarType::DateTime => NativeKind::DateTime,
            ScalarType::Boolean => NativeKind::Boolean,
            ScalarType::Json => NativeKind::Json,
            ScalarType::Float => NativeKind::Float,
        }
    }

    /// Coerces a non-null JSON value into this type's native storage value.
    ///
    /// Returns a short reason on failure.
    pub fn coerce(&self, value: &Value) -> Result<DbValue, String> {
        match self.native_kind() {
            NativeKind::Integer => coerce_integer(value),
            NativeKind::Float => coerce_float(value),
            NativeKind::String => match value {
                Value::String(s) => Ok(DbValue::Text(s.clone())),
                other => Err(format!("got {}", json_type_name(other))),
            },
            NativeKind::Boolean => coerce_boolean(value),
            NativeKind::Date => coerce_date(value),
            NativeKind::DateTime => coerce_datetime(value),
            NativeKind::Json => Ok(DbValue::Json(value.clone())),
        }
    }

    /// Fits an already native value, such as a default producer's output,
    /// to this type.
    ///
    /// Widening conversions are applied (integer to float, timestamp to its
    /// UTC date, date to midnight UTC); anything else is a mismatch.
    pub fn conform(&self, value: DbValue) -> Result<DbValue, String> {
        match (self.native_kind(), value) {
            (_, DbValue::Null) => Ok(DbValue::Null),
            (NativeKind::Integer, DbValue::Integer(v)) => Ok(DbValue::Integer(v)),
            (NativeKind::Float, DbValue::Real(v)) => Ok(DbValue::Real(v)),
            (NativeKind::Float, DbValue::Integer(v)) => Ok(DbValue::Real(v as f64)),
            (NativeKind::String, DbValue::Text(v)) => Ok(DbValue::Text(v)),
            (NativeKind::Boolean, DbValue::Boolean(v)) => Ok(DbValue::Boolean(v)),
            (NativeKind::Date, DbValue::Date(v)) => Ok(DbValue::Date(v)),
            (NativeKind::Date, DbValue::Timestamp(ts)) => Ok(DbValue::Date(ts.date_naive())),
            (NativeKind::DateTime, DbValue::Timestamp(ts)) => Ok(DbValue::Timestamp(ts)),
            (NativeKind::DateTime, DbValue::Date(d)) => {
                Ok(DbValue::Timestamp(d.and_time(NaiveTime::MIN).and_utc()))
            }
            (NativeKind::Json, DbValue::Json(v)) => Ok(DbValue::Json(v)),
            (NativeKind::Json, DbValue::Text(v)) => Ok(DbValue::Json(Value::String(v))),
            (NativeKind::Json, DbValue::Integer(v)) => Ok(DbValue::Json(Value::from(v))),
            (NativeKind::Json, DbValue::Boolean(v)) => Ok(DbValue::Json(Value::Bool(v))),
            (_, other) => Err(format!("got {}", other.kind_name())),
        }
    }
}

/// Resolves a type name or passes through an already resolved member.
pub fn resolve<T: Into<TypeRef>>(name_or_type: T) -> Result<ScalarType, SchemaError> {
    match name_or_type.into() {
        TypeRef::Resolved(t) => Ok(t),
        TypeRef::Name(name) => ScalarType::resolve(&name),
    }
}

/// Storage column type for a catalog member
pub fn storage_type_of(t: ScalarType) -> StorageType {
    t.storage_type()
}

/// Native value kind for a catalog member
pub fn native_kind_of(t: ScalarType) -> NativeKind {
    t.native_kind()
}

/// Input accepted by [`resolve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Name(String),
    Resolved(ScalarType),
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::Name(name.to_string())
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        TypeRef::Name(name)
    }
}

impl From<ScalarType> for TypeRef {
    fn from(t: ScalarType) -> Self {
        TypeRef::Resolved(t)
    }
}

impl FromStr for ScalarType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// JSON type name for error messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn coerce_integer(value: &Value) -> Result<DbValue, String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(DbValue::Integer(i));
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                    Ok(DbValue::Integer(f as i64))
                }
                _ => Err(format!("{} is not a valid integer", n)),
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(DbValue::Integer)
            .map_err(|_| format!("'{}' is not a valid integer", s)),
        other => Err(format!("got {}", json_type_name(other))),
    }
}

fn coerce_float(value: &Value) -> Result<DbValue, String> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(DbValue::Real)
            .ok_or_else(|| format!("{} is not a valid float", n)),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(DbValue::Real(f)),
            _ => Err(format!("'{}' is not a valid float", s)),
        },
        other => Err(format!("got {}", json_type_name(other))),
    }
}

fn coerce_boolean(value: &Value) -> Result<DbValue, String> {
    match value {
        Value::Bool(b) => Ok(DbValue::Boolean(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(DbValue::Boolean(false)),
            Some(1) => Ok(DbValue::Boolean(true)),
            _ => Err(format!("{} is not a valid boolean", n)),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(DbValue::Boolean(true)),
            "false" | "no" | "off" | "0" => Ok(DbValue::Boolean(false)),
            _ => Err(format!("'{}' is not a valid boolean", s)),
        },
        other => Err(format!("got {}", json_type_name(other))),
    }
}

fn coerce_date(value: &Value) -> Result<DbValue, String> {
    match value {
        Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(DbValue::Date)
            .map_err(|_| format!("'{}' is not a valid YYYY-MM-DD date", s)),
        other => Err(format!("got {}", json_type_name(other))),
    }
}

fn coerce_datetime(value: &Value) -> Result<DbValue, String> {
    match value {
        Value::String(s) => parse_datetime(s.trim())
            .map(DbValue::Timestamp)
            .ok_or_else(|| format!("'{}' is not a valid ISO-8601 datetime", s)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(DbValue::Timestamp)
            .ok_or_else(|| format!("{} is not a valid Unix timestamp", n)),
        other => Err(format!("got {}", json_type_name(other))),
    }
}

/// Accepts RFC 3339 and naive ISO-8601 (treated as UTC).
pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_is_case_insensitive() {
        assert_eq!(ScalarType::resolve("INTEGER").unwrap(), ScalarType::Integer);
        assert_eq!(ScalarType::resolve("DateTime").unwrap(), ScalarType::DateTime);
        assert_eq!("json".parse::<ScalarType>().unwrap(), ScalarType::Json);
    }

    #[test]
    fn test_resolve_accepts_resolved_member() {
        assert_eq!(resolve(ScalarType::Float).unwrap(), ScalarType::Float);
        assert_eq!(resolve("text").unwrap(), ScalarType::Text);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = ScalarType::resolve("decimal").unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType(ref name) if name == "decimal"));
        assert!(ScalarType::resolve_value(&json!(5)).is_err());
    }

    #[test]
    fn test_storage_mapping_is_bidirectional() {
        for t in ScalarType::ALL {
            assert_eq!(ScalarType::from_storage_type(storage_type_of(t)), t);
        }
        assert_eq!(storage_type_of(ScalarType::String), StorageType::Varchar(255));
        assert_eq!(native_kind_of(ScalarType::Text), NativeKind::String);
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(serde_json::to_value(ScalarType::DateTime).unwrap(), json!("datetime"));
        assert_eq!(ScalarType::Boolean.to_string(), "boolean");
    }

    #[test]
    fn test_integer_coercion() {
        assert_eq!(ScalarType::Integer.coerce(&json!(-1)).unwrap(), DbValue::Integer(-1));
        assert_eq!(ScalarType::Integer.coerce(&json!(3.0)).unwrap(), DbValue::Integer(3));
        assert_eq!(ScalarType::Integer.coerce(&json!("42")).unwrap(), DbValue::Integer(42));
        assert!(ScalarType::Integer.coerce(&json!(3.5)).is_err());
        assert!(ScalarType::Integer.coerce(&json!(true)).is_err());
    }

    #[test]
    fn test_boolean_coercion() {
        assert_eq!(ScalarType::Boolean.coerce(&json!("yes")).unwrap(), DbValue::Boolean(true));
        assert_eq!(ScalarType::Boolean.coerce(&json!(0)).unwrap(), DbValue::Boolean(false));
        assert!(ScalarType::Boolean.coerce(&json!("maybe")).is_err());
    }

    #[test]
    fn test_string_does_not_accept_numbers() {
        assert!(ScalarType::String.coerce(&json!(12)).is_err());
        assert_eq!(ScalarType::Text.coerce(&json!("x")).unwrap(), DbValue::from("x"));
    }

    #[test]
    fn test_temporal_coercion() {
        let date = ScalarType::Date.coerce(&json!("2021-01-01")).unwrap();
        assert_eq!(date, DbValue::Date(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()));
        assert!(ScalarType::Date.coerce(&json!("01/01/2021")).is_err());

        let naive = ScalarType::DateTime.coerce(&json!("2021-01-01T10:00:00")).unwrap();
        let zoned = ScalarType::DateTime.coerce(&json!("2021-01-01T12:00:00+02:00")).unwrap();
        assert_eq!(naive, zoned);
        let epoch = ScalarType::DateTime.coerce(&json!(0)).unwrap();
        assert_eq!(epoch, DbValue::Timestamp(DateTime::from_timestamp(0, 0).unwrap()));
    }

    #[test]
    fn test_conform_native_values() {
        let now = Utc::now();
        assert_eq!(
            ScalarType::Date.conform(DbValue::Timestamp(now)).unwrap(),
            DbValue::Date(now.date_naive())
        );
        assert_eq!(ScalarType::Float.conform(DbValue::Integer(2)).unwrap(), DbValue::Real(2.0));
        assert_eq!(ScalarType::Text.conform(DbValue::from("x")).unwrap(), DbValue::from("x"));
        assert!(ScalarType::Integer.conform(DbValue::from("f365e362")).is_err());
        assert!(ScalarType::Boolean.conform(DbValue::Timestamp(now)).is_err());
    }

    #[test]
    fn test_json_accepts_anything() {
        let value = json!({"nested": [1, 2]});
        assert_eq!(ScalarType::Json.coerce(&value).unwrap(), DbValue::Json(value));
    }
}
