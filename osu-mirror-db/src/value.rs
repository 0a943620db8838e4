// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

//! Column values as held by records and returned by queries.

use std::fmt;

use chrono::NaiveDateTime;
use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, ValueRef};

use crate::field::FieldType;

/// Formats accepted when reading a timestamp out of a text value.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// ISO-8601 rendering used for timestamp storage.
pub(crate) fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s.trim(), fmt).ok())
}

/// A single column value.
///
/// `Timestamp` and `Boolean` only exist on the way in; the store hands them
/// back as `Text` and `Integer` respectively.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Timestamp(NaiveDateTime),
    Boolean(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view of the value, accepting numeric text and whole reals.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Boolean(b) => Some(i64::from(*b)),
            Value::Real(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Float view of the value, accepting integers and numeric text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON value into a column value for a field of type `ty`.
    ///
    /// The catalog API sends most numbers as strings, so strings are parsed
    /// according to the declared type. Anything that does not parse is kept
    /// as text and left for the store to accept or reject.
    pub fn from_json(json: &serde_json::Value, ty: FieldType) -> Self {
        use serde_json::Value as Json;

        match (json, ty) {
            (Json::Null, _) => Value::Null,
            (Json::Bool(b), FieldType::Boolean) => Value::Boolean(*b),
            (Json::Bool(b), _) => Value::Integer(i64::from(*b)),
            (Json::Number(n), FieldType::Real) => n
                .as_f64()
                .map(Value::Real)
                .unwrap_or_else(|| Value::Text(n.to_string())),
            (Json::Number(n), FieldType::Boolean) => Value::Boolean(n.as_f64() != Some(0.0)),
            (Json::Number(n), _) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n
                    .as_f64()
                    .map(Value::Real)
                    .unwrap_or_else(|| Value::Text(n.to_string())),
            },
            (Json::String(s), ty) => Self::from_text(s, ty),
            (other, _) => Value::Text(other.to_string()),
        }
    }

    fn from_text(s: &str, ty: FieldType) -> Self {
        let parsed = match ty {
            FieldType::Integer => s.trim().parse().ok().map(Value::Integer),
            FieldType::Real => s.trim().parse().ok().map(Value::Real),
            FieldType::Boolean => match s.trim() {
                "1" | "true" | "True" => Some(Value::Boolean(true)),
                "0" | "false" | "False" => Some(Value::Boolean(false)),
                _ => None,
            },
            FieldType::Timestamp => parse_timestamp(s).map(Value::Timestamp),
            FieldType::Blob => Some(Value::Blob(s.as_bytes().to_vec())),
            FieldType::Text => None,
        };
        parsed.unwrap_or_else(|| Value::Text(s.to_owned()))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => f.write_str(s),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
            Value::Timestamp(ts) => f.write_str(&format_timestamp(ts)),
            Value::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Timestamp(ts) => ToSqlOutput::from(format_timestamp(ts)),
            Value::Boolean(b) => ToSqlOutput::from(*b),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(r) => Value::Real(r),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
