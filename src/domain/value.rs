//! Field values exchanged between domain objects and the codec.
//!
//! A [`Value`] is what an accessor returns and what a setter accepts. Scalars
//! carry their own [`ScalarType`]; references are arena indices into the
//! surrounding [`ObjectGraph`](super::ObjectGraph); collections are ordered.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{FieldError, FieldResult};

use super::ObjectId;

/// Lexical format of `xsd:date` literals.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Lexical format of `xsd:dateTime` literals.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
/// Lexical format of `xsd:time` literals.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Scalar field types the mapper knows how to turn into literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    String,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Date,
    DateTime,
    Time,
}

impl ScalarType {
    /// All scalar types, in conversion-table order.
    pub const ALL: [ScalarType; 9] = [
        ScalarType::String,
        ScalarType::Int,
        ScalarType::Long,
        ScalarType::Float,
        ScalarType::Double,
        ScalarType::Boolean,
        ScalarType::Date,
        ScalarType::DateTime,
        ScalarType::Time,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Int => "int",
            ScalarType::Long => "long",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
            ScalarType::Boolean => "boolean",
            ScalarType::Date => "date",
            ScalarType::DateTime => "dateTime",
            ScalarType::Time => "time",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    /// Another domain object in the same object graph.
    Reference(ObjectId),
    /// An ordered collection of scalars or references.
    List(Vec<Value>),
}

impl Value {
    /// The scalar type of this value, `None` for references and lists.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            Value::String(_) => Some(ScalarType::String),
            Value::Int(_) => Some(ScalarType::Int),
            Value::Long(_) => Some(ScalarType::Long),
            Value::Float(_) => Some(ScalarType::Float),
            Value::Double(_) => Some(ScalarType::Double),
            Value::Boolean(_) => Some(ScalarType::Boolean),
            Value::Date(_) => Some(ScalarType::Date),
            Value::DateTime(_) => Some(ScalarType::DateTime),
            Value::Time(_) => Some(ScalarType::Time),
            Value::Reference(_) | Value::List(_) => None,
        }
    }

    /// Short name of the value's kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Reference(_) => "reference",
            Value::List(_) => "list",
            other => other.scalar_type().map(ScalarType::name).unwrap_or("value"),
        }
    }

    /// Canonical lexical form of a scalar value.
    ///
    /// Dates and times go through the fixed formats of this module; `None`
    /// for references and lists.
    pub fn lexical(&self) -> Option<String> {
        let text = match self {
            Value::String(s) => s.clone(),
            Value::Int(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Float(v) => float_lexical(f64::from(*v)),
            Value::Double(v) => float_lexical(*v),
            Value::Boolean(v) => v.to_string(),
            Value::Date(d) => d.format(DATE_FORMAT).to_string(),
            Value::DateTime(dt) => dt.format(DATE_TIME_FORMAT).to_string(),
            Value::Time(t) => t.format(TIME_FORMAT).to_string(),
            Value::Reference(_) | Value::List(_) => return None,
        };
        Some(text)
    }

    /// Coerce a literal's lexical form into a value of the given scalar type.
    pub fn parse(lexical: &str, target: ScalarType) -> FieldResult<Value> {
        let coercion = || FieldError::Coercion {
            lexical: lexical.to_string(),
            target: target.to_string(),
        };
        let trimmed = lexical.trim();
        let value = match target {
            ScalarType::String => Value::String(lexical.to_string()),
            ScalarType::Int => Value::Int(trimmed.parse().map_err(|_| coercion())?),
            ScalarType::Long => Value::Long(trimmed.parse().map_err(|_| coercion())?),
            ScalarType::Float => Value::Float(parse_float(trimmed).ok_or_else(coercion)? as f32),
            ScalarType::Double => Value::Double(parse_float(trimmed).ok_or_else(coercion)?),
            ScalarType::Boolean => match trimmed {
                "true" | "1" => Value::Boolean(true),
                "false" | "0" => Value::Boolean(false),
                _ => return Err(coercion()),
            },
            ScalarType::Date => Value::Date(
                NaiveDate::parse_from_str(trimmed, DATE_FORMAT).map_err(|_| coercion())?,
            ),
            ScalarType::DateTime => Value::DateTime(
                NaiveDateTime::parse_from_str(trimmed, DATE_TIME_FORMAT)
                    .map_err(|_| coercion())?,
            ),
            ScalarType::Time => Value::Time(
                NaiveTime::parse_from_str(trimmed, TIME_FORMAT).map_err(|_| coercion())?,
            ),
        };
        Ok(value)
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Value::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Convert into a typed field value, naming `field` in the error.
    pub fn extract<T: FromValue>(self, field: &str) -> FieldResult<T> {
        T::from_value(self, field)
    }
}

fn float_lexical(v: f64) -> String {
    if v.is_nan() {
        "NaN".into()
    } else if v.is_infinite() {
        if v > 0.0 { "INF".into() } else { "-INF".into() }
    } else {
        v.to_string()
    }
}

fn parse_float(text: &str) -> Option<f64> {
    match text {
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        other => other.parse().ok(),
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::Reference(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Typed extraction of a [`Value`] inside a setter.
///
/// Numeric conversions widen freely and narrow only when lossless, so a
/// literal typed `xsd:long` can still feed an `i32` field.
pub trait FromValue: Sized {
    fn from_value(value: Value, field: &str) -> FieldResult<Self>;
}

fn mismatch(field: &str, expected: &str, value: &Value) -> FieldError {
    FieldError::TypeMismatch {
        field: field.to_string(),
        expected: expected.to_string(),
        actual: value.kind_name().to_string(),
    }
}

impl FromValue for String {
    fn from_value(value: Value, field: &str) -> FieldResult<Self> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch(field, "string", &other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value, field: &str) -> FieldResult<Self> {
        match value {
            Value::Int(v) => Ok(v),
            Value::Long(v) => i32::try_from(v).map_err(|_| mismatch(field, "int", &value)),
            other => Err(mismatch(field, "int", &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value, field: &str) -> FieldResult<Self> {
        match value {
            Value::Long(v) => Ok(v),
            Value::Int(v) => Ok(i64::from(v)),
            other => Err(mismatch(field, "long", &other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value, field: &str) -> FieldResult<Self> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Double(v) => Ok(v as f32),
            other => Err(mismatch(field, "float", &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value, field: &str) -> FieldResult<Self> {
        match value {
            Value::Double(v) => Ok(v),
            Value::Float(v) => Ok(f64::from(v)),
            Value::Int(v) => Ok(f64::from(v)),
            other => Err(mismatch(field, "double", &other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value, field: &str) -> FieldResult<Self> {
        match value {
            Value::Boolean(v) => Ok(v),
            other => Err(mismatch(field, "boolean", &other)),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value, field: &str) -> FieldResult<Self> {
        match value {
            Value::Date(v) => Ok(v),
            Value::DateTime(v) => Ok(v.date()),
            other => Err(mismatch(field, "date", &other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value, field: &str) -> FieldResult<Self> {
        match value {
            Value::DateTime(v) => Ok(v),
            Value::Date(v) => Ok(v.and_time(NaiveTime::default())),
            other => Err(mismatch(field, "dateTime", &other)),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: Value, field: &str) -> FieldResult<Self> {
        match value {
            Value::Time(v) => Ok(v),
            other => Err(mismatch(field, "time", &other)),
        }
    }
}

impl FromValue for ObjectId {
    fn from_value(value: Value, field: &str) -> FieldResult<Self> {
        match value {
            Value::Reference(id) => Ok(id),
            other => Err(mismatch(field, "reference", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value, field: &str) -> FieldResult<Self> {
        match value {
            Value::List(items) => items
                .into_iter()
                .map(|item| T::from_value(item, field))
                .collect(),
            other => Err(mismatch(field, "list", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_use_fixed_formats() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(Value::Date(date).lexical().unwrap(), "2024-03-09");

        let dt = date.and_hms_opt(7, 5, 0).unwrap();
        assert_eq!(Value::DateTime(dt).lexical().unwrap(), "2024-03-09T07:05:00");
        assert_eq!(
            Value::parse("2024-03-09T07:05:00", ScalarType::DateTime).unwrap(),
            Value::DateTime(dt)
        );
    }

    #[test]
    fn unparsable_literal_is_a_coercion_error() {
        let err = Value::parse("ten", ScalarType::Long).unwrap_err();
        assert!(matches!(err, FieldError::Coercion { .. }));
        assert!(Value::parse("maybe", ScalarType::Boolean).is_err());
    }

    #[test]
    fn boolean_accepts_numeric_lexical_forms() {
        assert_eq!(Value::parse("1", ScalarType::Boolean).unwrap(), Value::Boolean(true));
        assert_eq!(Value::parse("false", ScalarType::Boolean).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn infinite_doubles_use_xsd_spelling() {
        assert_eq!(Value::Double(f64::INFINITY).lexical().unwrap(), "INF");
        assert_eq!(
            Value::parse("-INF", ScalarType::Double).unwrap(),
            Value::Double(f64::NEG_INFINITY)
        );
    }

    #[test]
    fn references_and_lists_have_no_lexical_form() {
        assert!(Value::Reference(ObjectId::new(0)).lexical().is_none());
        assert!(Value::List(vec![]).lexical().is_none());
    }

    #[test]
    fn numeric_extraction_widens_and_narrows_losslessly() {
        let n: i64 = Value::Int(7).extract("count").unwrap();
        assert_eq!(n, 7);
        let n: i32 = Value::Long(42).extract("count").unwrap();
        assert_eq!(n, 42);
        let err = Value::Long(i64::MAX).extract::<i32>("count").unwrap_err();
        assert!(matches!(err, FieldError::TypeMismatch { .. }));
    }

    #[test]
    fn list_extraction_is_element_wise() {
        let ids: Vec<ObjectId> = Value::from(vec![ObjectId::new(1), ObjectId::new(2)])
            .extract("items")
            .unwrap();
        assert_eq!(ids, vec![ObjectId::new(1), ObjectId::new(2)]);
    }
}
