use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};

use crate::constants::{UPLOAD_DATETIME_FORMAT, UPLOAD_DATE_FORMAT};
use crate::core::errors::ImportError;

/// A single table cell. `Empty` is the absence of a value, distinct from an
/// empty string only in origin: both count as blank identifiers.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Str(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Explicit coercion for `:type:` directives. Applied on read, before
    /// anything else looks at the table.
    pub fn coerce(&self, target: ColumnType) -> Result<Value, ImportError> {
        if self.is_blank() {
            return Ok(Value::Empty);
        }
        let fail = |val: &Value| {
            Err(ImportError::Config(format!(
                "Cannot convert value '{}' to {}",
                val, target
            )))
        };
        match target {
            ColumnType::Str => Ok(Value::Str(self.to_string())),
            ColumnType::Int => match self {
                Value::Int(_) => Ok(self.clone()),
                Value::Float(f) if f.fract() == 0.0 => Ok(Value::Int(*f as i64)),
                Value::Bool(b) => Ok(Value::Int(*b as i64)),
                Value::Str(s) => match s.trim().parse::<i64>() {
                    Ok(i) => Ok(Value::Int(i)),
                    Err(_) => fail(self),
                },
                _ => fail(self),
            },
            ColumnType::Float => match self {
                Value::Float(_) => Ok(self.clone()),
                Value::Int(i) => Ok(Value::Float(*i as f64)),
                Value::Str(s) => match s.trim().parse::<f64>() {
                    Ok(f) => Ok(Value::Float(f)),
                    Err(_) => fail(self),
                },
                _ => fail(self),
            },
            ColumnType::Bool => match self {
                Value::Bool(_) => Ok(self.clone()),
                Value::Int(0) => Ok(Value::Bool(false)),
                Value::Int(1) => Ok(Value::Bool(true)),
                Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" => Ok(Value::Bool(true)),
                    "false" | "0" => Ok(Value::Bool(false)),
                    _ => fail(self),
                },
                _ => fail(self),
            },
            ColumnType::Date => match self {
                Value::Date(_) => Ok(self.clone()),
                Value::DateTime(dt) => Ok(Value::Date(dt.date())),
                Value::Str(s) => {
                    let s = s.trim();
                    if let Ok(d) = NaiveDate::parse_from_str(s, UPLOAD_DATE_FORMAT) {
                        return Ok(Value::Date(d));
                    }
                    match NaiveDateTime::parse_from_str(s, UPLOAD_DATETIME_FORMAT) {
                        Ok(dt) => Ok(Value::DateTime(dt)),
                        Err(_) => fail(self),
                    }
                }
                _ => fail(self),
            },
        }
    }
}

impl Value {
    /// JSON form for `write`/`create` payloads. Blank cells become `false`,
    /// the remote convention for "no value".
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Empty => serde_json::Value::Bool(false),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Int(i) => serde_json::json!(i),
            Value::Float(f) => serde_json::json!(f),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Date(_) | Value::DateTime(_) => serde_json::Value::String(self.to_string()),
        }
    }
}

impl fmt::Display for Value {
    /// Upload rendering: this is exactly what ends up in the CSV payload.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Str(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Date(d) => write!(f, "{}", d.format(UPLOAD_DATE_FORMAT)),
            Value::DateTime(dt) => write!(f, "{}", dt.format(UPLOAD_DATETIME_FORMAT)),
        }
    }
}

/// Coercion vocabulary of the `:type:` column directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Str,
    Int,
    Float,
    Bool,
    Date,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Str => "string",
            ColumnType::Int => "integer",
            ColumnType::Float => "float",
            ColumnType::Bool => "boolean",
            ColumnType::Date => "date",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ColumnType {
    type Err = ();

    fn from_str(input: &str) -> Result<ColumnType, Self::Err> {
        match input {
            "str" | "string" => Ok(ColumnType::Str),
            "int" | "integer" => Ok(ColumnType::Int),
            "float" => Ok(ColumnType::Float),
            "bool" | "boolean" => Ok(ColumnType::Bool),
            "date" => Ok(ColumnType::Date),
            _ => Err(()),
        }
    }
}
