use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde_json::Value as Json;
use tracing::debug;

use crate::core::columns::{apply_type_directives, typed_columns};
use crate::core::errors::ImportError;
use crate::core::table::Table;
use crate::core::value::Value;
use crate::S;

/// CSV dialect guessed from the first line of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
    pub decimal: char,
}

/// Pick the candidate delimiter occurring most often in the first line.
/// A `;` dialect implies a `,` decimal separator.
pub fn sniff_dialect(first_line: &str) -> Dialect {
    let delimiter = [b';', b',', b'\t', b'|']
        .into_iter()
        .max_by_key(|&d| first_line.bytes().filter(|&b| b == d).count())
        .filter(|&d| first_line.bytes().any(|b| b == d))
        .unwrap_or(b',');
    Dialect {
        delimiter,
        decimal: if delimiter == b';' { ',' } else { '.' },
    }
}

/// Read a CSV file into a table: sniff the dialect, apply `:type:` column
/// directives, infer value types for the remaining columns.
pub fn read_csv(path: &Path) -> Result<Table, ImportError> {
    let content = fs::read_to_string(path)
        .map_err(|e| ImportError::Config(format!("File not found: {}: {}", path.display(), e)))?;
    let dialect = sniff_dialect(content.lines().next().unwrap_or(""));
    debug!(
        "Sniffed dialect with delim: '{}' from {}",
        dialect.delimiter as char,
        path.display()
    );

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(dialect.delimiter)
        .from_reader(content.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ImportError::Config(format!("Bad CSV header in {}: {}", path.display(), e)))?
        .iter()
        .map(String::from)
        .collect();
    let mut rows = vec![];
    for record in reader.records() {
        let record = record
            .map_err(|e| ImportError::Config(format!("Bad CSV row in {}: {}", path.display(), e)))?;
        rows.push(
            record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        Value::Empty
                    } else {
                        Value::Str(S!(cell))
                    }
                })
                .collect(),
        );
    }

    // Typed columns coerce from the raw string so no inference gets in the
    // way; only the rest goes through type guessing.
    let typed: HashSet<String> = typed_columns(&headers)?
        .into_iter()
        .map(|(_, base, _)| base)
        .collect();
    let table = apply_type_directives(Table::new(headers, rows)?)?;
    infer_untyped_columns(table, &typed, dialect.decimal)
}

/// Read a JSON file into a table. Accepts a plain array of objects or a
/// document with a `data` array of objects; column order follows the first
/// record.
pub fn read_json(path: &Path) -> Result<Table, ImportError> {
    let content = fs::read_to_string(path)
        .map_err(|e| ImportError::Config(format!("File not found: {}: {}", path.display(), e)))?;
    let doc: Json = serde_json::from_str(&content)
        .map_err(|e| ImportError::Config(format!("Bad JSON in {}: {}", path.display(), e)))?;
    let records = match &doc {
        Json::Array(records) => records.as_slice(),
        Json::Object(obj) => match obj.get("data").and_then(|d| d.as_array()) {
            Some(records) => records.as_slice(),
            None => {
                return Err(ImportError::Config(format!(
                    "JSON table {} has no 'data' array",
                    path.display()
                )))
            }
        },
        _ => {
            return Err(ImportError::Config(format!(
                "JSON table {} is not an array of records",
                path.display()
            )))
        }
    };

    let mut columns: Vec<String> = vec![];
    for record in records {
        if let Json::Object(obj) = record {
            for key in obj.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|col| json_cell(record.get(col).unwrap_or(&Json::Null)))
                .collect()
        })
        .collect();
    apply_type_directives(Table::new(columns, rows)?)
}

fn json_cell(value: &Json) -> Value {
    match value {
        Json::Null => Value::Empty,
        Json::Bool(b) => Value::Bool(*b),
        Json::String(s) if s.is_empty() => Value::Empty,
        Json::String(s) => Value::Str(s.clone()),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        other => Value::Str(other.to_string()),
    }
}

fn infer_untyped_columns(
    table: Table,
    typed: &HashSet<String>,
    decimal: char,
) -> Result<Table, ImportError> {
    let mut table = table;
    let columns: Vec<String> = table.columns().to_vec();
    for (col_idx, col) in columns.iter().enumerate() {
        if typed.contains(col) {
            continue;
        }
        let inferred: Vec<Value> = table
            .rows()
            .map(|row| match &row[col_idx] {
                Value::Str(s) => infer_value(s, decimal),
                other => other.clone(),
            })
            .collect();
        table = table.with_column_values(col_idx, inferred)?;
    }
    Ok(table)
}

fn infer_value(raw: &str, decimal: char) -> Value {
    let trimmed = raw.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Int(i);
    }
    let candidate = trimmed.replace(decimal, ".");
    if candidate.parse::<f64>().is_ok() && trimmed.chars().any(|c| c.is_ascii_digit()) {
        if let Ok(f) = candidate.parse::<f64>() {
            return Value::Float(f);
        }
    }
    match trimmed {
        "True" | "true" => Value::Bool(true),
        "False" | "false" => Value::Bool(false),
        _ => Value::Str(S!(raw)),
    }
}
