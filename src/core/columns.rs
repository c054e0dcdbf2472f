use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::core::errors::ImportError;
use crate::core::table::Table;
use crate::core::value::{ColumnType, Value};
use crate::S;

static TYPE_COL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<col>.*):type:(?P<type>.*)$").unwrap());
static LANG_COL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<col>.*):lang:(?P<lang>.*)$").unwrap());

/// A `fieldname:lang:en_US` column resolved against its identifier column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LangPair {
    pub id_col: String,     // column holding the affected external id
    pub val_col: String,    // column holding the translated value
    pub field_name: String, // remote field path
    pub lang: String,       // context language
}

/// Typed-column directives found in a header: (original name, base name,
/// forced type). Unknown type names are a configuration error here, not at
/// upload time.
pub fn typed_columns(columns: &[String]) -> Result<Vec<(String, String, ColumnType)>, ImportError> {
    let mut out = vec![];
    for col in columns {
        if let Some(caps) = TYPE_COL_REGEX.captures(col) {
            let base = caps.name("col").unwrap().as_str().to_string();
            let type_name = caps.name("type").unwrap().as_str();
            let col_type = ColumnType::from_str(type_name).map_err(|_| {
                ImportError::Config(format!(
                    "Unknown type '{}' in column directive '{}'",
                    type_name, col
                ))
            })?;
            out.push((col.clone(), base, col_type));
        }
    }
    Ok(out)
}

/// Apply `:type:` directives: coerce each marked column, then strip the
/// directive from the column name. Runs before any other table processing.
pub fn apply_type_directives(table: Table) -> Result<Table, ImportError> {
    let directives = typed_columns(table.columns())?;
    if directives.is_empty() {
        return Ok(table);
    }
    debug!("Reading table with specific types for: {:?}", directives);
    let mut table = table;
    for (orig, _, col_type) in &directives {
        let col = table.column_index(orig).unwrap();
        let coerced = table
            .rows()
            .map(|row| row[col].coerce(*col_type))
            .collect::<Result<Vec<Value>, _>>()?;
        table = table.with_column_values(col, coerced)?;
    }
    let renames: Vec<(String, String)> = directives
        .into_iter()
        .map(|(orig, base, _)| (orig, base))
        .collect();
    table.rename_columns(&renames)
}

fn lang_columns(columns: &[String]) -> Vec<(String, String, String)> {
    columns
        .iter()
        .filter_map(|col| {
            LANG_COL_REGEX.captures(col).map(|caps| {
                (
                    col.clone(),
                    caps.name("col").unwrap().as_str().to_string(),
                    caps.name("lang").unwrap().as_str().to_string(),
                )
            })
        })
        .collect()
}

/// Resolve every `:lang:` column of the table into a [`LangPair`].
///
/// A base with path separators is matched against sibling `<prefix>/id`
/// columns by progressively stripping trailing segments; the stripped
/// suffix becomes the remote field path. Without a match (or without
/// separators) the pair falls back to the table's own `id` column.
pub fn lang_pairs(table: &Table) -> Result<Vec<LangPair>, ImportError> {
    let mut pairs = vec![];
    for (col, base, lang) in lang_columns(table.columns()) {
        let (id_col, field_name) = if base.contains('/') {
            let splits: Vec<&str> = base.split('/').collect();
            let mut resolved = None;
            for strip in 1..splits.len() {
                let id_try = format!("{}/id", splits[..splits.len() - strip].join("/"));
                if table.has_column(&id_try) {
                    resolved = Some((id_try, splits[splits.len() - strip..].join(".")));
                    break;
                }
            }
            match resolved {
                Some(found) => found,
                None => (S!("id"), base.replace('/', ".")),
            }
        } else {
            (S!("id"), base)
        };
        if !table.has_column(&id_col) {
            return Err(ImportError::Config(format!(
                "No identifier column '{}' for language column '{}'",
                id_col, col
            )));
        }
        pairs.push(LangPair {
            id_col,
            val_col: col,
            field_name,
            lang,
        });
    }
    Ok(pairs)
}

/// Remove all `:lang:` columns; surviving columns keep their order.
pub fn strip_language_columns(table: &Table) -> Table {
    let lang_cols: Vec<String> = lang_columns(table.columns())
        .into_iter()
        .map(|(col, _, _)| col)
        .collect();
    let keep: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| !lang_cols.contains(c))
        .cloned()
        .collect();
    table.select_columns(&keep)
}
