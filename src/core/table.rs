use std::ops::Range;

use crate::core::errors::ImportError;
use crate::core::value::Value;

/// In-memory table: unique ordered column names, row-major values.
///
/// Tables are built once and never mutated in place; every transformation
/// returns a new `Table` or a borrowed [`TableSlice`] view. The upload
/// pipeline relies on this to keep row offsets meaningful after chunking.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, ImportError> {
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].contains(col) {
                return Err(ImportError::Config(format!(
                    "Duplicate column name '{}'",
                    col
                )));
            }
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(ImportError::Config(format!(
                    "Row {} has {} cells, expected {}",
                    i,
                    row.len(),
                    columns.len()
                )));
            }
        }
        Ok(Table { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, col: usize) -> &Value {
        &self.rows[row][col]
    }

    pub fn rows(&self) -> impl Iterator<Item = &Vec<Value>> {
        self.rows.iter()
    }

    pub fn slice(&self, range: Range<usize>) -> TableSlice<'_> {
        TableSlice {
            table: self,
            start: range.start,
            end: range.end,
        }
    }

    pub fn full_slice(&self) -> TableSlice<'_> {
        self.slice(0..self.len())
    }

    /// New table restricted to the named columns, keeping this table's
    /// column order, not the order of `keep`.
    pub fn select_columns(&self, keep: &[String]) -> Table {
        let indices: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| keep.contains(c))
            .map(|(i, _)| i)
            .collect();
        self.project(&indices)
    }

    /// New table restricted to the given row indices (in the given order).
    pub fn select_rows(&self, rows: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: rows.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Drop rows where every cell is blank.
    pub fn drop_empty_rows(&self) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| row.iter().any(|v| !v.is_blank()))
                .cloned()
                .collect(),
        }
    }

    fn project(&self, indices: &[usize]) -> Table {
        Table {
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    /// Rename columns through `(old, new)` pairs. Names not listed survive
    /// unchanged; order never changes.
    pub fn rename_columns(&self, renames: &[(String, String)]) -> Result<Table, ImportError> {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                renames
                    .iter()
                    .find(|(old, _)| old == c)
                    .map(|(_, new)| new.clone())
                    .unwrap_or_else(|| c.clone())
            })
            .collect();
        Table::new(columns, self.rows.clone())
    }

    /// Replace one column's cells, returning a new table.
    pub fn with_column_values(&self, col: usize, values: Vec<Value>) -> Result<Table, ImportError> {
        if values.len() != self.rows.len() {
            return Err(ImportError::Config(format!(
                "Column replacement has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        let mut rows = self.rows.clone();
        for (row, value) in rows.iter_mut().zip(values) {
            row[col] = value;
        }
        Ok(Table {
            columns: self.columns.clone(),
            rows,
        })
    }
}

impl std::fmt::Display for Table {
    /// Aligned text rendering, used for diagnostic sub-tables in the log.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.len()).collect();
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect();
        for row in &rendered {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.len());
            }
        }
        let line = |f: &mut std::fmt::Formatter<'_>, cells: &[String]| {
            let mut parts = vec![];
            for (i, cell) in cells.iter().enumerate() {
                parts.push(format!("{:<width$}", cell, width = widths[i]));
            }
            writeln!(f, "{}", parts.join("  ").trim_end())
        };
        line(f, &self.columns)?;
        for row in &rendered {
            line(f, row)?;
        }
        Ok(())
    }
}

/// Borrowed contiguous row range of a [`Table`]. `offset` anchors the view
/// in the parent so server row ranges can be mapped back.
#[derive(Debug, Clone, Copy)]
pub struct TableSlice<'a> {
    table: &'a Table,
    start: usize,
    end: usize,
}

impl<'a> TableSlice<'a> {
    pub fn table(&self) -> &'a Table {
        self.table
    }

    pub fn offset(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn columns(&self) -> &'a [String] {
        self.table.columns()
    }

    /// Cell addressed relative to the slice.
    pub fn cell(&self, row: usize, col: usize) -> &'a Value {
        self.table.cell(self.start + row, col)
    }

    pub fn rows(&self) -> impl Iterator<Item = &'a Vec<Value>> {
        self.table.rows[self.start..self.end].iter()
    }

    /// Detach the slice into an owned table.
    pub fn to_table(&self) -> Table {
        Table {
            columns: self.table.columns.clone(),
            rows: self.table.rows[self.start..self.end].to_vec(),
        }
    }
}
