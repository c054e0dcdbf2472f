use std::collections::HashSet;

use itertools::Itertools;
use serde_json::json;
use tracing::{debug, error, info};

use crate::core::chunk::chunk_rows;
use crate::core::columns::{lang_pairs, strip_language_columns};
use crate::core::errors::ImportError;
use crate::core::table::{Table, TableSlice};
use crate::rpc::api::{ImportMessage, ImportOptions, OdooRpc};
use crate::S;

/// What a finished upload did, for callers that want to assert on it.
/// `count_mismatches` counts batches whose returned id list did not match
/// the number of distinct identifiers submitted; the mismatch itself is
/// only logged, it does not fail the upload.
#[derive(Debug, Default)]
pub struct UploadSummary {
    pub batches: usize,
    pub created_ids: Vec<i64>,
    pub count_mismatches: usize,
    pub lang_writes: usize,
}

/// Pushes a table into a remote model through the transient import action.
///
/// Tables need to be in the standard import format of the server. Two
/// column-name conventions are handled on top of that:
/// a `:type:<name>` suffix forces the column's type on read, and a
/// `:lang:<code>` suffix turns the column into translated values written
/// in a separate pass after the primary upload.
pub struct DataImporter<'a> {
    rpc: &'a dyn OdooRpc,
    options: ImportOptions,
}

impl<'a> DataImporter<'a> {
    pub fn new(rpc: &'a dyn OdooRpc) -> Self {
        DataImporter {
            rpc,
            options: ImportOptions::default(),
        }
    }

    /// Upload `table` to `model`, chunked to `max_batch_size` rows
    /// (0 means everything in one request). `source` is only used for
    /// logging and diagnostics. With `skip_existing`, rows whose id is
    /// already registered server-side are dropped before chunking.
    pub fn upload(
        &self,
        table: &Table,
        model: &str,
        max_batch_size: usize,
        source: &str,
        skip_existing: bool,
    ) -> Result<UploadSummary, ImportError> {
        let mut summary = UploadSummary::default();
        let max_batch_size = if max_batch_size > 0 {
            max_batch_size
        } else {
            table.len()
        };

        info!("Starting import from '{}' to '{}'", source, model);
        if table.is_empty() {
            error!("Cannot import {}. No data provided", source);
            return Ok(summary);
        }

        let id_col = table
            .column_index("id")
            .ok_or_else(|| ImportError::Config(format!("'{}' has no 'id' column", source)))?;

        let dupes = duplicated_ids(table, id_col);
        if !dupes.is_empty() {
            error!("Detected duplicate ids in {}. Dupes: {}", source, dupes.join(", "));
            return Err(ImportError::DuplicateIds {
                source: S!(source),
                ids: dupes,
            });
        }

        let table = if skip_existing {
            let filtered = self.strip_existing_records(table, id_col)?;
            if filtered.is_empty() {
                info!("All ids in '{}' already exist on the server", source);
                return Ok(summary);
            }
            filtered
        } else {
            table.clone()
        };

        // Spreadsheet exports sometimes carry unnamed index columns.
        let named: Vec<String> = table
            .columns()
            .iter()
            .filter(|c| !c.starts_with("Unnamed"))
            .cloned()
            .collect();
        let table = table.select_columns(&named);

        let primary = strip_language_columns(&table).drop_empty_rows();
        let chunks = chunk_rows(&primary, max_batch_size)?;
        for (index, chunk) in chunks.iter().enumerate() {
            info!(
                "({}/{}) Importing {} records from '{}' into '{}'",
                index + 1,
                chunks.len(),
                chunk.len(),
                source,
                model
            );
            self.submit(chunk, model, source, index + 1, &mut summary)?;
        }

        self.import_translations(&table, &mut summary)?;
        Ok(summary)
    }

    /// Submit one chunk and block for the structured result. Any response
    /// carrying messages fails the whole upload, as does an empty id list
    /// for a chunk that submitted identifiers; a non-empty id count that
    /// does not match the distinct identifiers submitted is logged only.
    fn submit(
        &self,
        chunk: &TableSlice,
        model: &str,
        source: &str,
        index: usize,
        summary: &mut UploadSummary,
    ) -> Result<(), ImportError> {
        let payload = render_csv(chunk, &self.options)?;
        let file_name = format!("{}-{}", source, index);
        let resp = self
            .rpc
            .load_import(model, chunk.columns(), &payload, &file_name, &self.options)?;

        if !resp.messages.is_empty() {
            return Err(self.handle_upload_errors(&resp.messages, chunk, source, model));
        }

        let id_col = chunk
            .columns()
            .iter()
            .position(|c| c == "id")
            .unwrap_or(0);
        let expect_len = distinct_ids(chunk, id_col);
        // No messages but nothing imported either: still a failure.
        if resp.ids.is_empty() && expect_len > 0 {
            error!(
                "Importing '{}' into '{}' created no records",
                source, model
            );
            return Err(ImportError::UploadRejected {
                source: S!(source),
                model: S!(model),
                diagnostic: S!("The server reported no imported records"),
            });
        }
        if resp.ids.len() != expect_len {
            error!(
                "Expected {} records to be imported, but the server only reports {}",
                expect_len,
                resp.ids.len()
            );
            summary.count_mismatches += 1;
        }
        summary.batches += 1;
        summary.created_ids.extend(resp.ids);
        Ok(())
    }

    /// Map the server's failing row ranges and field names back onto the
    /// submitted chunk and log the resulting sub-table.
    fn handle_upload_errors(
        &self,
        messages: &[ImportMessage],
        chunk: &TableSlice,
        source: &str,
        model: &str,
    ) -> ImportError {
        error!(
            "Import failed with message:\n{}",
            serde_json::to_string_pretty(messages).unwrap_or_else(|_| format!("{:?}", messages))
        );
        let with_rows: Vec<&ImportMessage> =
            messages.iter().filter(|m| m.rows.is_some()).collect();

        let mut affected_rows: Vec<usize> = with_rows
            .iter()
            .flat_map(|m| {
                let rows = m.rows.unwrap();
                rows.from..=rows.to
            })
            .filter(|&row| row < chunk.len())
            .collect();
        affected_rows.sort_unstable();
        affected_rows.dedup();

        let affected_fields: Vec<String> = with_rows
            .iter()
            .filter_map(|m| m.field.clone())
            .chain(std::iter::once(S!("id")))
            .collect();
        // A bare field name may live in the table as its relational
        // variant ("field/id" or "field/name").
        let mut affected_cols: Vec<String> = vec![];
        for col in &affected_fields {
            for candidate in [S!(col), format!("{}/id", col), format!("{}/name", col)] {
                if chunk.columns().contains(&candidate) {
                    affected_cols.push(candidate);
                    break;
                }
            }
        }

        let sub_table = chunk
            .to_table()
            .select_rows(&affected_rows)
            .select_columns(&affected_cols);
        let diagnostic = sub_table.to_string();
        error!("Relevant dataset:\n{}", diagnostic);
        ImportError::UploadRejected {
            source: S!(source),
            model: S!(model),
            diagnostic,
        }
    }

    /// Remove rows whose external id is already registered in
    /// ir.model.data. Blank-id rows follow their preceding identified row.
    fn strip_existing_records(&self, table: &Table, id_col: usize) -> Result<Table, ImportError> {
        let xml_ids: Vec<String> = table
            .rows()
            .map(|row| row[id_col].to_string())
            .filter(|id| !id.trim().is_empty())
            .unique()
            .collect();
        let (modules, names): (Vec<String>, Vec<String>) = xml_ids
            .iter()
            .filter_map(|id| id.split_once('.'))
            .map(|(m, n)| (S!(m), S!(n)))
            .unzip();
        if names.is_empty() {
            return Ok(table.clone());
        }

        let existing = self.rpc.search_read(
            "ir.model.data",
            json!(["&", ["name", "in", names], ["module", "in", modules]]),
            &["name", "module"],
        )?;
        if existing.is_empty() {
            return Ok(table.clone());
        }
        let existing: HashSet<String> = existing
            .iter()
            .map(|rec| {
                format!(
                    "{}.{}",
                    rec.get("module").and_then(|v| v.as_str()).unwrap_or(""),
                    rec.get("name").and_then(|v| v.as_str()).unwrap_or("")
                )
            })
            .collect();
        debug!("Filtering {} already existing ids", existing.len());

        let mut keep = vec![];
        let mut last_id = S!("");
        for (row_idx, row) in table.rows().enumerate() {
            let id = row[id_col].to_string();
            if !id.trim().is_empty() {
                last_id = id;
            }
            if !existing.contains(&last_id) {
                keep.push(row_idx);
            }
        }
        Ok(table.select_rows(&keep))
    }

    /// Apply the table's language columns, one context-language write per
    /// non-empty cell. Failures are logged and the first one is returned
    /// once every write has been attempted.
    fn import_translations(
        &self,
        table: &Table,
        summary: &mut UploadSummary,
    ) -> Result<(), ImportError> {
        let pairs = lang_pairs(table)?;
        if pairs.is_empty() {
            return Ok(());
        }
        info!("Found: {} language columns", pairs.len());
        let mut first_err: Option<ImportError> = None;
        for (index, pair) in pairs.iter().enumerate() {
            info!(
                "({}/{}) Processing language {}, col: {}",
                index + 1,
                pairs.len(),
                pair.lang,
                pair.val_col
            );
            let val_col = table.column_index(&pair.val_col).unwrap();
            let id_col = table.column_index(&pair.id_col).unwrap();
            for row in table.rows() {
                if row[val_col].is_blank() {
                    continue;
                }
                let xml_id = row[id_col].to_string();
                let result = match self.rpc.ref_lookup(&xml_id) {
                    Ok(Some(rec)) => self
                        .rpc
                        .write_with_lang(
                            &rec.model,
                            &[rec.res_id],
                            json!({ &pair.field_name: row[val_col].to_json() }),
                            &pair.lang,
                        )
                        .map_err(ImportError::from),
                    Ok(None) => Err(ImportError::Config(format!(
                        "Unknown external id '{}' for language column '{}'",
                        xml_id, pair.val_col
                    ))),
                    Err(err) => Err(ImportError::from(err)),
                };
                match result {
                    Ok(()) => summary.lang_writes += 1,
                    Err(err) => {
                        error!(
                            "Failed to write translation for '{}' ({}): {}",
                            xml_id, pair.lang, err
                        );
                        first_err.get_or_insert(err);
                    }
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn duplicated_ids(table: &Table, id_col: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut dupes = vec![];
    for row in table.rows() {
        if row[id_col].is_blank() {
            continue;
        }
        let id = row[id_col].to_string();
        if !seen.insert(id.clone()) && !dupes.contains(&id) {
            dupes.push(id);
        }
    }
    dupes
}

fn distinct_ids(chunk: &TableSlice, id_col: usize) -> usize {
    let mut seen = HashSet::new();
    for row in chunk.rows() {
        if !row[id_col].is_blank() {
            seen.insert(row[id_col].to_string());
        }
    }
    seen.len()
}

/// Serialize a chunk back into the CSV form the import action expects.
fn render_csv(chunk: &TableSlice, options: &ImportOptions) -> Result<String, ImportError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.separator as u8)
        .quote(options.quoting as u8)
        .from_writer(vec![]);
    writer
        .write_record(chunk.columns())
        .map_err(|e| ImportError::Config(format!("Could not serialize chunk: {}", e)))?;
    for row in chunk.rows() {
        writer
            .write_record(row.iter().map(|v| v.to_string()))
            .map_err(|e| ImportError::Config(format!("Could not serialize chunk: {}", e)))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ImportError::Config(format!("Could not serialize chunk: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| ImportError::Config(format!("Invalid utf-8 in chunk: {}", e)))
}
