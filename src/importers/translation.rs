use serde_json::json;
use tracing::{info, warn};

use crate::core::errors::ImportError;
use crate::core::table::Table;
use crate::rpc::api::OdooRpc;
use crate::S;

/// Writes field translations from a table whose first column is `id` and
/// whose remaining columns are named `lang/field.path` (e.g. `en_US/name`).
pub struct TranslationImporter<'a> {
    rpc: &'a dyn OdooRpc,
}

impl<'a> TranslationImporter<'a> {
    pub fn new(rpc: &'a dyn OdooRpc) -> Self {
        TranslationImporter { rpc }
    }

    pub fn import_translations(&self, table: &Table) -> Result<(), ImportError> {
        let id_col = table
            .column_index("id")
            .ok_or_else(|| ImportError::Config(S!("Translation table has no 'id' column")))?;

        for (index, row) in table.rows().enumerate() {
            info!(
                "Importing translations ({}/{})",
                index + 1,
                table.len()
            );
            let xml_id = row[id_col].to_string();
            let Some(rec) = self.rpc.ref_lookup(&xml_id)? else {
                warn!("Skipping unknown external id '{}'", xml_id);
                continue;
            };
            for (col_idx, col) in table.columns().iter().enumerate() {
                if col_idx == id_col || row[col_idx].is_blank() {
                    continue;
                }
                let Some((lang, field_path)) = col.split_once('/') else {
                    return Err(ImportError::Config(format!(
                        "Translation column '{}' is not in lang/field format",
                        col
                    )));
                };
                let field = field_path.replace('/', ".");
                self.rpc.write_with_lang(
                    &rec.model,
                    &[rec.res_id],
                    json!({ field: row[col_idx].to_json() }),
                    lang,
                )?;
            }
        }
        Ok(())
    }
}
