use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::core::errors::ImportError;
use crate::core::read::{read_csv, read_json};
use crate::core::table::Table;
use crate::S;

/// Folders prefixed `NNN_` take part in the import ordering.
static FOLDER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)_.*").unwrap());

/// Binds a source file to the remote model (or special reference) it
/// imports into.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub file: PathBuf,
    pub reference: String,
}

impl Dataset {
    pub fn new(file: PathBuf, reference: String) -> Self {
        Dataset { file, reference }
    }

    /// Load the file into a table, picking the reader by extension.
    pub fn read_table(&self) -> Result<Table, ImportError> {
        info!("Reading dataset {}", self.file.display());
        match self.file.extension().and_then(|e| e.to_str()) {
            Some("csv") => read_csv(&self.file),
            Some("json") => read_json(&self.file),
            other => Err(ImportError::Config(format!(
                "No load handler implemented for filetype {:?} ({})",
                other.unwrap_or(""),
                self.file.display()
            ))),
        }
    }

    /// Sortable key built from the file name and every `NNN_`-prefixed
    /// ancestor folder up to `max_up_folder`, outermost first.
    pub fn sort_key(&self, max_up_folder: &Path) -> String {
        let mut sort_list = vec![self
            .file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()];
        for parent in self.file.ancestors().skip(1) {
            if parent == max_up_folder {
                break;
            }
            if let Some(name) = parent.file_name().and_then(|n| n.to_str()) {
                if FOLDER_REGEX.is_match(name) {
                    sort_list.push(S!(name));
                }
            }
        }
        sort_list.reverse();
        sort_list.join("/")
    }
}
