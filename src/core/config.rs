use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::ImportError;
use crate::S;

/// Default file pattern: `NNN_model.name.csv` (or .json), where the model
/// part becomes the import target.
pub const DEFAULT_DATA_REGEX: &str = r"^\d+_(?P<module>[\w.-]+)\.\w+$";

/// A job file, TOML. Every field is optional; CLI flags shadow it and the
/// connection falls back to environment variables.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub connection: ConnectionSection,
    #[serde(default)]
    pub import: ImportSection,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ConnectionSection {
    pub host: Option<String>,
    pub db: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub wait_timeout: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ImportSection {
    pub data_regex: Option<String>,
    pub image_regex: Option<String>,
    pub max_batch_size: Option<usize>,
    #[serde(default)]
    pub skip_existing: bool,
    #[serde(default)]
    pub check_timestamps: bool,
}

/// Parse and validate a job file.
pub fn get_configuration(path: &Path) -> Result<ConfigFile, ImportError> {
    let content = fs::read_to_string(path).map_err(|e| {
        ImportError::Config(format!("Cannot read config '{}': {}", path.display(), e))
    })?;
    let config: ConfigFile = toml::from_str(&content).map_err(|e| {
        ImportError::Config(format!("Invalid config '{}': {}", path.display(), e))
    })?;
    if config.import.max_batch_size == Some(0) {
        return Err(ImportError::Config(S!(
            "import.max_batch_size must be greater than 0"
        )));
    }
    if let Some(regex) = &config.import.data_regex {
        if !regex.contains("(?P<module>") {
            return Err(ImportError::Config(S!(
                "import.data_regex needs a named group 'module'"
            )));
        }
    }
    Ok(config)
}
