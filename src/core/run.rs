use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use itertools::Itertools;
use regex::Regex;
use serde_json::json;
use tracing::{debug, error, info};

use crate::constants::IMPORT_CACHE_PARAM;
use crate::core::dataset::Dataset;
use crate::core::errors::ImportError;
use crate::core::table::Table;
use crate::importers::data::DataImporter;
use crate::importers::images::ImageImporter;
use crate::importers::settings::SettingsImporter;
use crate::importers::translation::TranslationImporter;
use crate::rpc::api::OdooRpc;
use crate::S;

const CACHE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Caller-selected behavior of a run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub max_batch_size: usize,
    pub skip_existing: bool,
    pub check_timestamps: bool,
}

/// Collect datasets under `datafolder` whose file name matches
/// `pattern` (named group `module`), ordered by their sort keys.
pub fn gather_import_files(
    datafolder: &Path,
    pattern: &Regex,
) -> Result<Vec<Dataset>, ImportError> {
    let glob_pattern = format!("{}/**/*", datafolder.display());
    let paths = glob::glob(&glob_pattern)
        .map_err(|e| ImportError::Config(format!("Invalid data folder: {}", e)))?;
    let mut datasets = vec![];
    for path in paths.flatten() {
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(caps) = pattern.captures(name) {
            if let Some(module) = caps.name("module") {
                datasets.push(Dataset::new(path.clone(), S!(module.as_str())));
            }
        }
    }
    datasets.sort_by_key(|d| d.sort_key(datafolder));
    Ok(datasets)
}

/// Import every matching file under `read_path` (or the single file it
/// points to), then attach product images when an image regex is given.
///
/// A failing dataset aborts only itself; the remaining datasets still run
/// and the first failure is returned at the end.
pub fn run_import(
    rpc: &dyn OdooRpc,
    read_path: &Path,
    data_regex: &str,
    image_regex: Option<&str>,
    options: RunOptions,
) -> Result<(), ImportError> {
    let pattern = Regex::new(data_regex)
        .map_err(|e| ImportError::Config(format!("Invalid data regex: {}", e)))?;

    let import_files = if read_path.is_dir() {
        gather_import_files(read_path, &pattern)?
    } else {
        let name = read_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        match pattern.captures(name).and_then(|caps| caps.name("module")) {
            Some(module) => vec![Dataset::new(read_path.to_path_buf(), S!(module.as_str()))],
            None => {
                return Err(ImportError::Config(format!("Couldn't parse: {}", name)));
            }
        }
    };
    info!("Collected: {} files", import_files.len());

    let mut first_err: Option<ImportError> = None;
    let relative_folder = if read_path.is_dir() {
        read_path
    } else {
        read_path.parent().unwrap_or(read_path)
    };
    for (index, dataset) in import_files.iter().enumerate() {
        info!(
            "Processing dataset ({}/{}) --> {}",
            index + 1,
            import_files.len(),
            dataset.reference
        );
        let result = if options.check_timestamps {
            import_dataset_timestamped(rpc, dataset, relative_folder, options)
        } else {
            import_dataset(rpc, dataset, options)
        };
        if let Err(err) = result {
            error!("Dataset '{}' failed: {}", dataset.reference, err);
            first_err.get_or_insert(err);
        }
    }

    if let Some(pattern) = image_regex {
        let importer = ImageImporter::new(rpc);
        let images = importer.search_images_by_regex(&read_path.join("img"), pattern)?;
        importer.import_product_images(&images, !options.skip_existing)?;
    }

    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Dispatch one dataset on its reference.
///
/// Special references:
///   odoo-modules: install every module named in column "Name"
///   odoo-settings: set res.config.settings from columns "Setting"/"Value",
///     optionally per-language via column "Language"
///   odoo-translate: write field translations (columns lang/fieldname)
///   odoo-archive / odoo-unarchive: toggle records listed in column "id"
/// Anything else is a model name for the data importer.
pub fn import_dataset(
    rpc: &dyn OdooRpc,
    dataset: &Dataset,
    options: RunOptions,
) -> Result<(), ImportError> {
    let file_name = dataset
        .file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    match dataset.reference.as_str() {
        "odoo-modules" => {
            info!("Installing modules from '{}'", file_name);
            let table = dataset.read_table()?;
            let modules = unique_column_values(&table, "Name")?;
            SettingsImporter::new(rpc).install_modules(&modules)
        }
        "odoo-settings" => {
            info!("Importing settings from '{}'", file_name);
            import_settings_table(rpc, &dataset.read_table()?)
        }
        "odoo-translate" => {
            info!("Importing translations from '{}'", file_name);
            TranslationImporter::new(rpc).import_translations(&dataset.read_table()?)
        }
        "odoo-archive" => toggle_active(rpc, dataset, &file_name, false),
        "odoo-unarchive" => toggle_active(rpc, dataset, &file_name, true),
        model => {
            info!("Importing '{}' into model '{}'", file_name, model);
            DataImporter::new(rpc)
                .upload(
                    &dataset.read_table()?,
                    model,
                    options.max_batch_size,
                    &file_name,
                    options.skip_existing,
                )
                .map(|_| ())
        }
    }
}

/// Settings rows grouped per language, preserving first appearance order.
fn import_settings_table(rpc: &dyn OdooRpc, table: &Table) -> Result<(), ImportError> {
    let setting_col = required_column(table, "Setting")?;
    let value_col = required_column(table, "Value")?;
    let lang_col = table.column_index("Language");

    let mut groups: Vec<(String, Vec<(String, serde_json::Value)>)> = vec![];
    for row in table.rows() {
        let lang = lang_col
            .map(|c| row[c].to_string())
            .unwrap_or_default();
        let entry = (row[setting_col].to_string(), row[value_col].to_json());
        match groups.iter_mut().find(|(l, _)| *l == lang) {
            Some((_, settings)) => settings.push(entry),
            None => groups.push((lang, vec![entry])),
        }
    }
    let importer = SettingsImporter::new(rpc);
    for (lang, settings) in &groups {
        importer.import_settings(settings, lang)?;
    }
    Ok(())
}

fn toggle_active(
    rpc: &dyn OdooRpc,
    dataset: &Dataset,
    file_name: &str,
    activate: bool,
) -> Result<(), ImportError> {
    let table = dataset.read_table()?;
    let xml_ids = unique_column_values(&table, "id")?;
    info!(
        "{} {} items from '{}'",
        if activate { "Unarchiving" } else { "Archiving" },
        xml_ids.len(),
        file_name
    );
    for xml_id in &xml_ids {
        let Some(rec) = rpc.ref_lookup(xml_id)? else {
            error!("Unknown external id '{}'", xml_id);
            continue;
        };
        let active = rpc
            .read(&rec.model, &[rec.res_id], &["active"])?
            .first()
            .and_then(|r| r.get("active"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if activate && !active {
            debug!("Unarchiving '{}'", xml_id);
            rpc.execute(&rec.model, "action_unarchive", &[rec.res_id])?;
        } else if !activate && active {
            debug!("Archiving '{}'", xml_id);
            rpc.execute(&rec.model, "action_archive", &[rec.res_id])?;
        }
    }
    Ok(())
}

/// Wrap [`import_dataset`] with the remote timestamp cache: skip the file
/// when its modification time is not newer than the cached entry, record
/// the new timestamp after a successful import.
pub fn import_dataset_timestamped(
    rpc: &dyn OdooRpc,
    dataset: &Dataset,
    relative_folder: &Path,
    options: RunOptions,
) -> Result<(), ImportError> {
    let import_ref = dataset
        .file
        .strip_prefix(relative_folder)
        .unwrap_or(&dataset.file)
        .to_string_lossy()
        .to_string();
    let change_date_fs = file_mtime(&dataset.file)?;

    let param_ids = rpc.search(
        "ir.config_parameter",
        json!([["key", "=", IMPORT_CACHE_PARAM]]),
    )?;
    let mut change_dict: HashMap<String, String> = match param_ids.first() {
        Some(&id) => {
            let value = rpc
                .read("ir.config_parameter", &[id], &["value"])?
                .first()
                .and_then(|r| r.get("value"))
                .and_then(|v| v.as_str())
                .map(String::from)
                .unwrap_or_default();
            serde_json::from_str(&value).unwrap_or_default()
        }
        None => HashMap::new(),
    };

    if let Some(entry) = change_dict.get(&import_ref) {
        if let Ok(cached) = NaiveDateTime::parse_from_str(entry, CACHE_TIME_FORMAT) {
            if change_date_fs <= cached {
                debug!(
                    "Skipping import file because of remote timestamp: {}",
                    dataset.file.display()
                );
                return Ok(());
            }
        }
    }

    import_dataset(rpc, dataset, options)?;
    change_dict.insert(
        import_ref,
        change_date_fs.format(CACHE_TIME_FORMAT).to_string(),
    );
    let value = serde_json::to_string(&change_dict)
        .map_err(|e| ImportError::Config(format!("Cannot serialize timestamp cache: {}", e)))?;
    match param_ids.first() {
        Some(&id) => rpc.write("ir.config_parameter", &[id], json!({ "value": value }))?,
        None => {
            rpc.create(
                "ir.config_parameter",
                json!({ "key": IMPORT_CACHE_PARAM, "value": value }),
            )?;
        }
    }
    Ok(())
}

fn file_mtime(path: &Path) -> Result<NaiveDateTime, ImportError> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| ImportError::Config(format!("Cannot stat '{}': {}", path.display(), e)))?;
    Ok(DateTime::<Utc>::from(modified).naive_utc())
}

fn required_column(table: &Table, name: &str) -> Result<usize, ImportError> {
    table
        .column_index(name)
        .ok_or_else(|| ImportError::Config(format!("Table has no '{}' column", name)))
}

fn unique_column_values(table: &Table, name: &str) -> Result<Vec<String>, ImportError> {
    let col = required_column(table, name)?;
    Ok(table
        .rows()
        .map(|row| row[col].to_string())
        .filter(|v| !v.trim().is_empty())
        .unique()
        .collect())
}
