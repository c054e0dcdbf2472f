use serde_json::{json, Map, Value as Json};
use tracing::{info, warn};

use crate::core::errors::ImportError;
use crate::rpc::api::OdooRpc;

/// Handler for res.config.settings and module installation.
pub struct SettingsImporter<'a> {
    rpc: &'a dyn OdooRpc,
}

impl<'a> SettingsImporter<'a> {
    pub fn new(rpc: &'a dyn OdooRpc) -> Self {
        SettingsImporter { rpc }
    }

    /// Create a transient res.config.settings record and execute it.
    /// Values of relational settings are given as external ids and get
    /// swapped for the record id they resolve to.
    pub fn import_settings(
        &self,
        settings: &[(String, Json)],
        lang: &str,
    ) -> Result<(), ImportError> {
        let field_defs = self.rpc.fields_get("res.config.settings")?;
        let mut values = Map::new();
        for (setting, value) in settings {
            let is_relational = field_defs
                .get(setting)
                .and_then(|def| def.get("relation"))
                .map(|rel| !rel.is_null() && rel.as_bool() != Some(false))
                .unwrap_or(false);
            if is_relational {
                let xml_id = value.as_str().unwrap_or_default();
                match self.rpc.ref_lookup(xml_id)? {
                    Some(rec) => {
                        values.insert(setting.clone(), json!(rec.res_id));
                    }
                    None => {
                        return Err(ImportError::Config(format!(
                            "Setting '{}' references unknown external id '{}'",
                            setting, xml_id
                        )))
                    }
                }
            } else {
                values.insert(setting.clone(), value.clone());
            }
        }

        let settings_id = if lang.is_empty() {
            info!("Preparing to set {} settings", values.len());
            self.rpc.create("res.config.settings", Json::Object(values))?
        } else {
            info!(
                "Preparing to set {} settings for language: {}",
                values.len(),
                lang
            );
            self.rpc
                .create_with_lang("res.config.settings", Json::Object(values), lang)?
        };

        info!("Committing {} settings to the server", settings.len());
        self.rpc
            .execute("res.config.settings", "execute", &[settings_id])?;
        Ok(())
    }

    /// Install modules by technical name. Already-installed modules are
    /// skipped silently, unknown names only warn.
    pub fn install_modules(&self, modules: &[String]) -> Result<(), ImportError> {
        self.rpc.execute("ir.module.module", "update_list", &[])?;
        info!("Installing {} modules", modules.len());
        for (index, module) in modules.iter().enumerate() {
            let module_ids = self.rpc.search(
                "ir.module.module",
                json!([["state", "!=", "installed"], ["name", "=", module]]),
            )?;
            if module_ids.is_empty() {
                warn!("Module '{}' is already installed or unknown", module);
                continue;
            }
            info!(
                "Installing module ({}/{}): {}",
                index + 1,
                modules.len(),
                module
            );
            self.rpc
                .execute("ir.module.module", "button_immediate_install", &module_ids)?;
        }
        Ok(())
    }
}
