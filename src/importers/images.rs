use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use regex::Regex;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::core::errors::ImportError;
use crate::rpc::api::{OdooRpc, RpcError};

/// Attaches product images matched by filename to their product records.
pub struct ImageImporter<'a> {
    rpc: &'a dyn OdooRpc,
}

impl<'a> ImageImporter<'a> {
    pub fn new(rpc: &'a dyn OdooRpc) -> Self {
        ImageImporter { rpc }
    }

    /// Recursively collect files whose name matches `pattern`. The pattern
    /// needs a named group `default_code`, matched against the product
    /// reference.
    pub fn search_images_by_regex(
        &self,
        image_path: &Path,
        pattern: &str,
    ) -> Result<Vec<(String, PathBuf)>, ImportError> {
        info!(
            "Searching product images in '{}' regex: '{}'",
            image_path.display(),
            pattern
        );
        let regex = Regex::new(pattern)
            .map_err(|e| ImportError::Config(format!("Invalid image regex: {}", e)))?;
        let mut images = vec![];
        let glob_pattern = format!("{}/**/*", image_path.display());
        let paths = glob::glob(&glob_pattern)
            .map_err(|e| ImportError::Config(format!("Invalid image folder: {}", e)))?;
        for path in paths.flatten() {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(caps) = regex.captures(name) {
                if let Some(code) = caps.name("default_code") {
                    images.push((code.as_str().to_string(), path));
                }
            }
        }
        debug!("Found {} images", images.len());
        Ok(images)
    }

    /// Upload the matched images onto product.product records. Products
    /// that already carry an image keep it unless `overwrite_images`.
    pub fn import_product_images(
        &self,
        images: &[(String, PathBuf)],
        overwrite_images: bool,
    ) -> Result<(), ImportError> {
        if images.is_empty() {
            debug!("Skipping product image import. No images provided");
            return Ok(());
        }

        let codes: Vec<&str> = images.iter().map(|(code, _)| code.as_str()).collect();
        info!("Querying the server with {} product codes", codes.len());
        let mut prod_ids = match self
            .rpc
            .search("product.product", json!([["default_code", "in", codes]]))
        {
            Ok(ids) => ids,
            Err(RpcError::Server { message, .. }) => {
                warn!("Cannot import product images: {}", message);
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        if !overwrite_images {
            let existing = self.rpc.search_read(
                "ir.attachment",
                json!([
                    ["res_field", "=", "image_1920"],
                    ["res_model", "=", "product.template"],
                    ["res_id", "in", prod_ids]
                ]),
                &["res_id"],
            )?;
            debug!(
                "Filtering {} products that already have an image",
                existing.len()
            );
            let with_image: Vec<i64> = existing
                .iter()
                .filter_map(|rec| rec.get("res_id").and_then(|v| v.as_i64()))
                .collect();
            prod_ids.retain(|id| !with_image.contains(id));
        }
        if prod_ids.is_empty() {
            return Ok(());
        }

        info!("Getting {} products from the server", prod_ids.len());
        for (index, prod_id) in prod_ids.iter().enumerate() {
            let recs = self.rpc.read("product.product", &[*prod_id], &["default_code"])?;
            let Some(code) = recs
                .first()
                .and_then(|rec| rec.get("default_code"))
                .and_then(|v| v.as_str())
            else {
                continue;
            };
            debug!("Searching images for {}", code);
            let Some((_, file)) = images.iter().find(|(c, _)| c == code) else {
                continue;
            };
            info!(
                "({}/{}) Setting product image for '{}' --> '{}'",
                index + 1,
                prod_ids.len(),
                code,
                file.display()
            );
            let bytes = fs::read(file)
                .map_err(|e| ImportError::Config(format!("Cannot read '{}': {}", file.display(), e)))?;
            let img_b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
            self.rpc
                .write("product.product", &[*prod_id], json!({ "image_1920": img_b64 }))?;
        }
        Ok(())
    }
}
