pub const TOOL_NAME: &str = "odoo_importer";

/// Max rows sent to the server in one import request, unless overridden.
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Key of the ir.config_parameter holding the import timestamp cache.
pub const IMPORT_CACHE_PARAM: &str = "godoo_rpc_import_cache";

/// Date/datetime rendering for upload payloads and import options.
pub const UPLOAD_DATE_FORMAT: &str = "%Y-%m-%d";
pub const UPLOAD_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Seconds to keep polling the server during connection bootstrap.
pub const DEFAULT_LOGIN_TIMEOUT: u64 = 600;
