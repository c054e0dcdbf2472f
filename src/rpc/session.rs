use std::thread::sleep;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use url::Url;

use crate::core::errors::ImportError;
use crate::rpc::api::RpcError;
use crate::rpc::jsonrpc::JsonRpcClient;
use crate::utils::ensure_env_var;

/// Where and as whom to log in.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub host: String,
    pub db: String,
    pub user: String,
    pub password: String,
}

impl ConnectionInfo {
    /// Credentials from `ODOO_HOST`, `ODOO_DB`, `ODOO_USER`,
    /// `ODOO_PASSWORD`. A missing variable is a configuration error.
    pub fn from_env() -> Result<Self, ImportError> {
        Ok(ConnectionInfo {
            host: ensure_env_var("ODOO_HOST")?,
            db: ensure_env_var("ODOO_DB")?,
            user: ensure_env_var("ODOO_USER")?,
            password: ensure_env_var("ODOO_PASSWORD")?,
        })
    }
}

/// Parse the host, fix up the port for the scheme, and authenticate.
pub fn login(info: &ConnectionInfo) -> Result<JsonRpcClient, ImportError> {
    let url = Url::parse(&info.host)
        .map_err(|e| ImportError::Config(format!("Unparseable host '{}': {}", info.host, e)))?;
    info!(
        "Connecting to Odoo instance on: {}:{}",
        url.host_str().unwrap_or("?"),
        url.port_or_known_default().unwrap_or(80)
    );
    debug!(
        "Logging into Odoo db={}, user={} password={}",
        info.db,
        info.user,
        "*".repeat(info.password.len())
    );
    let client = JsonRpcClient::authenticate(&url, &info.db, &info.user, &info.password)?;
    Ok(client)
}

/// Poll the server on a fixed one-second interval until login succeeds or
/// `timeout_seconds` elapses. Only connection-class failures are retried;
/// bad credentials abort immediately.
pub fn wait_for_login(
    info: &ConnectionInfo,
    timeout_seconds: u64,
) -> Result<JsonRpcClient, ImportError> {
    let start = Instant::now();
    loop {
        match login(info) {
            Ok(client) => return Ok(client),
            Err(ImportError::Rpc(RpcError::Connection(msg))) => {
                debug!("Server not reachable yet: {}", msg);
                sleep(Duration::from_secs(1));
            }
            Err(err) => return Err(err),
        }
        if start.elapsed() >= Duration::from_secs(timeout_seconds) {
            return Err(ImportError::Timeout(timeout_seconds));
        }
    }
}
