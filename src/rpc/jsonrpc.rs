use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{json, Value as Json};
use tracing::{debug, trace};
use url::Url;

use crate::rpc::api::{OdooRpc, RpcError};
use crate::S;

const RPC_TIMEOUT: Duration = Duration::from_secs(300);

/// Blocking JSON-RPC client for the server's `/jsonrpc` endpoint.
///
/// Holds the authenticated uid and reuses it for every `object.execute_kw`
/// call. One instance maps to one remote session; there is no pooling and
/// no concurrency, calls are strictly sequential.
pub struct JsonRpcClient {
    http: reqwest::blocking::Client,
    endpoint: Url,
    db: String,
    password: String,
    uid: i64,
    call_id: AtomicU64,
}

impl JsonRpcClient {
    /// Authenticate against `common.authenticate` and return a ready
    /// session.
    pub fn authenticate(
        base_url: &Url,
        db: &str,
        user: &str,
        password: &str,
    ) -> Result<Self, RpcError> {
        let endpoint = base_url
            .join("/jsonrpc")
            .map_err(|e| RpcError::Connection(e.to_string()))?;
        let http = reqwest::blocking::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .map_err(|e| RpcError::Connection(e.to_string()))?;
        let client = JsonRpcClient {
            http,
            endpoint,
            db: S!(db),
            password: S!(password),
            uid: 0,
            call_id: AtomicU64::new(1),
        };
        let uid = client.call("common", "authenticate", json!([db, user, password, {}]))?;
        match uid.as_i64() {
            Some(uid) if uid > 0 => Ok(JsonRpcClient { uid, ..client }),
            _ => Err(RpcError::Auth(format!(
                "Server refused credentials for user '{}' on db '{}'",
                user, db
            ))),
        }
    }

    fn call(&self, service: &str, method: &str, args: Json) -> Result<Json, RpcError> {
        let id = self.call_id.fetch_add(1, Ordering::Relaxed);
        trace!("jsonrpc call {}: {}.{}", id, service, method);
        let body = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": {
                "service": service,
                "method": method,
                "args": args,
            },
            "id": id,
        });
        let resp = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .map_err(|e| RpcError::Connection(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RpcError::Connection(format!(
                "HTTP {} from {}",
                status, self.endpoint
            )));
        }
        let envelope: Json = resp
            .json()
            .map_err(|e| RpcError::Connection(e.to_string()))?;
        if let Some(error) = envelope.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string();
            let data = error
                .get("data")
                .map(|d| d.to_string())
                .unwrap_or_default();
            debug!("jsonrpc call {} failed: {}", id, message);
            return Err(RpcError::Server { message, data });
        }
        Ok(envelope.get("result").cloned().unwrap_or(Json::Null))
    }
}

impl OdooRpc for JsonRpcClient {
    fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Json,
        kwargs: Json,
    ) -> Result<Json, RpcError> {
        self.call(
            "object",
            "execute_kw",
            json!([self.db, self.uid, self.password, model, method, args, kwargs]),
        )
    }
}
