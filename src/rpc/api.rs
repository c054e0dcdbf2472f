use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};

use crate::constants::{UPLOAD_DATETIME_FORMAT, UPLOAD_DATE_FORMAT};
use crate::S;

/// Transport/protocol failures of the remote session.
///
/// `Connection` covers the cases worth retrying during connection
/// bootstrap; everything the server itself complains about is `Server`.
#[derive(Debug)]
pub enum RpcError {
    Connection(String),
    Auth(String),
    Server { message: String, data: String },
    Serialization(serde_json::Error),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::Connection(msg) => write!(f, "Connection failed: {}", msg),
            RpcError::Auth(msg) => write!(f, "Authentication failed: {}", msg),
            RpcError::Server { message, .. } => write!(f, "Server error: {}", message),
            RpcError::Serialization(err) => write!(f, "Unexpected response shape: {}", err),
        }
    }
}

impl Error for RpcError {}

impl From<serde_json::Error> for RpcError {
    fn from(error: serde_json::Error) -> Self {
        RpcError::Serialization(error)
    }
}

/// Inclusive row range reported by the import action, relative to the
/// submitted chunk.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct RowRange {
    pub from: usize,
    pub to: usize,
}

/// One structured validation message from the import action.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportMessage {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub rows: Option<RowRange>,
    #[serde(default)]
    pub message: String,
}

/// Result of one chunk submission: created/matched record ids on success,
/// structured messages otherwise.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportResponse {
    #[serde(default)]
    pub ids: Vec<i64>,
    #[serde(default)]
    pub messages: Vec<ImportMessage>,
}

/// Serialization parameters handed to the server's import action.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub separator: char,
    pub quoting: char,
    pub date_format: String,
    pub datetime_format: String,
    pub encoding: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            separator: ',',
            quoting: '"',
            date_format: S!(UPLOAD_DATE_FORMAT),
            datetime_format: S!(UPLOAD_DATETIME_FORMAT),
            encoding: S!("utf-8"),
        }
    }
}

/// A record resolved from an external id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    pub model: String,
    pub res_id: i64,
}

/// The remote application session, as seen by the importers.
///
/// `execute_kw` is the single required primitive; everything else is a
/// typed convenience wrapper with a default implementation on top of it.
/// Injected everywhere by reference so tests can substitute a recording
/// mock for the JSON-RPC client.
pub trait OdooRpc {
    fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Json,
        kwargs: Json,
    ) -> Result<Json, RpcError>;

    fn search(&self, model: &str, domain: Json) -> Result<Vec<i64>, RpcError> {
        let resp = self.execute_kw(model, "search", json!([domain]), json!({}))?;
        Ok(serde_json::from_value(resp)?)
    }

    fn search_read(
        &self,
        model: &str,
        domain: Json,
        fields: &[&str],
    ) -> Result<Vec<Map<String, Json>>, RpcError> {
        let resp = self.execute_kw(
            model,
            "search_read",
            json!([domain]),
            json!({ "fields": fields }),
        )?;
        Ok(serde_json::from_value(resp)?)
    }

    fn read(
        &self,
        model: &str,
        ids: &[i64],
        fields: &[&str],
    ) -> Result<Vec<Map<String, Json>>, RpcError> {
        let resp = self.execute_kw(model, "read", json!([ids]), json!({ "fields": fields }))?;
        Ok(serde_json::from_value(resp)?)
    }

    fn create(&self, model: &str, values: Json) -> Result<i64, RpcError> {
        let resp = self.execute_kw(model, "create", json!([values]), json!({}))?;
        // create returns either the id or a singleton list of ids
        match resp {
            Json::Array(ids) => match ids.first() {
                Some(first) => Ok(serde_json::from_value(first.clone())?),
                None => Err(RpcError::Server {
                    message: S!("create returned no id"),
                    data: S!(""),
                }),
            },
            other => Ok(serde_json::from_value(other)?),
        }
    }

    fn create_with_lang(&self, model: &str, values: Json, lang: &str) -> Result<i64, RpcError> {
        let resp = self.execute_kw(
            model,
            "create",
            json!([values]),
            json!({ "context": { "lang": lang } }),
        )?;
        match resp {
            Json::Array(ids) => match ids.first() {
                Some(first) => Ok(serde_json::from_value(first.clone())?),
                None => Err(RpcError::Server {
                    message: S!("create returned no id"),
                    data: S!(""),
                }),
            },
            other => Ok(serde_json::from_value(other)?),
        }
    }

    fn write(&self, model: &str, ids: &[i64], values: Json) -> Result<(), RpcError> {
        self.execute_kw(model, "write", json!([ids, values]), json!({}))?;
        Ok(())
    }

    /// Write with a language context: the translated-value counterpart of
    /// `write`.
    fn write_with_lang(
        &self,
        model: &str,
        ids: &[i64],
        values: Json,
        lang: &str,
    ) -> Result<(), RpcError> {
        self.execute_kw(
            model,
            "write",
            json!([ids, values]),
            json!({ "context": { "lang": lang } }),
        )?;
        Ok(())
    }

    /// Call an arbitrary method on a set of records.
    fn execute(&self, model: &str, method: &str, ids: &[i64]) -> Result<Json, RpcError> {
        self.execute_kw(model, method, json!([ids]), json!({}))
    }

    fn fields_get(&self, model: &str) -> Result<Map<String, Json>, RpcError> {
        let resp = self.execute_kw(
            model,
            "fields_get",
            json!([]),
            json!({ "attributes": ["type", "relation"] }),
        )?;
        Ok(serde_json::from_value(resp)?)
    }

    /// Resolve an external id (`module.name`) to its model and record id.
    fn ref_lookup(&self, xml_id: &str) -> Result<Option<RecordRef>, RpcError> {
        let (module, name) = xml_id.split_once('.').unwrap_or(("", xml_id));
        let resp = self.execute_kw(
            "ir.model.data",
            "check_object_reference",
            json!([module, name]),
            json!({}),
        );
        match resp {
            Ok(Json::Array(pair)) if pair.len() == 2 => Ok(Some(RecordRef {
                model: serde_json::from_value(pair[0].clone())?,
                res_id: serde_json::from_value(pair[1].clone())?,
            })),
            Ok(_) => Ok(None),
            Err(RpcError::Server { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// The dedicated transient import action: submit one serialized chunk
    /// and block for the structured per-row-range result.
    fn load_import(
        &self,
        model: &str,
        headers: &[String],
        payload: &str,
        file_name: &str,
        options: &ImportOptions,
    ) -> Result<ImportResponse, RpcError> {
        let import_id = self.create(
            "base_import.import",
            json!({
                "res_model": model,
                "file": payload,
                "file_type": "text/csv",
                "file_name": file_name,
            }),
        )?;
        let resp = self.execute_kw(
            "base_import.import",
            "do",
            json!([[import_id], headers, headers, {
                "headers": true,
                "advanced": true,
                "keep_matches": false,
                "date_format": options.date_format,
                "datetime_format": options.datetime_format,
                "encoding": options.encoding,
                "separator": options.separator.to_string(),
                "quoting": options.quoting.to_string(),
                "float_thousand_separator": ",",
                "float_decimal_separator": ".",
            }]),
            json!({}),
        )?;
        Ok(serde_json::from_value(resp)?)
    }
}
