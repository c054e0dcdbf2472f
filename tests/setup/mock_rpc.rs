use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use serde_json::{json, Value as Json};

use odoo_importer::rpc::api::{OdooRpc, RpcError};
use odoo_importer::S;

/// Hand-written stand-in for the remote session: records every call and
/// replays scripted answers, so tests can assert on behavior and on the
/// exact call sequence.
#[derive(Default)]
pub struct MockRpc {
    /// Every `execute_kw` invocation as `(model, method)`, in order.
    pub calls: RefCell<Vec<(String, String)>>,
    /// Scripted responses for the import action's `do` call, consumed front
    /// to back. When empty, a single created record is reported, which is an
    /// all-clear answer for the one-row tables these tests use.
    pub import_results: RefCell<VecDeque<Json>>,
    /// `(module, name)` pairs reported as already registered in
    /// ir.model.data.
    pub existing_ids: Vec<(String, String)>,
    /// External id -> (model, record id) answers for ref lookups.
    pub refs: HashMap<String, (String, i64)>,
    /// ir.config_parameter key -> value.
    pub params: HashMap<String, String>,
    /// Record ids returned for a plain `search` call, per model.
    pub search_results: HashMap<String, Vec<i64>>,
}

impl MockRpc {
    pub fn new() -> Self {
        MockRpc::default()
    }

    pub fn with_import_results(results: Vec<Json>) -> Self {
        MockRpc {
            import_results: RefCell::new(results.into()),
            ..MockRpc::default()
        }
    }

    pub fn count_calls(&self, model: &str, method: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|(m, meth)| m == model && meth == method)
            .count()
    }

    pub fn call_index(&self, model: &str, method: &str) -> Option<usize> {
        self.calls
            .borrow()
            .iter()
            .position(|(m, meth)| m == model && meth == method)
    }
}

impl OdooRpc for MockRpc {
    fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Json,
        _kwargs: Json,
    ) -> Result<Json, RpcError> {
        self.calls.borrow_mut().push((S!(model), S!(method)));
        match (model, method) {
            ("base_import.import", "create") => Ok(json!(41)),
            ("base_import.import", "do") => Ok(self
                .import_results
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| json!({ "ids": [1], "messages": [] }))),
            ("ir.model.data", "search_read") => Ok(Json::Array(
                self.existing_ids
                    .iter()
                    .map(|(module, name)| json!({ "module": module, "name": name }))
                    .collect(),
            )),
            ("ir.model.data", "check_object_reference") => {
                let module = args[0].as_str().unwrap_or_default();
                let name = args[1].as_str().unwrap_or_default();
                let xml_id = format!("{}.{}", module, name);
                match self.refs.get(&xml_id) {
                    Some((model, res_id)) => Ok(json!([model, res_id])),
                    None => Err(RpcError::Server {
                        message: format!("No record found for {}", xml_id),
                        data: S!(""),
                    }),
                }
            }
            ("ir.config_parameter", "search") => {
                let key = args[0][0][2].as_str().unwrap_or_default();
                if self.params.contains_key(key) {
                    Ok(json!([7]))
                } else {
                    Ok(json!([]))
                }
            }
            ("ir.config_parameter", "read") => {
                let value = self.params.values().next().cloned().unwrap_or_default();
                Ok(json!([{ "id": 7, "value": value }]))
            }
            ("ir.config_parameter", "create") => Ok(json!(8)),
            (_, "search") => Ok(json!(self
                .search_results
                .get(model)
                .cloned()
                .unwrap_or_default())),
            (_, "write") => Ok(json!(true)),
            (_, "create") => Ok(json!(1)),
            (_, "read") => Ok(json!([])),
            (_, "search_read") => Ok(json!([])),
            (_, "fields_get") => Ok(json!({})),
            _ => Ok(json!(true)),
        }
    }
}
