use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value as Json};
use tracing::info;

use crate::core::errors::ImportError;
use crate::rpc::api::OdooRpc;
use crate::S;

static DOMAIN_TEMPLATE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%\((?P<key>.*)\)s$").unwrap());

/// How one field travels from the source instance to the target instance.
/// Resolved when the transfer is configured, never guessed at runtime.
#[derive(Debug, Clone)]
pub enum FieldMapper {
    /// Take the source value as is.
    Copy,
    /// Ignore the source value, always write this one.
    Fixed(Json),
    /// Translate relational ids through an explicit source->target map.
    Lookup(HashMap<i64, i64>),
    /// Copy an HTML field, substituting the empty-paragraph placeholder
    /// when the source is empty.
    Html,
}

/// Transfer records of `model` from one instance to another, matching
/// existing target records through a templated domain. Returns the
/// source-id to target-id map, usable as a [`FieldMapper::Lookup`] for
/// dependent models.
pub fn transfer_records(
    source: &dyn OdooRpc,
    target: &dyn OdooRpc,
    model: &str,
    keep_fields: &[(String, FieldMapper)],
    match_domain: &Json,
    source_domain: Option<&Json>,
    ignore_map_errs: bool,
) -> Result<HashMap<i64, i64>, ImportError> {
    let domain = source_domain.cloned().unwrap_or_else(|| json!([]));
    let source_ids = source.search(model, domain)?;
    let fields: Vec<&str> = keep_fields.iter().map(|(f, _)| f.as_str()).collect();

    let mut mapper = HashMap::new();
    for (index, src_id) in source_ids.iter().enumerate() {
        let records = source.read(model, &[*src_id], &fields)?;
        let Some(record) = records.into_iter().next() else {
            continue;
        };

        let equality_domain = format_domain(source, model, match_domain, &record, keep_fields)?;
        let mut target_ids = target.search(model, equality_domain)?;
        if target_ids.is_empty() {
            let values = map_record_values(&record, keep_fields, ignore_map_errs)?;
            let label = values
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let created = target.create(model, Json::Object(values))?;
            info!(
                "{}/{} Created: {}",
                index + 1,
                source_ids.len(),
                if label.is_empty() {
                    src_id.to_string()
                } else {
                    label
                }
            );
            target_ids.push(created);
        }
        mapper.insert(*src_id, target_ids[0]);
    }
    Ok(mapper)
}

/// Build the target-side write values from a source record, running every
/// field through its mapper.
pub fn map_record_values(
    record: &Map<String, Json>,
    keep_fields: &[(String, FieldMapper)],
    ignore_map_errs: bool,
) -> Result<Map<String, Json>, ImportError> {
    let mut values = Map::new();
    for (field, mapper) in keep_fields {
        let raw = record.get(field).cloned().unwrap_or(Json::Null);
        match map_record_value(&raw, mapper) {
            Ok(mapped) => {
                values.insert(field.clone(), mapped);
            }
            Err(_) if ignore_map_errs => continue,
            Err(err) => {
                return Err(ImportError::Config(format!(
                    "Couldn't map field '{}': {}",
                    field, err
                )))
            }
        }
    }
    Ok(values)
}

/// Apply one mapper to one raw value. Relational reads come back as
/// `[id, display_name]` pairs; only the id matters here.
pub fn map_record_value(value: &Json, mapper: &FieldMapper) -> Result<Json, ImportError> {
    let value = unwrap_relational(value);
    match mapper {
        FieldMapper::Copy => Ok(value),
        FieldMapper::Fixed(fixed) => Ok(fixed.clone()),
        FieldMapper::Html => {
            let empty = value.is_null()
                || value == Json::Bool(false)
                || value.as_str().map(|s| s.is_empty()).unwrap_or(false);
            if empty {
                Ok(json!("<p><br></p>"))
            } else {
                Ok(value)
            }
        }
        FieldMapper::Lookup(map) => match &value {
            Json::Number(n) => {
                let id = n.as_i64().ok_or_else(|| missing_key(&value))?;
                map.get(&id).map(|v| json!(v)).ok_or_else(|| missing_key(&value))
            }
            Json::Array(ids) => ids
                .iter()
                .map(|v| {
                    v.as_i64()
                        .and_then(|id| map.get(&id))
                        .map(|v| json!(v))
                        .ok_or_else(|| missing_key(v))
                })
                .collect::<Result<Vec<Json>, _>>()
                .map(Json::Array),
            Json::Bool(false) | Json::Null => Ok(Json::Bool(false)),
            other => Err(missing_key(other)),
        },
    }
}

fn missing_key(value: &Json) -> ImportError {
    ImportError::Config(format!("Couldn't find {} in mapper", value))
}

/// `[id, display_name]` pairs collapse to their id; anything else passes
/// through untouched.
fn unwrap_relational(value: &Json) -> Json {
    if let Json::Array(pair) = value {
        if pair.len() == 2 && pair[0].is_i64() && pair[1].is_string() {
            return pair[0].clone();
        }
    }
    value.clone()
}

/// Substitute `%(field)s` placeholders of a match-domain template with
/// (mapped) values from the source record. Dot-paths traverse relations
/// with follow-up reads. Singleton lists collapse to their scalar unless
/// the operator is `in`/`not in`.
pub fn format_domain(
    rpc: &dyn OdooRpc,
    model: &str,
    domain: &Json,
    record: &Map<String, Json>,
    field_mappers: &[(String, FieldMapper)],
) -> Result<Json, ImportError> {
    let Json::Array(parts) = domain else {
        return Err(ImportError::Config(S!("Match domain must be a list")));
    };
    let mut out_domain = vec![];
    for part in parts {
        let Json::Array(triple) = part else {
            // operator tokens like "|" pass through
            out_domain.push(part.clone());
            continue;
        };
        let mut triple = triple.clone();
        if let Some(template) = triple.get(2).and_then(|v| v.as_str()) {
            if let Some(caps) = DOMAIN_TEMPLATE_REGEX.captures(template) {
                let key = caps.name("key").unwrap().as_str();
                let raw = mapped_value(rpc, model, record, key)?;
                let mut substituted = if raw.is_null() || raw == Json::Bool(false) {
                    Json::Bool(false)
                } else {
                    let mapper = field_mappers
                        .iter()
                        .find(|(f, _)| f == key)
                        .map(|(_, m)| m);
                    match mapper {
                        Some(mapper) => {
                            map_record_value(&raw, mapper).unwrap_or_else(|_| unwrap_relational(&raw))
                        }
                        None => unwrap_relational(&raw),
                    }
                };
                let operator = triple.get(1).and_then(|v| v.as_str()).unwrap_or("");
                if let Json::Array(items) = &substituted {
                    if items.len() == 1 && operator != "in" && operator != "not in" {
                        substituted = items[0].clone();
                    }
                }
                triple[2] = substituted;
            }
        }
        out_domain.push(Json::Array(triple));
    }
    Ok(Json::Array(out_domain))
}

/// Resolve a dot-path accessor against an already-read record, issuing
/// follow-up reads for each relation hop.
fn mapped_value(
    rpc: &dyn OdooRpc,
    model: &str,
    record: &Map<String, Json>,
    path: &str,
) -> Result<Json, ImportError> {
    let (first, rest) = match path.split_once('.') {
        Some((first, rest)) => (first, Some(rest)),
        None => (path, None),
    };
    let value = record.get(first).cloned().unwrap_or(Json::Null);
    let Some(rest) = rest else {
        return Ok(value);
    };

    let fields = rpc.fields_get(model)?;
    let relation = fields
        .get(first)
        .and_then(|def| def.get("relation"))
        .and_then(|rel| rel.as_str())
        .ok_or_else(|| {
            ImportError::Config(format!("Field '{}' of '{}' is not relational", first, model))
        })?
        .to_string();
    let rel_id = unwrap_relational(&value).as_i64().ok_or_else(|| {
        ImportError::Config(format!("Field '{}' of '{}' holds no record id", first, model))
    })?;
    let next_field = rest.split('.').next().unwrap_or(rest);
    let rel_record = rpc
        .read(&relation, &[rel_id], &[next_field])?
        .into_iter()
        .next()
        .unwrap_or_default();
    mapped_value(rpc, &relation, &rel_record, rest)
}
