use std::collections::HashMap;

use serde_json::{json, Map, Value as Json};

use odoo_importer::mapper::{
    format_domain, map_record_value, map_record_values, transfer_records, FieldMapper,
};
use odoo_importer::S;

mod setup;
use setup::mock_rpc::MockRpc;

fn record(fields: &[(&str, Json)]) -> Map<String, Json> {
    fields
        .iter()
        .map(|(name, value)| (S!(*name), value.clone()))
        .collect()
}

#[test]
fn copy_unwraps_relational_pairs() {
    let value = map_record_value(&json!([3, "A partner"]), &FieldMapper::Copy).unwrap();
    assert_eq!(value, json!(3));
    let value = map_record_value(&json!("plain"), &FieldMapper::Copy).unwrap();
    assert_eq!(value, json!("plain"));
}

#[test]
fn fixed_ignores_the_source_value() {
    let mapper = FieldMapper::Fixed(json!("forced"));
    assert_eq!(map_record_value(&json!("source"), &mapper).unwrap(), json!("forced"));
}

#[test]
fn html_substitutes_the_empty_paragraph() {
    assert_eq!(
        map_record_value(&json!(false), &FieldMapper::Html).unwrap(),
        json!("<p><br></p>")
    );
    assert_eq!(
        map_record_value(&json!("<p>body</p>"), &FieldMapper::Html).unwrap(),
        json!("<p>body</p>")
    );
}

#[test]
fn lookup_translates_ids_and_rejects_unknown_ones() {
    let mapper = FieldMapper::Lookup(HashMap::from([(5, 50), (6, 60)]));
    assert_eq!(map_record_value(&json!(5), &mapper).unwrap(), json!(50));
    assert_eq!(
        map_record_value(&json!([5, 6]), &mapper).unwrap(),
        json!([50, 60])
    );
    assert_eq!(map_record_value(&json!(false), &mapper).unwrap(), json!(false));
    assert!(map_record_value(&json!(7), &mapper).is_err());
}

#[test]
fn map_errors_can_be_skipped_per_field() {
    let source = record(&[("name", json!("A")), ("partner_id", json!([9, "Unknown"]))]);
    let mappers = vec![
        (S!("name"), FieldMapper::Copy),
        (S!("partner_id"), FieldMapper::Lookup(HashMap::new())),
    ];
    assert!(map_record_values(&source, &mappers, false).is_err());

    let values = map_record_values(&source, &mappers, true).unwrap();
    assert_eq!(values.get("name"), Some(&json!("A")));
    assert!(!values.contains_key("partner_id"));
}

#[test]
fn domain_templates_substitute_record_values() {
    let rpc = MockRpc::new();
    let source = record(&[
        ("name", json!("Chair")),
        ("partner_id", json!([3, "A partner"])),
        ("tag_ids", json!([1])),
    ]);
    let mappers = vec![
        (S!("partner_id"), FieldMapper::Lookup(HashMap::from([(3, 7)]))),
        (S!("tag_ids"), FieldMapper::Lookup(HashMap::from([(1, 10)]))),
    ];
    let domain = json!([
        "|",
        ["name", "=", "%(name)s"],
        ["partner_id", "=", "%(partner_id)s"],
        ["tag_ids", "=", "%(tag_ids)s"],
    ]);
    let formatted = format_domain(&rpc, "product.template", &domain, &source, &mappers).unwrap();
    assert_eq!(
        formatted,
        json!([
            "|",
            ["name", "=", "Chair"],
            ["partner_id", "=", 7],
            // a singleton list collapses to its scalar for a non-"in" operator
            ["tag_ids", "=", 10],
        ])
    );
    assert!(rpc.calls.borrow().is_empty());
}

#[test]
fn empty_source_transfers_nothing() {
    let source = MockRpc::new();
    let target = MockRpc::new();
    let mapper = transfer_records(
        &source,
        &target,
        "product.template",
        &[(S!("name"), FieldMapper::Copy)],
        &json!([["name", "=", "%(name)s"]]),
        None,
        false,
    )
    .unwrap();
    assert!(mapper.is_empty());
    assert_eq!(target.count_calls("product.template", "create"), 0);
}
