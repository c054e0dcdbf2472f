use serde_json::json;

use odoo_importer::core::errors::ImportError;
use odoo_importer::core::table::Table;
use odoo_importer::core::value::Value;
use odoo_importer::importers::data::DataImporter;
use odoo_importer::importers::settings::SettingsImporter;
use odoo_importer::importers::translation::TranslationImporter;
use odoo_importer::S;

mod setup;
use setup::mock_rpc::MockRpc;

fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
    let columns = columns.iter().map(|c| S!(*c)).collect();
    let rows = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| {
                    if cell.is_empty() {
                        Value::Empty
                    } else {
                        Value::Str(S!(*cell))
                    }
                })
                .collect()
        })
        .collect();
    Table::new(columns, rows).unwrap()
}

#[test]
fn duplicate_ids_abort_before_any_remote_call() {
    let rpc = MockRpc::new();
    let data = table(
        &["id", "name"],
        &[&["base.x1", "First"], &["base.x2", "Second"], &["base.x1", "Again"]],
    );
    let err = DataImporter::new(&rpc)
        .upload(&data, "res.partner", 10, "dupes.csv", false)
        .unwrap_err();
    match err {
        ImportError::DuplicateIds { ids, .. } => assert_eq!(ids, vec![S!("base.x1")]),
        other => panic!("expected a duplicate id error, got {}", other),
    }
    assert!(rpc.calls.borrow().is_empty());
}

#[test]
fn upload_messages_become_a_diagnostic_sub_table() {
    // The server names the bare field "name"; the batch only carries its
    // relational variant, so the diagnostic widens to "name/id".
    let rpc = MockRpc::with_import_results(vec![json!({
        "ids": [],
        "messages": [{
            "type": "error",
            "field": "name",
            "rows": { "from": 2, "to": 4 },
            "message": "No matching record found",
        }],
    })]);
    let rows: Vec<Vec<&str>> = (0..10)
        .map(|i| vec![["r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9"][i], "base.n", "9.99"])
        .collect();
    let rows: Vec<&[&str]> = rows.iter().map(|r| r.as_slice()).collect();
    let data = table(&["id", "name/id", "price"], &rows);

    let err = DataImporter::new(&rpc)
        .upload(&data, "res.partner", 0, "partners.csv", false)
        .unwrap_err();
    let ImportError::UploadRejected { diagnostic, .. } = err else {
        panic!("expected an upload rejection");
    };
    let header = diagnostic.lines().next().unwrap();
    assert_eq!(header.split_whitespace().collect::<Vec<_>>(), vec!["id", "name/id"]);
    for id in ["r2", "r3", "r4"] {
        assert!(diagnostic.contains(id), "row {} missing from diagnostic", id);
    }
    for id in ["r1", "r5"] {
        assert!(!diagnostic.contains(id), "row {} wrongly in diagnostic", id);
    }
    assert!(!diagnostic.contains("9.99"));
}

#[test]
fn first_failing_batch_stops_the_upload() {
    let rpc = MockRpc::with_import_results(vec![json!({
        "ids": [],
        "messages": [{ "type": "error", "message": "constraint violated" }],
    })]);
    let data = table(
        &["id", "name"],
        &[
            &["base.a", "A"],
            &["base.b", "B"],
            &["base.c", "C"],
            &["base.d", "D"],
            &["base.e", "E"],
            &["base.f", "F"],
        ],
    );
    let err = DataImporter::new(&rpc)
        .upload(&data, "res.partner", 2, "partners.csv", false)
        .unwrap_err();
    assert!(matches!(err, ImportError::UploadRejected { .. }));
    // Three batches were planned, only the first was ever submitted.
    assert_eq!(rpc.count_calls("base_import.import", "do"), 1);
}

#[test]
fn short_id_list_is_flagged_but_not_fatal() {
    let rpc = MockRpc::with_import_results(vec![json!({ "ids": [1, 2], "messages": [] })]);
    let data = table(
        &["id", "name"],
        &[&["base.a", "A"], &["base.b", "B"], &["base.c", "C"]],
    );
    let summary = DataImporter::new(&rpc)
        .upload(&data, "res.partner", 10, "partners.csv", false)
        .unwrap();
    assert_eq!(summary.batches, 1);
    assert_eq!(summary.count_mismatches, 1);
    assert_eq!(summary.created_ids, vec![1, 2]);
}

#[test]
fn response_without_ids_or_messages_fails_the_batch() {
    let rpc = MockRpc::with_import_results(vec![json!({ "ids": [], "messages": [] })]);
    let data = table(&["id", "name"], &[&["base.a", "A"]]);
    let err = DataImporter::new(&rpc)
        .upload(&data, "res.partner", 10, "partners.csv", false)
        .unwrap_err();
    assert!(matches!(err, ImportError::UploadRejected { .. }));
}

#[test]
fn batches_are_submitted_in_table_order() {
    let rpc = MockRpc::with_import_results(vec![
        json!({ "ids": [1, 2], "messages": [] }),
        json!({ "ids": [3, 4], "messages": [] }),
    ]);
    let data = table(
        &["id", "name"],
        &[
            &["base.a", "A"],
            &["base.b", "B"],
            &["base.c", "C"],
            &["base.d", "D"],
        ],
    );
    let summary = DataImporter::new(&rpc)
        .upload(&data, "res.partner", 2, "partners.csv", false)
        .unwrap();
    assert_eq!(summary.batches, 2);
    assert_eq!(summary.count_mismatches, 0);
    assert_eq!(summary.created_ids, vec![1, 2, 3, 4]);
}

#[test]
fn skip_existing_drops_known_rows_and_their_sub_records() {
    let mut rpc = MockRpc::with_import_results(vec![json!({ "ids": [10], "messages": [] })]);
    rpc.existing_ids = vec![(S!("base"), S!("a"))];
    let data = table(
        &["id", "name"],
        &[&["base.a", "A"], &["", "A child"], &["base.b", "B"]],
    );
    let summary = DataImporter::new(&rpc)
        .upload(&data, "res.partner", 10, "partners.csv", true)
        .unwrap();
    assert_eq!(summary.batches, 1);
    assert_eq!(summary.count_mismatches, 0);
    assert_eq!(summary.created_ids, vec![10]);
    assert_eq!(rpc.count_calls("ir.model.data", "search_read"), 1);
}

#[test]
fn fully_imported_table_skips_the_upload() {
    let mut rpc = MockRpc::new();
    rpc.existing_ids = vec![(S!("base"), S!("a")), (S!("base"), S!("b"))];
    let data = table(&["id", "name"], &[&["base.a", "A"], &["base.b", "B"]]);
    let summary = DataImporter::new(&rpc)
        .upload(&data, "res.partner", 10, "partners.csv", true)
        .unwrap();
    assert_eq!(summary.batches, 0);
    assert_eq!(rpc.count_calls("base_import.import", "create"), 0);
    assert_eq!(rpc.count_calls("base_import.import", "do"), 0);
}

#[test]
fn language_columns_are_written_after_the_primary_upload() {
    let mut rpc = MockRpc::with_import_results(vec![json!({ "ids": [1, 2], "messages": [] })]);
    rpc.refs
        .insert(S!("base.a"), (S!("res.partner"), 11));
    let data = table(
        &["id", "name", "name:lang:de_DE"],
        &[&["base.a", "Chair", "Stuhl"], &["base.b", "Table", ""]],
    );
    let summary = DataImporter::new(&rpc)
        .upload(&data, "res.partner", 10, "partners.csv", false)
        .unwrap();
    assert_eq!(summary.lang_writes, 1);
    assert_eq!(rpc.count_calls("res.partner", "write"), 1);
    let upload = rpc.call_index("base_import.import", "do").unwrap();
    let translation = rpc.call_index("res.partner", "write").unwrap();
    assert!(upload < translation);
}

#[test]
fn unresolvable_translation_id_is_reported_after_all_writes() {
    let mut rpc = MockRpc::with_import_results(vec![json!({ "ids": [1, 2], "messages": [] })]);
    // Only the second row's external id resolves.
    rpc.refs
        .insert(S!("base.b"), (S!("res.partner"), 12));
    let data = table(
        &["id", "name", "name:lang:de_DE"],
        &[&["base.a", "Chair", "Stuhl"], &["base.b", "Table", "Tisch"]],
    );
    let err = DataImporter::new(&rpc)
        .upload(&data, "res.partner", 10, "partners.csv", false)
        .unwrap_err();
    match err {
        ImportError::Config(msg) => assert!(msg.contains("base.a")),
        other => panic!("expected a config error, got {}", other),
    }
    // The failing row did not stop the sibling write.
    assert_eq!(rpc.count_calls("res.partner", "write"), 1);
}

#[test]
fn empty_table_is_a_logged_noop() {
    let rpc = MockRpc::new();
    let data = table(&["id", "name"], &[]);
    let summary = DataImporter::new(&rpc)
        .upload(&data, "res.partner", 10, "empty.csv", false)
        .unwrap();
    assert_eq!(summary.batches, 0);
    assert!(rpc.calls.borrow().is_empty());
}

#[test]
fn translation_table_writes_one_call_per_cell() {
    let mut rpc = MockRpc::new();
    rpc.refs
        .insert(S!("base.a"), (S!("res.partner"), 11));
    rpc.refs
        .insert(S!("base.b"), (S!("res.partner"), 12));
    let data = table(
        &["id", "de_DE/name", "fr_FR/name"],
        &[&["base.a", "Stuhl", "Chaise"], &["base.b", "Tisch", ""]],
    );
    TranslationImporter::new(&rpc)
        .import_translations(&data)
        .unwrap();
    assert_eq!(rpc.count_calls("res.partner", "write"), 3);
}

#[test]
fn settings_import_creates_and_executes_a_transient() {
    let rpc = MockRpc::new();
    let settings = vec![(S!("group_multi_currency"), json!(true))];
    SettingsImporter::new(&rpc)
        .import_settings(&settings, "")
        .unwrap();
    let calls = rpc.calls.borrow();
    assert!(calls.contains(&(S!("res.config.settings"), S!("fields_get"))));
    assert!(calls.contains(&(S!("res.config.settings"), S!("create"))));
    assert!(calls.contains(&(S!("res.config.settings"), S!("execute"))));
}

#[test]
fn module_install_skips_unknown_or_installed_modules() {
    let rpc = MockRpc::new();
    SettingsImporter::new(&rpc)
        .install_modules(&[S!("sale")])
        .unwrap();
    assert_eq!(rpc.count_calls("ir.module.module", "update_list"), 1);
    assert_eq!(rpc.count_calls("ir.module.module", "search"), 1);
    assert_eq!(
        rpc.count_calls("ir.module.module", "button_immediate_install"),
        0
    );
}

#[test]
fn module_install_targets_the_searched_records() {
    let mut rpc = MockRpc::new();
    rpc.search_results
        .insert(S!("ir.module.module"), vec![99]);
    SettingsImporter::new(&rpc)
        .install_modules(&[S!("sale")])
        .unwrap();
    assert_eq!(
        rpc.count_calls("ir.module.module", "button_immediate_install"),
        1
    );
}
