use odoo_importer::core::chunk::chunk_rows;
use odoo_importer::core::errors::ImportError;
use odoo_importer::core::table::{Table, TableSlice};
use odoo_importer::core::value::Value;
use odoo_importer::S;

/// Two-column table whose first column is `id`; an empty str is a blank
/// identifier (a flattened sub-record of the preceding row).
fn id_table(ids: &[&str]) -> Table {
    let rows = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let cell = if id.is_empty() {
                Value::Empty
            } else {
                Value::Str(S!(*id))
            };
            vec![cell, Value::Str(format!("row {}", i))]
        })
        .collect();
    Table::new(vec![S!("id"), S!("name")], rows).unwrap()
}

fn batch_ids(batch: &TableSlice) -> Vec<String> {
    batch.rows().map(|row| row[0].to_string()).collect()
}

#[test]
fn table_within_batch_size_is_one_batch() {
    let table = id_table(&["a", "b", "c"]);
    let batches = chunk_rows(&table, 3).unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 3);
    assert_eq!(batches[0].offset(), 0);

    let batches = chunk_rows(&table, 100).unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batch_ids(&batches[0]), vec!["a", "b", "c"]);
}

#[test]
fn concatenated_batches_reproduce_the_table() {
    let patterns: &[&[&str]] = &[
        &["a", "b", "c", "d", "e", "f", "g"],
        &["a", "", "", "b", "", "c"],
        &["a", "", "b", "", "", "", "c", "d", "", "e"],
        &["", "", "a", "", "b", ""],
    ];
    for ids in patterns {
        let table = id_table(ids);
        for max in 1..=ids.len() {
            let batches = chunk_rows(&table, max).unwrap();
            let mut rebuilt = vec![];
            let mut expected_offset = 0;
            for batch in &batches {
                assert_eq!(batch.offset(), expected_offset);
                expected_offset += batch.len();
                rebuilt.extend(batch_ids(batch));
            }
            let original: Vec<String> = ids.iter().map(|id| S!(*id)).collect();
            assert_eq!(rebuilt, original, "ids {:?} max {}", ids, max);
        }
    }
}

#[test]
fn only_the_first_batch_may_start_blank() {
    let patterns: &[&[&str]] = &[
        &["", "", "a", "", "b", "", "", "c"],
        &["a", "", "", "", "b", "c", "", "d", "e"],
        &["a", "b", "", "", "", "", "", "c"],
    ];
    for ids in patterns {
        let table = id_table(ids);
        for max in 1..=ids.len() {
            let batches = chunk_rows(&table, max).unwrap();
            for batch in batches.iter().skip(1) {
                assert!(
                    !batch.cell(0, 0).is_blank(),
                    "ids {:?} max {}: batch at offset {} starts blank",
                    ids,
                    max,
                    batch.offset()
                );
            }
        }
    }
}

#[test]
fn trailing_blanks_stay_with_their_record() {
    // Six rows cut into ceil(6/2)=3 initial slices [a,""], ["",b], ["",c];
    // the leading blanks of the second and third slice move back.
    let table = id_table(&["a", "", "", "b", "", "c"]);
    let batches = chunk_rows(&table, 2).unwrap();
    let ids: Vec<Vec<String>> = batches.iter().map(batch_ids).collect();
    assert_eq!(
        ids,
        vec![
            vec![S!("a"), S!(""), S!("")],
            vec![S!("b"), S!("")],
            vec![S!("c")],
        ]
    );
}

#[test]
fn all_blank_table_collapses_to_one_batch() {
    // Every slice after the first holds only blanks, so the first batch
    // absorbs them all and may exceed the configured size.
    let table = id_table(&["", "", "", "", "", "", ""]);
    let batches = chunk_rows(&table, 2).unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 7);
}

#[test]
fn missing_id_column_is_a_config_error() {
    let table = Table::new(
        vec![S!("name")],
        vec![vec![Value::Str(S!("a"))], vec![Value::Str(S!("b"))]],
    )
    .unwrap();
    match chunk_rows(&table, 1) {
        Err(ImportError::Config(msg)) => assert!(msg.contains("id")),
        other => panic!("expected a config error, got {:?}", other.map(|b| b.len())),
    }
}
