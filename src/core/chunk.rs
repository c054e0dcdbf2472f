use std::ops::Range;

use tracing::{debug, info};

use crate::core::errors::ImportError;
use crate::core::table::{Table, TableSlice};
use crate::S;

/// Split a table into upload batches of at most `max_batch_size` rows,
/// overflowing a batch as long as the `id` column stays blank.
///
/// Rows with a blank identifier are flattened sub-records of the nearest
/// preceding identified row and must never land in a different batch than
/// that row. The table is first cut into `ceil(len/max)` roughly-equal
/// slices, then slice boundaries are shifted so no batch (other than the
/// first) starts on a blank identifier. An all-blank table therefore
/// collapses into a single batch, whatever its length.
pub fn chunk_rows<'a>(
    table: &'a Table,
    max_batch_size: usize,
) -> Result<Vec<TableSlice<'a>>, ImportError> {
    let id_col = table
        .column_index("id")
        .ok_or_else(|| ImportError::Config(S!("Table has no 'id' column")))?;

    if table.len() <= max_batch_size {
        return Ok(vec![table.full_slice()]);
    }

    debug!(
        "Chunking dataset with {} entries to size {}",
        table.len(),
        max_batch_size
    );
    let blank = |row: usize| table.cell(row, id_col).is_blank();

    let mut slices = initial_slices(table.len(), max_batch_size);
    let mut out: Vec<Range<usize>> = vec![slices.remove(0)];
    let slice_count = slices.len();
    for (index, slice) in slices.into_iter().enumerate() {
        let first_with_id = slice.clone().find(|&row| !blank(row));

        match first_with_id {
            None => {
                // No ids at all? Extend the last output batch over the slice.
                out.last_mut().unwrap().end = slice.end;
            }
            Some(row) if row == slice.start => {
                out.push(slice);
            }
            Some(row) => {
                debug!(
                    "({}/{}) Move {} rows to previous chunk",
                    index + 1,
                    slice_count,
                    row - slice.start
                );
                out.last_mut().unwrap().end = row;
                if row < slice.end {
                    out.push(row..slice.end);
                }
            }
        }
    }

    info!(
        "Table with len {} chunked into {} parts",
        table.len(),
        out.len()
    );
    Ok(out.into_iter().map(|r| table.slice(r)).collect())
}

/// Roughly-equal initial cut: `n = ceil(len/max)` slices where the first
/// `len % n` get one extra row. Deliberately not a greedy max-fill, so the
/// trailing batch never degenerates to a handful of rows.
fn initial_slices(len: usize, max_batch_size: usize) -> Vec<Range<usize>> {
    let count = len.div_ceil(max_batch_size);
    let base = len / count;
    let extra = len % count;
    let mut slices = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count {
        let size = if i < extra { base + 1 } else { base };
        slices.push(start..start + size);
        start += size;
    }
    slices
}
