use std::collections::HashMap;
use std::iter;

use tracing::warn;

/// Expand a sparse bucket hash into `size` slots, absent fields counting as zero.
///
/// With `unit_offset` the field numbering starts at 1 (day of month, month of year) and
/// field `"1"` lands in slot 0. Fields that are not integers or fall outside the bucket
/// are dropped.
pub fn sparse_to_dense(sparse: &HashMap<String, i64>, size: usize, unit_offset: bool) -> Vec<i64> {
    let mut dense = vec![0; size];
    let offset = usize::from(unit_offset);

    for (field, count) in sparse {
        let slot = field
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(offset))
            .filter(|slot| *slot < size);

        match slot {
            Some(slot) => dense[slot] = *count,
            None => warn!(field = %field, size, unit_offset, "dropping bucket field outside its span"),
        }
    }

    dense
}

/// Concatenate consecutive bucket arrays and cut `len` slots starting at `offset`.
///
/// Slots past the end of the concatenation read as zero, so the result always has
/// exactly `len` entries.
pub fn concat_slice(buckets: Vec<Vec<i64>>, offset: usize, len: usize) -> Vec<i64> {
    buckets
        .into_iter()
        .flatten()
        .skip(offset)
        .chain(iter::repeat(0))
        .take(len)
        .collect()
}
