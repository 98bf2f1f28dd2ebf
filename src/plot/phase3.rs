//! Phase 3 - compression.
//!
//! Tables 2..6's surviving entries are `(pos_l, pos_r)` pairs into the
//! table below. Sorting those pairs by line point before park-encoding
//! lets consecutive entries share small deltas, which is what makes park
//! compression worthwhile; the table above must then have its
//! back-pointers rewritten to the new, sorted position numbering.
//!
//! Table 1 is not a table of pairs - its entries are the leaves
//! themselves (`pos_l` holds the `x` value, `offset` is always zero) - so
//! there is no line point to take and no sort to do; it is stored as a
//! flat array of raw `x` values in its existing position order, which
//! table 2's back-pointers already assume.

use crate::constants::EPP;
use crate::error::Result;
use crate::plot::entry::Entry;
use crate::plot::line_point::square_to_line_point;
use crate::plot::park;

/// Compressed form of one table: fixed-size parks plus the total entry
/// count (needed to know how many line points the final, possibly
/// partial, park holds).
pub struct TableOutput {
    pub parks: Vec<Vec<u8>>,
    pub count: usize,
}

/// Compress tables 1..6 of `tables` (`tables[0]` = T1 .. `tables[6]` =
/// T7), rewriting each table's back-pointers to match the line-point
/// sort order chosen for the table below it. Table 7 is not
/// line-point-compressed here - it is sorted by `y` and checkpointed by
/// [`crate::plot::phase4`] instead, since the prover needs to binary
/// search it by `y`, not walk it by line point.
///
/// Returns the compressed `P1..P6` outputs alongside table 7 with its
/// back-pointers rewritten to the line-point order chosen for table 6 -
/// the caller (phase 4) needs that rewritten table, not the one it
/// passed in, to make `P7` reference the right on-disk positions.
pub fn run(k: u8, mut tables: Vec<Vec<Entry>>) -> Result<(Vec<TableOutput>, Vec<Entry>)> {
    let last = tables.len() - 1;
    let mut outputs = Vec::with_capacity(last);

    for t in 0..last {
        let table = &tables[t];

        if t == 0 {
            let xs: Vec<u64> = table.iter().map(|e| e.pos_l).collect();
            let parks = emit_raw_parks(&xs, k)?;
            outputs.push(TableOutput {
                parks,
                count: xs.len(),
            });
            continue;
        }

        let line_points: Vec<u128> = table
            .iter()
            .map(|e| square_to_line_point(e.pos_l as u128, (e.pos_l + e.offset as u64) as u128))
            .collect();

        let mut order: Vec<usize> = (0..line_points.len()).collect();
        order.sort_by_key(|&i| line_points[i]);

        let mut remap = vec![0u64; order.len()];
        for (new_idx, &old_idx) in order.iter().enumerate() {
            remap[old_idx] = new_idx as u64;
        }
        let sorted_lps: Vec<u128> = order.iter().map(|&i| line_points[i]).collect();

        let parks = emit_parks(&sorted_lps, k, t as u8 + 1)?;
        outputs.push(TableOutput {
            parks,
            count: sorted_lps.len(),
        });

        rewrite_pointers(&mut tables[t + 1], &remap);
    }

    let final_table = tables.pop().unwrap();
    Ok((outputs, final_table))
}

fn emit_parks(sorted_line_points: &[u128], k: u8, table: u8) -> Result<Vec<Vec<u8>>> {
    if sorted_line_points.is_empty() {
        return Ok(Vec::new());
    }
    sorted_line_points
        .chunks(EPP as usize)
        .map(|chunk| park::encode_park(chunk, k, table))
        .collect()
}

fn emit_raw_parks(xs: &[u64], k: u8) -> Result<Vec<Vec<u8>>> {
    if xs.is_empty() {
        return Ok(Vec::new());
    }
    xs.chunks(EPP as usize)
        .map(|chunk| park::encode_raw_park(chunk, k))
        .collect()
}

fn rewrite_pointers(table: &mut [Entry], remap: &[u64]) {
    for e in table.iter_mut() {
        let old_l = e.pos_l as usize;
        let old_r = old_l + e.offset as usize;
        let new_l = remap[old_l];
        let new_r = remap[old_r];
        // The line-point sort doesn't preserve relative order, so the
        // smaller remapped index isn't always the one that used to be
        // pos_l; pos_l must stay the smaller side for pos_l + offset to
        // reconstruct the other side correctly.
        let (lo, hi) = if new_l <= new_r { (new_l, new_r) } else { (new_r, new_l) };
        e.pos_l = lo;
        e.offset = (hi - lo) as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pos_l: u64, offset: u32) -> Entry {
        Entry {
            y: 0,
            pos_l,
            offset,
            meta: Vec::new(),
            meta_bits: 0,
        }
    }

    #[test]
    fn compresses_table_one_as_a_raw_leaf_array() {
        let t1: Vec<Entry> = (0..50u64).map(|x| entry(x, 0)).collect();
        let t2 = vec![entry(0, 0)]; // stands in for the untouched last table
        let (outputs, final_table) = run(20, vec![t1, t2]).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].count, 50);
        assert_eq!(outputs[0].parks.len(), 1);
        assert_eq!(
            outputs[0].parks[0],
            crate::plot::park::encode_raw_park(&(0..50u64).collect::<Vec<_>>(), 20).unwrap()
        );
        assert_eq!(final_table.len(), 1);
    }

    #[test]
    fn rewrite_pointers_follows_the_remap() {
        let mut t2 = vec![entry(1, 2)]; // references old indices 1 and 3
        let remap = vec![2u64, 0, 3, 1]; // old index -> new index
        rewrite_pointers(&mut t2, &remap);
        assert_eq!(t2[0].pos_l, 0); // old index 1 -> new index 0
        assert_eq!(t2[0].offset, 1); // old index 3 -> new index 1
    }

    #[test]
    fn rewrite_pointers_keeps_pos_l_as_the_smaller_side() {
        // Line-point sort can flip which old index lands first: old_l=0
        // maps to new index 3, old_r=1 maps to new index 0.
        let mut t2 = vec![entry(0, 1)];
        let remap = vec![3u64, 0];
        rewrite_pointers(&mut t2, &remap);
        assert_eq!(t2[0].pos_l, 0);
        assert_eq!(t2[0].offset, 3);
    }
}
