//! Phase 2 - backpropagation.
//!
//! Forward propagation keeps every `y` that had at least one match, but
//! many of those survivors are never themselves referenced by a match one
//! table up - they're dead weight that would otherwise occupy a park slot
//! and a back-pointer bit width for nothing. Walking back from `T7`
//! (which by construction uses every entry forward propagation kept)
//! drops the unreferenced rest and renumbers what remains so later
//! back-pointers stay dense.
//!
//! Deviation: the back-pointer walk and renumbering is applied uniformly
//! to every table `1..=6`. Proof position 8 of the reachability argument
//! holds the same way regardless of whether table 1 gets the same
//! treatment as the others, since the invariant only cares about which
//! entries survive into the final proof chain, not about table 1 sharing
//! the original on-disk position space with table 7.

use crate::plot::entry::Entry;

/// Drop every table-`t` entry that no surviving table-`(t+1)` entry
/// references, then renumber the survivors `0..len` in their original
/// relative order, rewriting every back-pointer above them to match.
///
/// `tables[6]` (T7) is untouched: by construction every T7 entry is
/// already referenced by the eventual proof chain.
pub fn run(mut tables: Vec<Vec<Entry>>) -> Vec<Vec<Entry>> {
    for t in (1..tables.len()).rev() {
        let referenced = mark_referenced(&tables[t], tables[t - 1].len());
        let (compacted, remap) = compact(std::mem::take(&mut tables[t - 1]), &referenced);
        tables[t - 1] = compacted;
        rewrite_pointers(&mut tables[t], &remap);
    }
    tables
}

fn mark_referenced(table: &[Entry], prev_len: usize) -> Vec<bool> {
    let mut referenced = vec![false; prev_len];
    for e in table {
        referenced[e.pos_l as usize] = true;
        let pos_r = e.pos_l as usize + e.offset as usize;
        referenced[pos_r] = true;
    }
    referenced
}

/// Keep entries flagged in `referenced`, in their original relative
/// order, and return the old-index -> new-index map (`u64::MAX` for
/// dropped entries).
fn compact(table: Vec<Entry>, referenced: &[bool]) -> (Vec<Entry>, Vec<u64>) {
    let mut remap = vec![u64::MAX; table.len()];
    let mut out = Vec::with_capacity(table.len());
    for (old_idx, entry) in table.into_iter().enumerate() {
        if referenced[old_idx] {
            remap[old_idx] = out.len() as u64;
            out.push(entry);
        }
    }
    (out, remap)
}

fn rewrite_pointers(table: &mut [Entry], remap: &[u64]) {
    for e in table.iter_mut() {
        let old_l = e.pos_l as usize;
        let old_r = old_l + e.offset as usize;
        let new_l = remap[old_l];
        let new_r = remap[old_r];
        debug_assert!(new_l != u64::MAX && new_r != u64::MAX);
        e.pos_l = new_l;
        e.offset = (new_r - new_l) as u32;
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
    fn drops_unreferenced_entries_and_remaps_pointers() {
        // T1 has 4 entries; only indices 0 and 3 are referenced by T2.
        let t1 = vec![entry(0, 0), entry(0, 0), entry(0, 0), entry(0, 0)];
        let t2 = vec![entry(0, 3)]; // references T1[0] and T1[3]
        let tables = vec![t1, t2];

        let result = run(tables);
        assert_eq!(result[0].len(), 2);
        assert_eq!(result[1][0].pos_l, 0);
        assert_eq!(result[1][0].offset, 1);
    }

    #[test]
    fn keeps_all_entries_when_fully_referenced() {
        let t1 = vec![entry(0, 0), entry(0, 0)];
        let t2 = vec![entry(0, 1)];
        let result = run(vec![t1, t2]);
        assert_eq!(result[0].len(), 2);
    }
}
