//! Phase 1 - forward propagation.
//!
//! Builds `T1..T7` by repeated match-and-evaluate: `T1` comes directly
//! from `F1`, and each subsequent table is built by sorting the previous
//! one by `y`, matching adjacent `BC`-groups, and evaluating the next
//! `f`-function over every matched pair.

use std::collections::BTreeMap;

use crate::constants::BC;
use crate::error::{Error, Result};
use crate::ffunctions::{meta_multiplier, F1Calculator, FxCalculator};
use crate::matching::{find_matches, BucketEntry};
use crate::plot::entry::Entry;

/// Run forward propagation, returning `tables[0]` = T1 through
/// `tables[6]` = T7.
pub fn run(k: u8, seed: &[u8; 32]) -> Result<Vec<Vec<Entry>>> {
    let f1 = F1Calculator::new(k, seed);
    let n = 1u64 << k;
    let t1: Vec<Entry> = (0..n)
        .map(|x| {
            let y = f1.calculate_f(x);
            let meta_bits = meta_multiplier(2) * k as u32;
            let meta = crate::bits::ParkBits::from_value(x as u128, meta_bits)
                .expect("x fits k bits")
                .to_bytes();
            Entry {
                y,
                pos_l: x,
                offset: 0,
                meta,
                meta_bits,
            }
        })
        .collect();

    let mut tables = vec![t1];
    for t in 1..=6u8 {
        let mut sorted = tables.last().unwrap().clone();
        sorted.sort_by_key(|e| e.y);
        let next = build_next_table(k, t, seed, &sorted)?;
        // The table just built references positions in `sorted`, not in
        // whatever order this table was in before - it must be replaced
        // with the order its own back-pointers now assume.
        *tables.last_mut().unwrap() = sorted;
        tables.push(next);
    }
    Ok(tables)
}

fn build_next_table(k: u8, t: u8, seed: &[u8; 32], sorted: &[Entry]) -> Result<Vec<Entry>> {
    let mut groups: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
    for (i, e) in sorted.iter().enumerate() {
        groups.entry(e.y / BC as u64).or_default().push(i);
    }
    let group_keys: Vec<u64> = groups.keys().copied().collect();

    let fx = FxCalculator::new(t + 1, k, seed);
    let next_meta_bits = meta_multiplier(t + 2) * k as u32;
    let mut next = Vec::new();

    for w in group_keys.windows(2) {
        let (bl, br) = (w[0], w[1]);
        if br != bl + 1 {
            continue;
        }
        let l_idxs = &groups[&bl];
        let r_idxs = &groups[&br];
        let bucket_l: Vec<BucketEntry> = l_idxs
            .iter()
            .enumerate()
            .map(|(local, &idx)| BucketEntry {
                y: sorted[idx].y,
                index: local as u32,
            })
            .collect();
        let bucket_r: Vec<BucketEntry> = r_idxs
            .iter()
            .enumerate()
            .map(|(local, &idx)| BucketEntry {
                y: sorted[idx].y,
                index: local as u32,
            })
            .collect();

        for (li, ri) in find_matches(&bucket_l, &bucket_r) {
            let pos_l = l_idxs[li as usize];
            let pos_r = r_idxs[ri as usize];
            if pos_r <= pos_l {
                continue;
            }
            let offset = pos_r - pos_l;
            if offset >= 2048 {
                return Err(Error::BucketCrowded);
            }

            let left = &sorted[pos_l];
            let right = &sorted[pos_r];
            let meta_l = left.metadata()?;
            let meta_r = right.metadata()?;

            let mut y_new = fx.calculate_f(left.y, &meta_l, &meta_r);
            if t + 1 == 7 {
                // Every y carries its real k-bit value in the high bits
                // and E collision-resolution bits in the low bits; table
                // 7 is the last table to match on, so its low bits are
                // dropped instead of carried forward.
                y_new >>= crate::constants::E;
            }

            let meta_new = if next_meta_bits == 0 {
                Vec::new()
            } else {
                fx.compose_metadata(&meta_l, &meta_r).to_bytes()
            };

            next.push(Entry {
                y: y_new,
                pos_l: pos_l as u64,
                offset: offset as u32,
                meta: meta_new,
                meta_bits: next_meta_bits,
            });
        }
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_propagation_produces_seven_nonempty_tables_for_small_k() {
        let seed = [11u8; 32];
        let tables = run(14, &seed).unwrap();
        assert_eq!(tables.len(), 7);
        assert_eq!(tables[0].len(), 1 << 14);
        // Not every small-k run is guaranteed matches at every level, but
        // with k=14 there should be substantial survival into T2.
        assert!(!tables[1].is_empty());
    }
}
