//! Phase 4 - checkpoints over the final table.
//!
//! Table 7 is sorted by `y` (not line point, unlike tables 1..6) so the
//! prover can binary search it by challenge prefix. Like every other
//! table, each entry is a back-pointer pair into table 6; `P7` stores
//! both sides of that pair as fixed-width fields (no line-point
//! compression, since the sort order here is `y`, not line point). `C1`
//! records one `y` value every [`CP1`] entries so a challenge can jump
//! near its match in one seek; `C2` does the same over `C1` at a coarser
//! stride; `C3` holds the ANS-compressed `y` deltas between consecutive
//! `C1` checkpoints, the same stub/small-delta split used by the P1..P6
//! parks.

use crate::ans;
use crate::bits::{slice_int_from_bytes, ParkBits};
use crate::constants::{C3_R, CP1, CP2, STUB_BITS};
use crate::error::{Error, Result};
use crate::plot::entry::Entry;

pub struct FinalTable {
    pub p7: Vec<u8>,
    pub c1: Vec<u8>,
    pub c2: Vec<u8>,
    pub c3: Vec<u8>,
    pub count: usize,
}

/// Sort `t7` by `y` and build `P7`/`C1`/`C2`/`C3`.
pub fn run(k: u8, t6_len: usize, mut t7: Vec<Entry>) -> Result<FinalTable> {
    t7.sort_by_key(|e| e.y);

    let pos_width = bits_for(t6_len as u64);
    let p7 = encode_p7(&t7, pos_width);

    let ys: Vec<u64> = t7.iter().map(|e| e.y).collect();
    let c1 = encode_c1(&ys, k);
    let c2 = encode_c2(&ys, k);
    let c3 = encode_c3(&ys, k)?;

    Ok(FinalTable {
        p7,
        c1,
        c2,
        c3,
        count: t7.len(),
    })
}

fn bits_for(n: u64) -> u32 {
    if n <= 1 {
        1
    } else {
        64 - (n - 1).leading_zeros()
    }
}

fn encode_p7(t7: &[Entry], pos_width: u32) -> Vec<u8> {
    let mut bits = ParkBits::new();
    for e in t7 {
        let pos_r = e.pos_l + e.offset as u64;
        bits.append(e.pos_l as u128, pos_width).expect("pos fits width");
        bits.append(pos_r as u128, pos_width).expect("pos fits width");
    }
    let mut out = (t7.len() as u32).to_le_bytes().to_vec();
    out.push(pos_width as u8);
    out.extend(bits.to_bytes());
    out
}

/// Decode `P7` back into `(pos_l, pos_r)` pairs into table 6, one per
/// sorted-by-`y` table 7 entry.
pub fn decode_p7(buf: &[u8]) -> Result<Vec<(u64, u64)>> {
    if buf.len() < 5 {
        return Err(Error::Corrupt("P7 truncated"));
    }
    let count = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
    let pos_width = buf[4] as u32;
    let body = &buf[5..];
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let base = 2 * i as u32 * pos_width;
        let pos_l = slice_int_from_bytes(body, base, pos_width);
        let pos_r = slice_int_from_bytes(body, base + pos_width, pos_width);
        out.push((pos_l, pos_r));
    }
    Ok(out)
}

/// One raw `k`-bit `y` value every `CP1` sorted entries.
fn encode_c1(ys: &[u64], k: u8) -> Vec<u8> {
    let mut bits = ParkBits::new();
    for chunk in ys.chunks(CP1 as usize) {
        bits.append(chunk[0] as u128, k as u32).expect("y fits k bits");
    }
    bits.to_bytes()
}

pub fn decode_c1(buf: &[u8], k: u8, count: usize) -> Vec<u64> {
    (0..count)
        .map(|i| slice_int_from_bytes(buf, i as u32 * k as u32, k as u32))
        .collect()
}

/// One raw `k`-bit `y` value every `CP1 * CP2` sorted entries.
fn encode_c2(ys: &[u64], k: u8) -> Vec<u8> {
    let stride = (CP1 * CP2) as usize;
    let mut bits = ParkBits::new();
    for chunk in ys.chunks(stride) {
        bits.append(chunk[0] as u128, k as u32).expect("y fits k bits");
    }
    bits.to_bytes()
}

pub fn decode_c2(buf: &[u8], k: u8, count: usize) -> Vec<u64> {
    decode_c1(buf, k, count)
}

/// ANS-compressed `y` deltas within each `C1` interval, stub/small-delta
/// split exactly as [`crate::plot::park`] does for line points.
fn encode_c3(ys: &[u64], k: u8) -> Result<Vec<u8>> {
    let stub_bits = k as u32 - STUB_BITS;
    let mut out = Vec::new();
    for chunk in ys.chunks(CP1 as usize) {
        let mut stub_seq = ParkBits::new();
        let mut small_deltas = Vec::with_capacity(chunk.len().saturating_sub(1));
        for pair in chunk.windows(2) {
            let delta = pair[1] - pair[0];
            let stub = delta & ((1u64 << stub_bits) - 1);
            let small = delta >> stub_bits;
            // See plot::park's encode_park: 255 collides with the ANS
            // sentinel byte, not an off-by-one on the field's 8-bit width.
            if small >= ans::ALPHABET as u64 {
                return Err(Error::DeltaOverflow);
            }
            stub_seq.append(stub as u128, stub_bits)?;
            small_deltas.push(small as u8);
        }
        let ans_payload = ans::encode_deltas(&small_deltas, C3_R)?;
        let stub_bytes = stub_seq.to_bytes();

        out.extend((stub_bytes.len() as u32).to_le_bytes());
        out.extend(&stub_bytes);
        out.extend((ans_payload.len() as u32).to_le_bytes());
        out.extend(&ans_payload);
    }
    Ok(out)
}

/// Decode every `C1`-interval block in `buf`; `c1_values` supplies each
/// interval's first `y` (already known from `C1` itself), and
/// `interval_lens` gives each interval's entry count (the final interval
/// may hold fewer than `CP1`).
pub fn decode_c3(buf: &[u8], k: u8, c1_values: &[u64], interval_lens: &[usize]) -> Result<Vec<u64>> {
    let stub_bits = k as u32 - STUB_BITS;
    let mut pos = 0usize;
    let mut out = Vec::new();

    for (&first, &len) in c1_values.iter().zip(interval_lens) {
        out.push(first);
        if len <= 1 {
            continue;
        }
        if buf.len() < pos + 4 {
            return Err(Error::Corrupt("C3 truncated"));
        }
        let stub_len = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        let stub_bytes = &buf[pos..pos + stub_len];
        pos += stub_len;

        if buf.len() < pos + 4 {
            return Err(Error::Corrupt("C3 truncated"));
        }
        let ans_len = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        let ans_bytes = &buf[pos..pos + ans_len];
        pos += ans_len;

        let small_deltas = ans::decode_deltas(ans_bytes, len - 1, C3_R)?;
        let mut y = first;
        for (i, &small) in small_deltas.iter().enumerate() {
            let stub = slice_int_from_bytes(stub_bytes, i as u32 * stub_bits, stub_bits);
            let delta = ((small as u64) << stub_bits) | stub;
            y += delta;
            out.push(y);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(y: u64, pos_l: u64) -> Entry {
        Entry {
            y,
            pos_l,
            offset: 0,
            meta: Vec::new(),
            meta_bits: 0,
        }
    }

    fn entry_with_offset(y: u64, pos_l: u64, offset: u32) -> Entry {
        Entry {
            y,
            pos_l,
            offset,
            meta: Vec::new(),
            meta_bits: 0,
        }
    }

    #[test]
    fn p7_roundtrips_position_pairs() {
        // encode_p7 expects pre-sorted-by-y input, as `run` provides it.
        let mut sorted = vec![
            entry_with_offset(5, 10, 3),
            entry_with_offset(1, 20, 1),
            entry_with_offset(9, 30, 7),
        ];
        sorted.sort_by_key(|e| e.y);
        let expected: Vec<(u64, u64)> = sorted
            .iter()
            .map(|e| (e.pos_l, e.pos_l + e.offset as u64))
            .collect();

        let p7 = encode_p7(&sorted, bits_for(40));
        let decoded = decode_p7(&p7).unwrap();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn c1_and_c2_capture_checkpoint_boundaries() {
        let ys: Vec<u64> = (0..25_000u64).map(|i| i * 3).collect();
        let c1 = encode_c1(&ys, 20);
        let decoded = decode_c1(&c1, 20, 3);
        assert_eq!(decoded, vec![ys[0], ys[10_000], ys[20_000]]);
    }

    #[test]
    fn c3_roundtrips_deltas_within_one_interval() {
        let k = 20;
        let ys: Vec<u64> = (0..500u64).map(|i| i * 5).collect();
        let c3 = encode_c3(&ys, k).unwrap();
        let decoded = decode_c3(&c3, k, &[ys[0]], &[ys.len()]).unwrap();
        assert_eq!(decoded, ys);
    }

    #[test]
    fn full_run_produces_consistent_checkpoint_tables() {
        let k = 20;
        let t7: Vec<Entry> = (0..100u64).map(|i| entry((i * 37) % 900, i)).collect();
        let result = run(k, 200, t7).unwrap();
        assert_eq!(result.count, 100);
        assert!(!result.p7.is_empty());
        assert!(!result.c1.is_empty());
    }
}
