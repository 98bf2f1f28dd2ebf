//! Park assembly and decoding.
//!
//! A park holds up to `EPP` sorted line points as one `2k`-bit
//! `first_line_point` plus `EPP - 1` deltas, each split into an
//! incompressible low-order `stub` (packed raw) and a high-order
//! `small_delta` byte (ANS-coded against the table's fixed `R`).
//!
//! Table 1 is the exception: its entries are leaves, not pairs, so there
//! is nothing to pair into a line point (see [`encode_raw_park`]).

use crate::ans;
use crate::bits::{slice_int_from_bytes, ParkBits};
use crate::constants::{max_delta_bits_per_entry, EPP, STUB_BITS, STUB_DELTA_R};
use crate::error::{Error, Result};

pub fn stubs_size_bytes(k: u8) -> usize {
    let stub_bits = k as usize - STUB_BITS as usize;
    ((EPP as usize - 1) * stub_bits + 7) / 8
}

pub fn max_deltas_size_bytes(k: u8, table: u8) -> usize {
    let d = max_delta_bits_per_entry(table);
    (((EPP - 1) as f64 * d) / 8.0).ceil() as usize
}

pub fn raw_park_size_bytes(k: u8) -> usize {
    (EPP as usize * k as usize + 7) / 8
}

/// Fixed on-disk size of a park for table `table` at parameter `k`.
pub fn park_size_bytes(k: u8, table: u8) -> usize {
    if table == 1 {
        return raw_park_size_bytes(k);
    }
    let lp_bytes = (2 * k as usize + 7) / 8;
    lp_bytes + stubs_size_bytes(k) + 2 + max_deltas_size_bytes(k, table)
}

/// Encode up to `EPP` table-1 `x` leaves as a flat, fixed-width `k`-bit
/// array, in whatever position order the caller already assigned them.
/// Table 1 positions aren't pairs of anything, so there's no line point
/// to take, and the sequence isn't sorted (positions are assigned by `y`
/// during matching, not by `x`), so the stub/delta split the other parks
/// use doesn't apply either.
pub fn encode_raw_park(xs: &[u64], k: u8) -> Result<Vec<u8>> {
    assert!(!xs.is_empty() && xs.len() as u64 <= EPP);
    let mut bits = ParkBits::new();
    for &x in xs {
        bits.append(x as u128, k as u32)?;
    }
    let mut out = bits.to_bytes();
    out.resize(raw_park_size_bytes(k), 0);
    Ok(out)
}

/// Decode `count` table-1 `x` leaves out of a raw park.
pub fn decode_raw_park(buf: &[u8], k: u8, count: usize) -> Result<Vec<u64>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if buf.len() * 8 < count * k as usize {
        return Err(Error::Corrupt("raw park truncated"));
    }
    Ok((0..count)
        .map(|i| slice_int_from_bytes(buf, i as u32 * k as u32, k as u32))
        .collect())
}

fn stub_delta_r(table: u8) -> f64 {
    STUB_DELTA_R[(table - 1) as usize]
}

/// Encode up to `EPP` sorted line points into a fixed-size park record.
pub fn encode_park(line_points: &[u128], k: u8, table: u8) -> Result<Vec<u8>> {
    assert!(!line_points.is_empty() && line_points.len() as u64 <= EPP);
    let stub_bits = k as u32 - STUB_BITS;

    let mut stub_seq = ParkBits::new();
    let mut small_deltas = Vec::with_capacity(line_points.len() - 1);
    for pair in line_points.windows(2) {
        let delta = pair[1] - pair[0];
        let stub = delta & ((1u128 << stub_bits) - 1);
        let small = delta >> stub_bits;
        // The ANS alphabet reserves 0xff as its bad-delta sentinel, so a
        // small_delta of 255 itself has no symbol to encode as, even
        // though it's in range for the field width.
        if small >= ans::ALPHABET as u128 {
            return Err(Error::DeltaOverflow);
        }
        stub_seq.append(stub, stub_bits)?;
        small_deltas.push(small as u8);
    }

    let ans_payload = ans::encode_deltas(&small_deltas, stub_delta_r(table))?;

    let lp_bits = ParkBits::from_value(line_points[0], 2 * k as u32)?;
    let mut out = lp_bits.to_bytes();

    let mut stub_bytes = stub_seq.to_bytes();
    stub_bytes.resize(stubs_size_bytes(k), 0);
    out.extend(stub_bytes);

    out.extend((ans_payload.len() as u16).to_le_bytes());
    out.extend(ans_payload);

    out.resize(park_size_bytes(k, table), 0);
    Ok(out)
}

/// Decode a park back into `count` sorted line points (`count` is the
/// number the plotter originally packed; the final park of a table may
/// hold fewer than `EPP`).
pub fn decode_park(buf: &[u8], k: u8, table: u8, count: usize) -> Result<Vec<u128>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let lp_bytes = (2 * k as usize + 7) / 8;
    if buf.len() < lp_bytes + stubs_size_bytes(k) + 2 {
        return Err(Error::Corrupt("park truncated"));
    }
    let first = ParkBits::from_bytes(&buf[..lp_bytes], 2 * k as usize)?.get_value();

    let mut pos = lp_bytes;
    let stubs_len = stubs_size_bytes(k);
    let stub_region = &buf[pos..pos + stubs_len];
    pos += stubs_len;

    let ans_len = u16::from_le_bytes(buf[pos..pos + 2].try_into().unwrap()) as usize;
    pos += 2;
    if buf.len() < pos + ans_len {
        return Err(Error::Corrupt("park ANS payload truncated"));
    }
    let ans_payload = &buf[pos..pos + ans_len];

    let stub_bits = k as u32 - STUB_BITS;
    let small_deltas = ans::decode_deltas(ans_payload, count - 1, stub_delta_r(table))?;

    let mut out = Vec::with_capacity(count);
    let mut lp = first;
    out.push(lp);
    for (i, &small) in small_deltas.iter().enumerate() {
        let stub = slice_int_from_bytes(stub_region, i as u32 * stub_bits, stub_bits) as u128;
        let delta = ((small as u128) << stub_bits) | stub;
        lp += delta;
        out.push(lp);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn park_roundtrips_sorted_line_points() {
        let k = 20;
        let table = 3;
        let mut lp = 0u128;
        let points: Vec<u128> = (0..EPP)
            .map(|i| {
                lp += 1 + (i % 7) as u128;
                lp
            })
            .collect();
        let encoded = encode_park(&points, k, table).unwrap();
        assert_eq!(encoded.len(), park_size_bytes(k, table));
        let decoded = decode_park(&encoded, k, table, points.len()).unwrap();
        assert_eq!(decoded, points);
    }

    #[test]
    fn park_roundtrips_partial_final_park() {
        let k = 18;
        let table = 2;
        let points: Vec<u128> = (0..37u128).map(|i| i * 3 + 1).collect();
        let encoded = encode_park(&points, k, table).unwrap();
        let decoded = decode_park(&encoded, k, table, points.len()).unwrap();
        assert_eq!(decoded, points);
    }

    #[test]
    fn raw_park_roundtrips_unsorted_leaves() {
        let k = 20;
        // Table-1 leaf order follows a y-sort, not x order, so the
        // sequence here is deliberately not monotonic.
        let xs: Vec<u64> = (0..EPP).map(|i| (i * 7919) % (1 << k)).collect();
        let encoded = encode_raw_park(&xs, k).unwrap();
        assert_eq!(encoded.len(), raw_park_size_bytes(k));
        assert_eq!(encoded.len(), park_size_bytes(k, 1));
        let decoded = decode_raw_park(&encoded, k, xs.len()).unwrap();
        assert_eq!(decoded, xs);
    }

    #[test]
    fn raw_park_roundtrips_partial_final_park() {
        let k = 18;
        let xs: Vec<u64> = (0..37u64).map(|i| i * 31 + 5).collect();
        let encoded = encode_raw_park(&xs, k).unwrap();
        let decoded = decode_raw_park(&encoded, k, xs.len()).unwrap();
        assert_eq!(decoded, xs);
    }
}
