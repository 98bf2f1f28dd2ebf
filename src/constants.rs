//! Fixed parameters of the proof-of-space construction.
//!
//! These are not configuration — they are constants of the scheme itself,
//! shared by the plotter, the prover, and the verifier.

/// Minimum supported `k`.
pub const K_MIN: u8 = 15;
/// Maximum supported `k`.
pub const K_MAX: u8 = 59;

/// Extra bits appended to every f-function output, beyond the `k` bits
/// that actually identify a bucket. Reduces spurious collisions in matches.
pub const E: u32 = 5;
/// `2^E`, the number of candidate `m` values considered per match lookup.
pub const E_POW: u32 = 1 << E;

/// B-group size.
pub const B: u32 = 60;
/// C-group size.
pub const C: u32 = 509;
/// `B * C`, the size of one bucket-pair (BC group).
pub const BC: u32 = B * C;

/// Entries packed into one park.
pub const EPP: u64 = 2048;

/// Number of low bits of a line-point delta kept as an incompressible stub.
pub const STUB_BITS: u32 = 3;

/// Interval between successive C1 checkpoints (in f7-sorted entries).
pub const CP1: u64 = 10_000;
/// Interval between successive C2 checkpoints, in units of C1 entries.
pub const CP2: u64 = 10_000;

/// `log2` of the batch size used by F1's batch AES evaluation.
pub const BATCH_LOG: u32 = 8;

/// Number of function tables (T1..T7).
pub const TABLES: u8 = 7;

/// Back-pointer write lag maintained during phase 2's co-iteration.
pub const READ_MINUS_WRITE: usize = 2048;
/// Sliding "used" bitmap window size for phase 2/3 co-iteration.
pub const CACHED_POSITIONS_SIZE: usize = 8192;

/// Metadata multiplier `m_t`, in units of `k` bits, indexed by table number
/// `t` (index 0 and 1 are unused placeholders so `META_MULTIPLIER[t]` reads
/// naturally for `t` in `2..=8`).
pub const META_MULTIPLIER: [u32; 9] = [0, 0, 1, 2, 4, 4, 3, 2, 0];

/// ANS R-parameter for stub/delta coding in tables 1..=6, indexed `t - 1`.
pub const STUB_DELTA_R: [f64; 6] = [4.7, 2.75, 2.75, 2.7, 2.6, 2.45];

/// ANS R-parameter used for C3 delta coding.
pub const C3_R: f64 = 1.0;

/// Approximate max bits of a delta's encoded representation per table,
/// used to size the fixed ANS payload region of a park. `D(1) = 5.6`,
/// `D(2) = 3.5`, `D(>=3) = 3.5`.
pub fn max_delta_bits_per_entry(table: u8) -> f64 {
    match table {
        1 => 5.6,
        _ => 3.5,
    }
}

/// `k * m_t`, the metadata width in bits for table `t`.
pub fn meta_bits(k: u8, table: u8) -> u32 {
    k as u32 * META_MULTIPLIER[table as usize]
}

/// Validate that `k` is in the supported range.
pub fn check_k(k: u8) -> crate::Result<()> {
    if (K_MIN..=K_MAX).contains(&k) {
        Ok(())
    } else {
        Err(crate::Error::InvalidK(k))
    }
}
