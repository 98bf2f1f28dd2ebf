//! From-scratch AES-128/AES-256 block permutation.
//!
//! This is not a general-purpose cipher: only the forward (encryption)
//! direction is implemented, and [`encrypt_rounds`] lets a caller stop
//! after any number of rounds rather than always running the full
//! FIPS-197 schedule. The f-functions in [`crate::ffunctions`] use both
//! extremes - [`crate::ffunctions::F1Calculator`] runs the complete
//! 14-round AES-256 permutation, while F2..F7 run only 2 rounds of
//! AES-128 as a cheap, non-invertible-in-practice mixing step. Neither
//! use case needs decryption, constant-time execution, or hardware
//! intrinsics, so this stays a plain lookup-table implementation.

// Forward S-box: multiplicative inverse in GF(2^8) composed with a fixed
// affine transform. The affine step is what keeps the S-box from being
// expressible as a low-degree rational function, which is what makes
// SubBytes resistant to algebraic and linear attacks.
// https://en.wikipedia.org/wiki/Rijndael_S-box
const SBOX: [u8; 256] = [
    0x63, 0x7C, 0x77, 0x7B, 0xF2, 0x6B, 0x6F, 0xC5, 0x30, 0x01, 0x67, 0x2B, 0xFE, 0xD7, 0xAB, 0x76,
    0xCA, 0x82, 0xC9, 0x7D, 0xFA, 0x59, 0x47, 0xF0, 0xAD, 0xD4, 0xA2, 0xAF, 0x9C, 0xA4, 0x72, 0xC0,
    0xB7, 0xFD, 0x93, 0x26, 0x36, 0x3F, 0xF7, 0xCC, 0x34, 0xA5, 0xE5, 0xF1, 0x71, 0xD8, 0x31, 0x15,
    0x04, 0xC7, 0x23, 0xC3, 0x18, 0x96, 0x05, 0x9A, 0x07, 0x12, 0x80, 0xE2, 0xEB, 0x27, 0xB2, 0x75,
    0x09, 0x83, 0x2C, 0x1A, 0x1B, 0x6E, 0x5A, 0xA0, 0x52, 0x3B, 0xD6, 0xB3, 0x29, 0xE3, 0x2F, 0x84,
    0x53, 0xD1, 0x00, 0xED, 0x20, 0xFC, 0xB1, 0x5B, 0x6A, 0xCB, 0xBE, 0x39, 0x4A, 0x4C, 0x58, 0xCF,
    0xD0, 0xEF, 0xAA, 0xFB, 0x43, 0x4D, 0x33, 0x85, 0x45, 0xF9, 0x02, 0x7F, 0x50, 0x3C, 0x9F, 0xA8,
    0x51, 0xA3, 0x40, 0x8F, 0x92, 0x9D, 0x38, 0xF5, 0xBC, 0xB6, 0xDA, 0x21, 0x10, 0xFF, 0xF3, 0xD2,
    0xCD, 0x0C, 0x13, 0xEC, 0x5F, 0x97, 0x44, 0x17, 0xC4, 0xA7, 0x7E, 0x3D, 0x64, 0x5D, 0x19, 0x73,
    0x60, 0x81, 0x4F, 0xDC, 0x22, 0x2A, 0x90, 0x88, 0x46, 0xEE, 0xB8, 0x14, 0xDE, 0x5E, 0x0B, 0xDB,
    0xE0, 0x32, 0x3A, 0x0A, 0x49, 0x06, 0x24, 0x5C, 0xC2, 0xD3, 0xAC, 0x62, 0x91, 0x95, 0xE4, 0x79,
    0xE7, 0xC8, 0x37, 0x6D, 0x8D, 0xD5, 0x4E, 0xA9, 0x6C, 0x56, 0xF4, 0xEA, 0x65, 0x7A, 0xAE, 0x08,
    0xBA, 0x78, 0x25, 0x2E, 0x1C, 0xA6, 0xB4, 0xC6, 0xE8, 0xDD, 0x74, 0x1F, 0x4B, 0xBD, 0x8B, 0x8A,
    0x70, 0x3E, 0xB5, 0x66, 0x48, 0x03, 0xF6, 0x0E, 0x61, 0x35, 0x57, 0xB9, 0x86, 0xC1, 0x1D, 0x9E,
    0xE1, 0xF8, 0x98, 0x11, 0x69, 0xD9, 0x8E, 0x94, 0x9B, 0x1E, 0x87, 0xE9, 0xCE, 0x55, 0x28, 0xDF,
    0x8C, 0xA1, 0x89, 0x0D, 0xBF, 0xE6, 0x42, 0x68, 0x41, 0x99, 0x2D, 0x0F, 0xB0, 0x54, 0xBB, 0x16,
];

/// State block, column-major (bytes 0..4 are column 0, etc.), per FIPS-197.
type Block = [u8; 16];

/// Multiply two bytes in GF(2^8) under AES's reduction polynomial
/// `x^8 + x^4 + x^3 + x + 1` (0x11B). Used by MixColumns.
#[inline]
fn gmul(mut a: u8, mut b: u8) -> u8 {
    let mut p = 0u8;
    for _ in 0..8 {
        if b & 1 != 0 {
            p ^= a;
        }
        let hi = a & 0x80 != 0;
        a <<= 1;
        if hi {
            a ^= 0x1B;
        }
        b >>= 1;
    }
    p
}

fn sub_bytes(s: &mut Block) {
    for b in s.iter_mut() {
        *b = SBOX[*b as usize];
    }
}

/// Row `i` (in column-major storage, bytes `{i, i+4, i+8, i+12}`) is
/// cyclically left-shifted by `i` positions.
fn shift_rows(s: &mut Block) {
    let t = s[1];
    s[1] = s[5];
    s[5] = s[9];
    s[9] = s[13];
    s[13] = t;
    s.swap(2, 10);
    s.swap(6, 14);
    let t = s[15];
    s[15] = s[11];
    s[11] = s[7];
    s[7] = s[3];
    s[3] = t;
}

/// Multiply each column, read as a degree-3 polynomial over GF(2^8), by
/// the fixed MDS matrix with rows `[2, 3, 1, 1]` (cyclically shifted).
fn mix_columns(s: &mut Block) {
    for i in 0..4 {
        let b = i * 4;
        let (s0, s1, s2, s3) = (s[b], s[b + 1], s[b + 2], s[b + 3]);
        s[b] = gmul(0x02, s0) ^ gmul(0x03, s1) ^ s2 ^ s3;
        s[b + 1] = s0 ^ gmul(0x02, s1) ^ gmul(0x03, s2) ^ s3;
        s[b + 2] = s0 ^ s1 ^ gmul(0x02, s2) ^ gmul(0x03, s3);
        s[b + 3] = gmul(0x03, s0) ^ s1 ^ s2 ^ gmul(0x02, s3);
    }
}

fn add_round_key(s: &mut Block, rk: &[u8]) {
    for (b, k) in s.iter_mut().zip(rk.iter()) {
        *b ^= k;
    }
}

/// Expand a 128-bit key into 11 round keys (176 bytes).
pub(crate) fn key_expand_128(key: &[u8; 16]) -> [u8; 176] {
    let mut w = [0u8; 176];
    w[..16].copy_from_slice(key);
    const RCON: [u8; 10] = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80, 0x1B, 0x36];
    for i in 4..44usize {
        let mut t = [
            w[(i - 1) * 4],
            w[(i - 1) * 4 + 1],
            w[(i - 1) * 4 + 2],
            w[(i - 1) * 4 + 3],
        ];
        if i % 4 == 0 {
            t = [t[1], t[2], t[3], t[0]];
            t = [
                SBOX[t[0] as usize] ^ RCON[i / 4 - 1],
                SBOX[t[1] as usize],
                SBOX[t[2] as usize],
                SBOX[t[3] as usize],
            ];
        }
        for j in 0..4 {
            w[i * 4 + j] = w[(i - 4) * 4 + j] ^ t[j];
        }
    }
    w
}

/// Expand a 256-bit key into 15 round keys (240 bytes). Differs from the
/// 128-bit schedule by an extra SubWord applied at every fourth word that
/// is not itself a RotWord boundary (`i % 8 == 4`).
pub(crate) fn key_expand_256(key: &[u8; 32]) -> [u8; 240] {
    let mut w = [0u8; 240];
    w[..32].copy_from_slice(key);
    const RCON: [u8; 7] = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40];
    for i in 8..60usize {
        let mut t = [
            w[(i - 1) * 4],
            w[(i - 1) * 4 + 1],
            w[(i - 1) * 4 + 2],
            w[(i - 1) * 4 + 3],
        ];
        if i % 8 == 0 {
            t = [t[1], t[2], t[3], t[0]];
            t = [
                SBOX[t[0] as usize] ^ RCON[i / 8 - 1],
                SBOX[t[1] as usize],
                SBOX[t[2] as usize],
                SBOX[t[3] as usize],
            ];
        } else if i % 8 == 4 {
            t = [
                SBOX[t[0] as usize],
                SBOX[t[1] as usize],
                SBOX[t[2] as usize],
                SBOX[t[3] as usize],
            ];
        }
        for j in 0..4 {
            w[i * 4 + j] = w[(i - 8) * 4 + j] ^ t[j];
        }
    }
    w
}

/// Encrypt one block, running `rounds` full rounds (SubBytes, ShiftRows,
/// MixColumns, AddRoundKey) followed by one final round that omits
/// MixColumns, per the standard AES round structure.
///
/// `round_keys` must hold at least `(rounds + 1) * 16` bytes. Passing
/// `rounds = 10` with a 128-bit schedule or `rounds = 14` with a 256-bit
/// schedule reproduces standard AES-128/AES-256. F2..F7 call this with
/// `rounds = 2` and only the first three round keys of a 128-bit
/// schedule - a deliberately truncated, non-standard permutation used
/// purely as a mixing step, not as a cipher.
pub(crate) fn encrypt_rounds(block: &Block, round_keys: &[u8], rounds: usize) -> Block {
    assert!(round_keys.len() >= (rounds + 1) * 16);
    let mut s = *block;
    add_round_key(&mut s, &round_keys[..16]);
    for round in 1..rounds {
        sub_bytes(&mut s);
        shift_rows(&mut s);
        mix_columns(&mut s);
        add_round_key(&mut s, &round_keys[round * 16..(round + 1) * 16]);
    }
    sub_bytes(&mut s);
    shift_rows(&mut s);
    add_round_key(&mut s, &round_keys[rounds * 16..(rounds + 1) * 16]);
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    // FIPS-197 Appendix B: AES-128 known-answer test.
    #[test]
    fn aes128_matches_fips197_vector() {
        let key: [u8; 16] = [
            0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf,
            0x4f, 0x3c,
        ];
        let plaintext: Block = [
            0x32, 0x43, 0xf6, 0xa8, 0x88, 0x5a, 0x30, 0x8d, 0x31, 0x31, 0x98, 0xa2, 0xe0, 0x37,
            0x07, 0x34,
        ];
        let expected: Block = [
            0x39, 0x25, 0x84, 0x1d, 0x02, 0xdc, 0x09, 0xfb, 0xdc, 0x11, 0x85, 0x97, 0x19, 0x6a,
            0x0b, 0x32,
        ];
        let rk = key_expand_128(&key);
        assert_eq!(encrypt_rounds(&plaintext, &rk, 10), expected);
    }

    #[test]
    fn truncated_rounds_are_deterministic_and_diffuse() {
        let key = [0u8; 16];
        let rk = key_expand_128(&key);
        let a = encrypt_rounds(&[0u8; 16], &rk, 2);
        let mut flipped = [0u8; 16];
        flipped[0] = 1;
        let b = encrypt_rounds(&flipped, &rk, 2);
        assert_ne!(a, b);
        assert_eq!(a, encrypt_rounds(&[0u8; 16], &rk, 2));
    }

    #[test]
    fn aes256_runs_fourteen_rounds() {
        let key = [7u8; 32];
        let rk = key_expand_256(&key);
        let out = encrypt_rounds(&[0u8; 16], &rk, 14);
        // Not a published KAT; just confirms the 15-key schedule is consumed
        // without panicking and produces non-trivial output.
        assert_ne!(out, [0u8; 16]);
    }
}
