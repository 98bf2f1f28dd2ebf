//! Independent re-derivation of a proof: replay every `f`-function layer
//! from the claimed `x` values and check the match invariant holds at
//! every step, without trusting anything the prover computed.

use sha2::{Digest, Sha256};

use crate::bits::{slice_int_from_bytes, ParkBits};
use crate::constants::{BC, E};
use crate::error::{Error, Result};
use crate::ffunctions::{F1Calculator, FxCalculator};
use crate::matching::{find_matches, BucketEntry};

/// Re-evaluate a 64-`x` proof layer by layer and check it resolves to
/// `challenge`'s top `k` bits.
pub fn verify_proof(seed: &[u8; 32], k: u8, challenge: &[u8; 32], proof: &[u64]) -> Result<bool> {
    if proof.len() != 64 {
        return Err(Error::Parse("proof must contain exactly 64 x values"));
    }

    let f1 = F1Calculator::new(k, seed);
    let mut ys: Vec<u64> = proof.iter().map(|&x| f1.calculate_f(x)).collect();
    let mut metas: Vec<ParkBits> = proof
        .iter()
        .map(|&x| ParkBits::from_value(x as u128, k as u32))
        .collect::<Result<Vec<_>>>()?;

    for table in 2..=7u8 {
        let fx = FxCalculator::new(table, k, seed);
        let mut next_ys = Vec::with_capacity(ys.len() / 2);
        let mut next_metas = Vec::with_capacity(ys.len() / 2);

        for i in (0..ys.len()).step_by(2) {
            let (yl, yr) = (ys[i], ys[i + 1]);
            if !is_valid_match(yl, yr) {
                return Ok(false);
            }

            let meta_l = &metas[i];
            let meta_r = &metas[i + 1];
            let mut y_new = fx.calculate_f(yl, meta_l, meta_r);
            if table == 7 {
                y_new >>= E;
            }
            next_ys.push(y_new);
            next_metas.push(fx.compose_metadata(meta_l, meta_r));
        }

        ys = next_ys;
        metas = next_metas;
    }

    let target = slice_int_from_bytes(challenge, 0, k as u32);
    Ok(ys[0] == target)
}

fn is_valid_match(yl: u64, yr: u64) -> bool {
    let bl = yl / BC as u64;
    let br = yr / BC as u64;
    if br != bl + 1 {
        return false;
    }
    let l = [BucketEntry { y: yl, index: 0 }];
    let r = [BucketEntry { y: yr, index: 0 }];
    !find_matches(&l, &r).is_empty()
}

/// Derive the quality string a verified proof offers toward a challenge.
///
/// Mirrors the match-finding bit budget: 5 bits immediately after the
/// challenge's `k`-bit match prefix select one of the proof's 32 `x`
/// pairs, and the quality string is `SHA256(challenge || x_small ||
/// x_large)` for that pair.
pub fn quality_string(k: u8, challenge: &[u8; 32], proof: &[u64]) -> Result<[u8; 32]> {
    if proof.len() != 64 {
        return Err(Error::Parse("proof must contain exactly 64 x values"));
    }
    let pair_index = slice_int_from_bytes(challenge, k as u32, E) as usize % 32;
    let (a, b) = (proof[2 * pair_index], proof[2 * pair_index + 1]);
    let (x_small, x_large) = if a <= b { (a, b) } else { (b, a) };

    let mut hasher = Sha256::new();
    hasher.update(challenge);
    hasher.update(x_small.to_be_bytes());
    hasher.update(x_large.to_be_bytes());
    Ok(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::{Plotter, PlotterConfig};
    use crate::prover::Prover;

    #[test]
    fn verifies_a_real_plotted_proof() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.plot");
        let seed = [21u8; 32];

        let config = PlotterConfig {
            k: 16,
            seed,
            memo: Vec::new(),
        };
        Plotter::new(config).unwrap().create_plot_file(&path).unwrap();

        let prover = Prover::open(&path).unwrap();
        let c1 = {
            // Reuse a C1 checkpoint value as a guaranteed-present y.
            let positions = (0..u16::MAX)
                .find_map(|hi| {
                    let mut challenge = [0u8; 32];
                    challenge[0..2].copy_from_slice(&hi.to_be_bytes());
                    let found = prover.qualifying_positions(&challenge).ok()?;
                    if found.is_empty() {
                        None
                    } else {
                        Some((challenge, found))
                    }
                })
                .expect("some 16-bit prefix must match at k=16");
            positions
        };
        let (challenge, positions) = c1;
        let proof = prover.full_proof(positions[0]).unwrap();
        assert!(verify_proof(&seed, 16, &challenge, &proof).unwrap());

        let quality = quality_string(16, &challenge, &proof).unwrap();
        assert_eq!(quality.len(), 32);
    }

    #[test]
    fn rejects_wrong_length_proof() {
        let seed = [1u8; 32];
        let challenge = [0u8; 32];
        assert!(matches!(
            verify_proof(&seed, 20, &challenge, &[1, 2, 3]),
            Err(Error::Parse(_))
        ));
    }
}
