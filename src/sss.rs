//! Shamir Secret Sharing over GF(2^8).
//!
//! - AES field polynomial x^8 + x^4 + x^3 + x + 1.
//! - Secret is 32 bytes; every byte is the constant term of its own
//!   degree-(k−1) polynomial with random coefficients.
//! - Share `i` holds x = i and the 32 polynomial values at x (see
//!   [`crate::share`] for the layout).
//! - Threshold K ∈ [1, N], total shares N ∈ [1, 255].

use rand_core::{CryptoRng, OsRng, RngCore};
use tracing::trace;
use zeroize::{Zeroize, Zeroizing};

use crate::error::SssError;
use crate::secret::Secret;
use crate::share::{Share, SHARE_LEN};

pub const SECRET_LEN: usize = 32;

/// Split `secret` into `n` shares with threshold `k`.
///
/// Returns `n` shares with sequential indices 1..=n. Two calls with the
/// same secret produce different shares.
pub fn create_shares(secret: &[u8], n: u8, k: u8) -> Result<Vec<Share>, SssError> {
    create_shares_with_rng(secret, n, k, &mut OsRng)
}

/// Split with an explicit RNG (useful for deterministic tests).
pub fn create_shares_with_rng<R: RngCore + CryptoRng>(
    secret: &[u8],
    n: u8,
    k: u8,
    rng: &mut R,
) -> Result<Vec<Share>, SssError> {
    if n == 0 {
        return Err(SssError::InvalidNParam);
    }
    if k == 0 || k > n {
        return Err(SssError::InvalidKParam);
    }
    if secret.len() != SECRET_LEN {
        return Err(SssError::InvalidInputLength);
    }

    let kt = k as usize;

    // coeffs[byte * k + d]: d = 0 is the secret byte, d >= 1 random.
    let mut coeffs = Zeroizing::new(vec![0u8; SECRET_LEN * kt]);
    for (b, &s) in secret.iter().enumerate() {
        let row = &mut coeffs[b * kt..(b + 1) * kt];
        row[0] = s;
        rng.fill_bytes(&mut row[1..]);
    }

    let mut out = Vec::with_capacity(n as usize);
    for x in 1..=n {
        let mut y = [0u8; SECRET_LEN];
        for (b, val) in y.iter_mut().enumerate() {
            *val = eval_poly(&coeffs[b * kt..(b + 1) * kt], x);
        }
        out.push(Share::new(x, y));
        y.zeroize();
    }

    trace!(n, k, "created shares");
    Ok(out)
}

/// Reconstruct the secret from shares via Lagrange interpolation at x = 0.
///
/// Every supplied share takes part. The math cannot tell whether enough
/// shares were given: with fewer than `k` the result is `Some` of the wrong
/// bytes, so callers must check it against a stored hash.
///
/// Returns `Ok(None)` when interpolation is impossible: a share with index
/// 0, or two shares with the same index.
pub fn combine_shares<S: AsRef<[u8]>>(shares: &[S]) -> Result<Option<Secret>, SssError> {
    if shares.is_empty() {
        return Err(SssError::SharesArrayEmpty);
    }
    for (i, s) in shares.iter().enumerate() {
        if s.as_ref().len() != SHARE_LEN {
            return Err(SssError::BadShareLength(i));
        }
    }

    let xs: Vec<u8> = shares.iter().map(|s| s.as_ref()[0]).collect();
    for i in 0..xs.len() {
        if xs[i] == 0 {
            trace!(share = i, "share has index 0");
            return Ok(None);
        }
        if xs[i + 1..].contains(&xs[i]) {
            trace!(index = xs[i], "duplicate share index");
            return Ok(None);
        }
    }

    // Lagrange basis at zero depends only on the x values, so compute it
    // once and reuse it for every byte.
    let basis = lagrange_basis_at_zero(&xs);

    let mut secret = [0u8; SECRET_LEN];
    for (b, out) in secret.iter_mut().enumerate() {
        let mut acc = 0u8;
        for (s, &l) in shares.iter().zip(&basis) {
            acc = gf_add(acc, gf_mul(s.as_ref()[1 + b], l));
        }
        *out = acc;
    }

    let recovered = Secret::from(secret);
    secret.zeroize();
    Ok(Some(recovered))
}

// ---------------------------------------------------------------------------
// GF(2^8) arithmetic — irreducible polynomial x^8 + x^4 + x^3 + x + 1
// ---------------------------------------------------------------------------

/// Reduction constant: low bits of 0x11B.
const POLY: u8 = 0x1B;

/// Evaluate polynomial at point x using Horner's method.
fn eval_poly(coeffs: &[u8], x: u8) -> u8 {
    let mut acc = 0u8;
    for &c in coeffs.iter().rev() {
        acc = gf_add(gf_mul(acc, x), c);
    }
    acc
}

/// Lagrange coefficients l_i(0) = Π_{j≠i} x_j / (x_i − x_j).
fn lagrange_basis_at_zero(xs: &[u8]) -> Vec<u8> {
    (0..xs.len())
        .map(|i| {
            let mut num = 1u8;
            let mut den = 1u8;
            for (j, &xj) in xs.iter().enumerate() {
                if i == j {
                    continue;
                }
                num = gf_mul(num, xj);
                den = gf_mul(den, gf_add(xs[i], xj)); // sub = add in GF(2^n)
            }
            gf_mul(num, gf_inv(den))
        })
        .collect()
}

#[inline]
fn gf_add(a: u8, b: u8) -> u8 {
    a ^ b
}

/// Russian-peasant multiplication, fixed 8 rounds with masks instead of
/// branches on secret data.
fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut p = 0u8;
    for _ in 0..8 {
        p ^= a & (b & 1).wrapping_neg();
        let hi = (a >> 7).wrapping_neg();
        a = (a << 1) ^ (POLY & hi);
        b >>= 1;
    }
    p
}

/// Multiplicative inverse a^254. Returns 0 for 0.
fn gf_inv(a: u8) -> u8 {
    let mut r = 1u8;
    let mut base = a;
    let mut e = 254u8;
    while e > 0 {
        if e & 1 != 0 {
            r = gf_mul(r, base);
        }
        base = gf_mul(base, base);
        e >>= 1;
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_secret() -> [u8; SECRET_LEN] {
        let mut secret = [0u8; SECRET_LEN];
        OsRng.fill_bytes(&mut secret);
        secret
    }

    #[test]
    fn split_combine_roundtrip() {
        let secret = [42u8; SECRET_LEN];
        let shares = create_shares(&secret, 5, 3).unwrap();
        assert_eq!(shares.len(), 5);
        let recovered = combine_shares(&shares[..3]).unwrap().unwrap();
        assert_eq!(recovered.as_bytes(), &secret);
    }

    #[test]
    fn two_of_two_either_order() {
        let secret = random_secret();
        let shares = create_shares(&secret, 2, 2).unwrap();
        let forward = combine_shares(&shares).unwrap().unwrap();
        let reversed = combine_shares(&[shares[1].clone(), shares[0].clone()])
            .unwrap()
            .unwrap();
        assert_eq!(forward.as_bytes(), &secret);
        assert_eq!(reversed.as_bytes(), &secret);
    }

    #[test]
    fn different_subsets_work() {
        let secret = random_secret();
        let shares = create_shares(&secret, 7, 4).unwrap();
        let subset = vec![
            shares[1].clone(),
            shares[3].clone(),
            shares[4].clone(),
            shares[6].clone(),
        ];
        let recovered = combine_shares(&subset).unwrap().unwrap();
        assert_eq!(recovered.as_bytes(), &secret);
    }

    #[test]
    fn all_thresholds_for_small_n() {
        let secret = random_secret();
        for n in 1..=8u8 {
            for k in 1..=n {
                let shares = create_shares(&secret, n, k).unwrap();
                // Last k shares, to avoid always starting at index 1.
                let subset = &shares[(n - k) as usize..];
                let recovered = combine_shares(subset).unwrap().unwrap();
                assert_eq!(recovered.as_bytes(), &secret, "k={k} n={n}");
            }
        }
    }

    #[test]
    fn max_share_count() {
        let secret = random_secret();
        let shares = create_shares(&secret, 255, 3).unwrap();
        assert_eq!(shares.len(), 255);
        assert_eq!(shares[254].index(), 255);
        let subset = vec![shares[0].clone(), shares[127].clone(), shares[254].clone()];
        let recovered = combine_shares(&subset).unwrap().unwrap();
        assert_eq!(recovered.as_bytes(), &secret);
    }

    #[test]
    fn threshold_one_shares_equal_secret() {
        let secret = random_secret();
        let shares = create_shares(&secret, 3, 1).unwrap();
        for s in &shares {
            assert_eq!(s.payload(), &secret);
        }
    }

    #[test]
    fn shares_differ_between_calls() {
        let secret = [9u8; SECRET_LEN];
        let a = create_shares(&secret, 2, 2).unwrap();
        let b = create_shares(&secret, 2, 2).unwrap();
        assert_ne!(a[0], b[0]);
    }

    #[test]
    fn parameter_validation() {
        let secret = [1u8; SECRET_LEN];
        assert_eq!(create_shares(&secret, 0, 0), Err(SssError::InvalidNParam));
        assert_eq!(create_shares(&secret, 3, 0), Err(SssError::InvalidKParam));
        assert_eq!(create_shares(&secret, 3, 5), Err(SssError::InvalidKParam));
        assert_eq!(
            create_shares(&secret[..31], 2, 2),
            Err(SssError::InvalidInputLength)
        );
        assert_eq!(
            create_shares(&[0u8; 64], 2, 2),
            Err(SssError::InvalidInputLength)
        );
    }

    #[test]
    fn combine_validation() {
        let empty: [Share; 0] = [];
        assert_eq!(combine_shares(&empty), Err(SssError::SharesArrayEmpty));

        let shares = create_shares(&[3u8; SECRET_LEN], 2, 2).unwrap();
        let raw: Vec<Vec<u8>> = vec![shares[0].as_bytes().to_vec(), vec![0u8; 40]];
        assert_eq!(combine_shares(&raw), Err(SssError::BadShareLength(1)));
    }

    #[test]
    fn too_few_shares_give_garbage_not_panic() {
        let secret = random_secret();
        let shares = create_shares(&secret, 5, 3).unwrap();
        let recovered = combine_shares(&shares[..2]).unwrap();
        if let Some(r) = recovered {
            assert_ne!(r.as_bytes(), &secret);
        }
    }

    #[test]
    fn duplicate_or_zero_index_yields_none() {
        let shares = create_shares(&[9u8; SECRET_LEN], 3, 2).unwrap();
        let dupes = vec![shares[0].clone(), shares[0].clone()];
        assert!(combine_shares(&dupes).unwrap().is_none());

        let mut zero = shares[1].as_bytes().to_vec();
        zero[0] = 0;
        let raw = vec![shares[0].as_bytes().to_vec(), zero];
        assert!(combine_shares(&raw).unwrap().is_none());
    }

    #[test]
    fn wrong_shares_produce_wrong_secret() {
        let secret = [0xab; SECRET_LEN];
        let shares = create_shares(&secret, 5, 3).unwrap();
        let mut bad = shares[2].as_bytes().to_vec();
        bad[1] ^= 0xff;
        let subset = vec![
            shares[0].as_bytes().to_vec(),
            shares[1].as_bytes().to_vec(),
            bad,
        ];
        let recovered = combine_shares(&subset).unwrap().unwrap();
        assert_ne!(recovered.as_bytes(), &secret);
    }

    // GF(2^8) sanity checks.
    #[test]
    fn gf_mul_identity_and_known_values() {
        for a in 0u8..=255 {
            assert_eq!(gf_mul(a, 1), a);
            assert_eq!(gf_mul(1, a), a);
            assert_eq!(gf_mul(a, 0), 0);
        }
        // FIPS-197 examples.
        assert_eq!(gf_mul(0x57, 0x83), 0xc1);
        assert_eq!(gf_mul(0x57, 0x13), 0xfe);
    }

    #[test]
    fn gf_inv_roundtrip() {
        assert_eq!(gf_inv(0), 0);
        for a in 1u8..=255 {
            assert_eq!(gf_mul(a, gf_inv(a)), 1, "gf_inv failed for {a}");
        }
    }
}
