use num_bigint_dig::BigUint;
use num_traits::One;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::group::{GroupError, GroupParams};

/// Largest plaintext the engine will encrypt. Decryption requires solving a
/// discrete log by exhaustion, so plaintexts (and therefore tally totals)
/// must stay small.
pub const MAX_PLAINTEXT: u64 = 1_000_000;

#[derive(Debug, Error)]
pub enum ElGamalError {
    #[error("plaintext {0} exceeds the supported range")]
    PlaintextTooLarge(u64),
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(#[from] GroupError),
    #[error("no exponent in 0..={bound} matches the decrypted value")]
    OutOfRange { bound: u64 },
}

/// Exponential ElGamal ciphertext `(alpha, beta) = (g^r, g^m * y^r)`.
///
/// Encoding the plaintext in the exponent makes ciphertext multiplication
/// add plaintexts, which is what the homomorphic tally relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    #[serde(with = "crate::num_serde::dec")]
    pub alpha: BigUint,
    #[serde(with = "crate::num_serde::dec")]
    pub beta: BigUint,
}

/// Encrypt `m` under `y`, returning the randomness alongside the ciphertext.
/// The caller needs `r` to build the ballot well-formedness proof.
pub fn encrypt<R: Rng>(
    group: &GroupParams,
    y: &BigUint,
    m: u64,
    rng: &mut R,
) -> Result<(BigUint, Ciphertext), ElGamalError> {
    if m > MAX_PLAINTEXT {
        return Err(ElGamalError::PlaintextTooLarge(m));
    }
    let r = group.random_scalar(rng);
    let ciphertext = encrypt_with_randomness(group, y, m, &r);
    Ok((r, ciphertext))
}

pub fn encrypt_with_randomness(
    group: &GroupParams,
    y: &BigUint,
    m: u64,
    r: &BigUint,
) -> Ciphertext {
    let alpha = group.pow_g(r);
    let g_m = group.pow_g(&BigUint::from(m));
    let y_r = group.pow(y, r);
    let beta = group.mul(&g_m, &y_r);
    Ciphertext { alpha, beta }
}

/// Strip the randomness, returning `g^m`. Recovering `m` itself is a
/// separate exhaustive step, see [`recover_exponent`].
pub fn decrypt(
    group: &GroupParams,
    x: &BigUint,
    ciphertext: &Ciphertext,
) -> Result<BigUint, ElGamalError> {
    let shared = group.pow(&ciphertext.alpha, x);
    let shared_inv = group.inv(&shared)?;
    Ok(group.mul(&ciphertext.beta, &shared_inv))
}

/// Solve `g^m = target` for `m` by walking `m = 0..=bound`.
pub fn recover_exponent(
    group: &GroupParams,
    target: &BigUint,
    bound: u64,
) -> Result<u64, ElGamalError> {
    let mut accum = BigUint::one();
    for m in 0..=bound {
        if accum == *target {
            return Ok(m);
        }
        accum = group.mul(&accum, &group.g);
    }
    Err(ElGamalError::OutOfRange { bound })
}

/// Multiply in a fresh encryption of zero: `(alpha * g^r, beta * y^r)`.
/// The plaintext is unchanged.
pub fn rerandomize(
    group: &GroupParams,
    y: &BigUint,
    ciphertext: &Ciphertext,
    r: &BigUint,
) -> Ciphertext {
    Ciphertext {
        alpha: group.mul(&ciphertext.alpha, &group.pow_g(r)),
        beta: group.mul(&ciphertext.beta, &group.pow(y, r)),
    }
}
