//! Blind RSA issuance of voting credentials.
//!
//! The signer sees only a blinded serial and signs it obliviously; the
//! client strips the blinding factor and holds a valid signature over the
//! original serial. Signatures are over the raw serial integer, so the
//! verifier must also enforce one-shot serial usage.

use num_bigint_dig::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::One;
use rand::Rng;
use thiserror::Error;

use crate::group::mod_inverse;
use crate::keys::RsaKeyPair;

const LOG_TARGET: &str = "ballot::blind";

/// Bit size of the blinding factor.
const BLINDING_BITS: usize = 128;

/// Draw attempts before giving up on a unit blinding factor.
const COPRIME_ATTEMPTS: usize = 64;

#[derive(Debug, Error)]
pub enum BlindError {
    #[error("no blinding factor coprime to the modulus after {0} attempts")]
    CoprimeExhausted(usize),
    #[error("blinding factor is not invertible")]
    NotInvertible,
}

/// Signer side: raw RSA exponentiation of whatever blinded value arrives.
/// Authorization of the requester happens before this is called.
pub struct BlindSigner<'a> {
    key: &'a RsaKeyPair,
}

impl<'a> BlindSigner<'a> {
    pub fn new(key: &'a RsaKeyPair) -> Self {
        Self { key }
    }

    pub fn sign(&self, blinded: &BigUint) -> BigUint {
        blinded.modpow(self.key.secret(), &self.key.n)
    }
}

/// A blinded message together with the factor needed to unblind the
/// eventual signature.
pub struct BlindedMessage {
    pub blinded: BigUint,
    pub unblinder: BigUint,
}

/// Client side of the blind signature protocol; needs only `(n, e)`.
#[derive(Debug, Clone)]
pub struct BlindClient {
    pub n: BigUint,
    pub e: BigUint,
}

impl BlindClient {
    pub fn new(n: BigUint, e: BigUint) -> Self {
        Self { n, e }
    }

    /// `m' = m * r^e mod n` for a fresh unit `r`.
    pub fn blind<R: Rng>(
        &self,
        message: &BigUint,
        rng: &mut R,
    ) -> Result<BlindedMessage, BlindError> {
        let one = BigUint::one();
        for attempt in 0..COPRIME_ATTEMPTS {
            let r = rng.gen_biguint(BLINDING_BITS);
            if r <= one || r >= self.n || r.gcd(&self.n) != one {
                tracing::debug!(target: LOG_TARGET, attempt, "rejected blinding factor");
                continue;
            }
            let blinded = (message * r.modpow(&self.e, &self.n)) % &self.n;
            return Ok(BlindedMessage {
                blinded,
                unblinder: r,
            });
        }
        Err(BlindError::CoprimeExhausted(COPRIME_ATTEMPTS))
    }

    /// `s = s' * r^{-1} mod n`; satisfies `s^e = m mod n`.
    pub fn unblind(
        &self,
        signed_blinded: &BigUint,
        unblinder: &BigUint,
    ) -> Result<BigUint, BlindError> {
        let r_inv = mod_inverse(unblinder, &self.n).ok_or(BlindError::NotInvertible)?;
        Ok((signed_blinded * r_inv) % &self.n)
    }
}

/// Raw RSA verification: `signature^e mod n == message`.
pub fn verify_raw_signature(
    n: &BigUint,
    e: &BigUint,
    message: &BigUint,
    signature: &BigUint,
) -> bool {
    signature.modpow(e, n) == message % n
}
