use num_bigint_dig::prime::probably_prime;
use num_bigint_dig::traits::ModInverse;
use num_bigint_dig::{BigInt, BigUint, RandBigInt, RandPrime};
use num_traits::One;
use rand::Rng;
use thiserror::Error;

const LOG_TARGET: &str = "ballot::group";

/// Miller-Rabin rounds for the `p = 2q + 1` check during generation.
const PRIMALITY_ROUNDS: usize = 20;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("group size of {0} bits is below the supported minimum")]
    BitsTooSmall(usize),
    #[error("no generator found for the quadratic-residue subgroup")]
    NoGenerator,
    #[error("element has no inverse modulo the group prime")]
    NotInvertible,
}

/// Parameters of a safe-prime group: prime `p`, subgroup order `q = (p-1)/2`
/// and a generator `g` of the order-`q` subgroup of quadratic residues.
///
/// All group arithmetic is mod `p`; exponents and proof scalars are mod `q`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupParams {
    pub p: BigUint,
    pub q: BigUint,
    pub g: BigUint,
}

impl GroupParams {
    /// Search for a fresh safe-prime group of the given size.
    ///
    /// Draws candidate primes `q` until `p = 2q + 1` is also prime, then
    /// picks the first square `h^2 != 1` as the subgroup generator. Safe
    /// prime density makes this slow for production sizes; binaries use
    /// [`GroupParams::modp_2048`] instead and reserve this path for
    /// non-standard sizes.
    pub fn generate<R: Rng>(bits: usize, rng: &mut R) -> Result<Self, GroupError> {
        if bits < 64 {
            return Err(GroupError::BitsTooSmall(bits));
        }

        let one = BigUint::one();
        let two = BigUint::from(2u32);
        let mut attempts = 0usize;
        let (p, q) = loop {
            attempts += 1;
            let q: BigUint = rng.gen_prime(bits - 1);
            let p = &q * &two + &one;
            if probably_prime(&p, PRIMALITY_ROUNDS) {
                tracing::debug!(
                    target: LOG_TARGET,
                    bits,
                    attempts,
                    "found safe prime"
                );
                break (p, q);
            }
        };

        let g = find_generator(&p)?;
        Ok(GroupParams { p, q, g })
    }

    /// The 2048-bit MODP group from RFC 3526 (group 14) with generator 2.
    ///
    /// `p` is a safe prime with `p = 7 mod 8`, so 2 is a quadratic residue
    /// and generates the order-`q` subgroup.
    pub fn modp_2048() -> Self {
        let p = BigUint::parse_bytes(MODP_2048_HEX.as_bytes(), 16)
            .expect("RFC 3526 constant parses");
        let q = (&p - BigUint::one()) >> 1;
        GroupParams {
            p,
            q,
            g: BigUint::from(2u32),
        }
    }

    /// Uniform scalar in `[1, q - 1)`, the exponent range used for
    /// encryption randomness, commitment nonces and simulated challenges.
    pub fn random_scalar<R: Rng>(&self, rng: &mut R) -> BigUint {
        let one = BigUint::one();
        let upper = &self.q - &one;
        rng.gen_biguint_range(&one, &upper)
    }

    /// `g^e mod p`.
    pub fn pow_g(&self, exponent: &BigUint) -> BigUint {
        self.g.modpow(exponent, &self.p)
    }

    /// `base^e mod p`.
    pub fn pow(&self, base: &BigUint, exponent: &BigUint) -> BigUint {
        base.modpow(exponent, &self.p)
    }

    /// `a * b mod p`.
    pub fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.p
    }

    /// Multiplicative inverse mod `p`.
    pub fn inv(&self, a: &BigUint) -> Result<BigUint, GroupError> {
        mod_inverse(a, &self.p).ok_or(GroupError::NotInvertible)
    }

    /// Whether the group relations hold: `p` odd, `g^q = 1`, `g != 1`.
    /// Used to sanity-check parameters loaded from disk.
    pub fn is_consistent(&self) -> bool {
        let one = BigUint::one();
        self.p.bits() >= 64
            && self.g > one
            && self.g < self.p
            && self.pow_g(&self.q) == one
    }

    pub fn bits(&self) -> usize {
        self.p.bits()
    }
}

/// First `h` in `2, 3, ...` whose square generates the subgroup.
fn find_generator(p: &BigUint) -> Result<BigUint, GroupError> {
    let one = BigUint::one();
    let two = BigUint::from(2u32);
    let mut h = two.clone();
    while &h < p {
        let g = h.modpow(&two, p);
        if g != one {
            return Ok(g);
        }
        h += &one;
    }
    Err(GroupError::NoGenerator)
}

/// Multiplicative inverse of `a` modulo `m`, normalized to `[0, m)`.
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    let inv = a.mod_inverse(m)?;
    let m_signed = BigInt::from(m.clone());
    let normalized = ((inv % &m_signed) + &m_signed) % &m_signed;
    normalized.to_biguint()
}

/// Hex digits of the RFC 3526 2048-bit MODP prime.
const MODP_2048_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74",
    "020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437",
    "4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05",
    "98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB",
    "9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718",
    "3995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF",
);
