use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use num_bigint_dig::{BigUint, RandPrime};
use num_integer::Integer;
use num_traits::One;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::group::{mod_inverse, GroupError, GroupParams};

const LOG_TARGET: &str = "ballot::keys";

pub const DEFAULT_ELGAMAL_BITS: usize = 2048;
pub const DEFAULT_RSA_BITS: usize = 2048;

const MIN_ELGAMAL_BITS: usize = 1024;
const MIN_RSA_BITS: usize = 2048;

/// Fixed RSA public exponent, `F4`.
const RSA_PUBLIC_EXPONENT: u32 = 65_537;

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("key file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed key file {path}: {source}")]
    Malformed {
        path: String,
        source: serde_json::Error,
    },
    #[error("key file {0} failed consistency checks")]
    Inconsistent(String),
    #[error("{kind} keys of {bits} bits are below the {min}-bit minimum")]
    InsecureBits {
        kind: &'static str,
        bits: usize,
        min: usize,
    },
    #[error(transparent)]
    Group(#[from] GroupError),
}

/// A private exponent that is wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretExponent(BigUint);

impl SecretExponent {
    pub fn new(value: BigUint) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &BigUint {
        &self.0
    }
}

impl fmt::Debug for SecretExponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretExponent(..)")
    }
}

/// Tallier key material: group parameters, public key `y = g^x` and the
/// decryption exponent `x`.
#[derive(Debug, Clone)]
pub struct ElGamalKeyPair {
    pub group: GroupParams,
    pub y: BigUint,
    x: SecretExponent,
}

impl ElGamalKeyPair {
    /// Draw `x` uniformly and derive `y = g^x mod p`.
    pub fn generate<R: Rng>(group: GroupParams, rng: &mut R) -> Self {
        let x = group.random_scalar(rng);
        let y = group.pow_g(&x);
        ElGamalKeyPair {
            group,
            y,
            x: SecretExponent::new(x),
        }
    }

    pub fn from_parts(group: GroupParams, y: BigUint, x: BigUint) -> Self {
        ElGamalKeyPair {
            group,
            y,
            x: SecretExponent::new(x),
        }
    }

    pub fn secret(&self) -> &BigUint {
        self.x.expose()
    }

    fn is_consistent(&self) -> bool {
        self.group.is_consistent()
            && self.y != BigUint::one()
            && self.group.pow_g(self.x.expose()) == self.y
    }
}

/// RSA signing key used for blind credential issuance.
#[derive(Debug, Clone)]
pub struct RsaKeyPair {
    pub n: BigUint,
    pub e: BigUint,
    d: SecretExponent,
}

impl RsaKeyPair {
    /// Generate a fresh modulus from two random primes with `e = 65537`.
    pub fn generate<R: Rng>(bits: usize, rng: &mut R) -> Self {
        let e = BigUint::from(RSA_PUBLIC_EXPONENT);
        let one = BigUint::one();
        loop {
            let p: BigUint = rng.gen_prime(bits / 2);
            let q: BigUint = rng.gen_prime(bits - bits / 2);
            if p == q {
                continue;
            }
            let totient = (&p - &one) * (&q - &one);
            if e.gcd(&totient) != one {
                continue;
            }
            let Some(d) = mod_inverse(&e, &totient) else {
                continue;
            };
            return RsaKeyPair {
                n: p * q,
                e,
                d: SecretExponent::new(d),
            };
        }
    }

    pub fn from_parts(n: BigUint, e: BigUint, d: BigUint) -> Self {
        RsaKeyPair {
            n,
            e,
            d: SecretExponent::new(d),
        }
    }

    pub fn secret(&self) -> &BigUint {
        self.d.expose()
    }

    /// Sign/verify a fixed test value to confirm `e` and `d` match `n`.
    fn is_consistent(&self) -> bool {
        let probe = BigUint::from(2u32);
        let signed = probe.modpow(self.d.expose(), &self.n);
        signed.modpow(&self.e, &self.n) == probe
    }
}

#[derive(Serialize, Deserialize)]
struct ElGamalParamsFile {
    #[serde(with = "crate::num_serde::dec")]
    p: BigUint,
    #[serde(with = "crate::num_serde::dec")]
    g: BigUint,
    #[serde(with = "crate::num_serde::dec")]
    y: BigUint,
    #[serde(with = "crate::num_serde::dec")]
    x: BigUint,
}

#[derive(Serialize, Deserialize)]
struct RsaParamsFile {
    #[serde(with = "crate::num_serde::dec")]
    n: BigUint,
    #[serde(with = "crate::num_serde::dec")]
    e: BigUint,
    #[serde(with = "crate::num_serde::dec")]
    d: BigUint,
}

/// Generate-or-load persistence for key material, cached as decimal-string
/// JSON in the data directory (`elgamal_params_<bits>.json`,
/// `rsa_params_<bits>.json`).
pub struct KeyStore {
    data_dir: PathBuf,
}

impl KeyStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn elgamal_path(&self, bits: usize) -> PathBuf {
        self.data_dir.join(format!("elgamal_params_{bits}.json"))
    }

    pub fn rsa_path(&self, bits: usize) -> PathBuf {
        self.data_dir.join(format!("rsa_params_{bits}.json"))
    }

    /// Load cached ElGamal keys, or generate and cache a fresh pair.
    ///
    /// The default size uses the standard 2048-bit MODP group; other sizes
    /// run a safe-prime search.
    pub fn load_or_generate_elgamal<R: Rng>(
        &self,
        bits: usize,
        rng: &mut R,
    ) -> Result<ElGamalKeyPair, KeyStoreError> {
        let path = self.elgamal_path(bits);
        if path.exists() {
            return load_elgamal(&path);
        }
        if bits < MIN_ELGAMAL_BITS {
            return Err(KeyStoreError::InsecureBits {
                kind: "elgamal",
                bits,
                min: MIN_ELGAMAL_BITS,
            });
        }

        tracing::info!(target: LOG_TARGET, bits, "generating elgamal key pair");
        let group = if bits == 2048 {
            GroupParams::modp_2048()
        } else {
            GroupParams::generate(bits, rng)?
        };
        let pair = ElGamalKeyPair::generate(group, rng);
        save_elgamal(&path, &pair)?;
        tracing::info!(target: LOG_TARGET, path = %path.display(), "cached elgamal parameters");
        Ok(pair)
    }

    /// Load cached RSA keys, or generate and cache a fresh pair.
    pub fn load_or_generate_rsa<R: Rng>(
        &self,
        bits: usize,
        rng: &mut R,
    ) -> Result<RsaKeyPair, KeyStoreError> {
        let path = self.rsa_path(bits);
        if path.exists() {
            return load_rsa(&path);
        }
        if bits < MIN_RSA_BITS {
            return Err(KeyStoreError::InsecureBits {
                kind: "rsa",
                bits,
                min: MIN_RSA_BITS,
            });
        }

        tracing::info!(target: LOG_TARGET, bits, "generating rsa key pair");
        let pair = RsaKeyPair::generate(bits, rng);
        save_rsa(&path, &pair)?;
        tracing::info!(target: LOG_TARGET, path = %path.display(), "cached rsa parameters");
        Ok(pair)
    }
}

pub(crate) fn save_elgamal(path: &Path, pair: &ElGamalKeyPair) -> Result<(), KeyStoreError> {
    let file = ElGamalParamsFile {
        p: pair.group.p.clone(),
        g: pair.group.g.clone(),
        y: pair.y.clone(),
        x: pair.secret().clone(),
    };
    write_json(path, &file)
}

pub(crate) fn load_elgamal(path: &Path) -> Result<ElGamalKeyPair, KeyStoreError> {
    let file: ElGamalParamsFile = read_json(path)?;
    let q = (&file.p - BigUint::one()) >> 1;
    let pair = ElGamalKeyPair::from_parts(
        GroupParams {
            p: file.p,
            q,
            g: file.g,
        },
        file.y,
        file.x,
    );
    if !pair.is_consistent() {
        return Err(KeyStoreError::Inconsistent(path.display().to_string()));
    }
    Ok(pair)
}

pub(crate) fn save_rsa(path: &Path, pair: &RsaKeyPair) -> Result<(), KeyStoreError> {
    let file = RsaParamsFile {
        n: pair.n.clone(),
        e: pair.e.clone(),
        d: pair.secret().clone(),
    };
    write_json(path, &file)
}

pub(crate) fn load_rsa(path: &Path) -> Result<RsaKeyPair, KeyStoreError> {
    let file: RsaParamsFile = read_json(path)?;
    let pair = RsaKeyPair::from_parts(file.n, file.e, file.d);
    if !pair.is_consistent() {
        return Err(KeyStoreError::Inconsistent(path.display().to_string()));
    }
    Ok(pair)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), KeyStoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    let body = serde_json::to_string_pretty(value).map_err(|source| KeyStoreError::Malformed {
        path: path.display().to_string(),
        source,
    })?;
    file.write_all(body.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, KeyStoreError> {
    let body = fs::read_to_string(path)?;
    serde_json::from_str(&body).map_err(|source| KeyStoreError::Malformed {
        path: path.display().to_string(),
        source,
    })
}
