//! Credential verification and one-shot serial tracking.
//!
//! A credential is a 256-bit serial plus a raw RSA signature over it. The
//! verifier accepts each serial at most once: the signature check, the
//! used-set insertion and the durable flush happen under a single lock, so
//! two racing presentations of the same credential yield exactly one
//! acceptance.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use num_bigint_dig::BigUint;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::blind::verify_raw_signature;

const LOG_TARGET: &str = "ballot::credentials";

/// Bit size of voter-drawn serial numbers.
pub const SERIAL_BITS: usize = 256;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("serial has already been used")]
    DuplicateSerial,
    #[error("credential signature does not match the serial")]
    BadSignature,
    #[error("used-serial store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("used-serial store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// An issued voting credential: the voter's self-drawn serial and the
/// authority's blind signature over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(with = "crate::num_serde::dec")]
    pub serial_number: BigUint,
    #[serde(with = "crate::num_serde::dec")]
    pub signature: BigUint,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsedSerialsFile {
    #[serde(with = "crate::num_serde::dec_set")]
    used_serials: BTreeSet<BigUint>,
}

pub struct CredentialVerifier {
    n: BigUint,
    e: BigUint,
    path: PathBuf,
    used: Mutex<BTreeSet<BigUint>>,
}

impl CredentialVerifier {
    /// Open the verifier over `used_serials.json`, loading the complete set.
    pub fn open(path: impl Into<PathBuf>, n: BigUint, e: BigUint) -> Result<Self, CredentialError> {
        let path = path.into();
        let used = if path.exists() {
            let body = fs::read_to_string(&path)?;
            let file: UsedSerialsFile = serde_json::from_str(&body)?;
            file.used_serials
        } else {
            BTreeSet::new()
        };
        tracing::info!(
            target: LOG_TARGET,
            path = %path.display(),
            used = used.len(),
            "opened used-serial store"
        );
        Ok(Self {
            n,
            e,
            path,
            used: Mutex::new(used),
        })
    }

    /// Accept the credential if the serial is fresh and the signature
    /// checks out, burning the serial durably before returning.
    pub fn verify(&self, credential: &Credential) -> Result<(), CredentialError> {
        let mut used = self.used.lock();

        if used.contains(&credential.serial_number) {
            tracing::warn!(target: LOG_TARGET, "rejected credential: serial already used");
            return Err(CredentialError::DuplicateSerial);
        }
        if !verify_raw_signature(
            &self.n,
            &self.e,
            &credential.serial_number,
            &credential.signature,
        ) {
            tracing::warn!(target: LOG_TARGET, "rejected credential: bad signature");
            return Err(CredentialError::BadSignature);
        }

        used.insert(credential.serial_number.clone());
        if let Err(err) = persist(&self.path, &used) {
            // Keep memory and disk consistent so a retry can succeed.
            used.remove(&credential.serial_number);
            return Err(err);
        }
        tracing::info!(target: LOG_TARGET, used = used.len(), "credential accepted");
        Ok(())
    }

    pub fn used_count(&self) -> usize {
        self.used.lock().len()
    }

    /// Test support: forget every burned serial.
    pub fn clear(&self) -> Result<(), CredentialError> {
        let mut used = self.used.lock();
        used.clear();
        persist(&self.path, &used)
    }
}

/// Write-to-temp-then-rename with an fsync, mirroring the ledger files.
fn persist(path: &Path, used: &BTreeSet<BigUint>) -> Result<(), CredentialError> {
    let file = UsedSerialsFile {
        used_serials: used.clone(),
    };
    let tmp_path = path.with_extension("tmp");
    let mut tmp = fs::File::create(&tmp_path)?;
    tmp.write_all(serde_json::to_string_pretty(&file)?.as_bytes())?;
    tmp.sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}
