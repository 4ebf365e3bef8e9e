//! Shared fixtures for the test suites.
//!
//! Key generation dominates test time, so one small ElGamal group and one
//! small RSA modulus are generated once per process. The sizes are far
//! below production minimums and exist only to keep the math honest.

use once_cell::sync::Lazy;
use tempfile::TempDir;

use crate::group::GroupParams;
use crate::keys::{ElGamalKeyPair, RsaKeyPair};
use crate::storage::ledger::BallotLedger;

const TEST_GROUP_BITS: usize = 128;
const TEST_RSA_BITS: usize = 512;

static TEST_KEYS: Lazy<ElGamalKeyPair> = Lazy::new(|| {
    let mut rng = rand::thread_rng();
    let group = GroupParams::generate(TEST_GROUP_BITS, &mut rng).expect("test group");
    ElGamalKeyPair::generate(group, &mut rng)
});

static TEST_RSA: Lazy<RsaKeyPair> = Lazy::new(|| {
    let mut rng = rand::thread_rng();
    RsaKeyPair::generate(TEST_RSA_BITS, &mut rng)
});

pub fn test_keys() -> &'static ElGamalKeyPair {
    &TEST_KEYS
}

pub fn test_group() -> &'static GroupParams {
    &test_keys().group
}

pub fn test_rsa() -> &'static RsaKeyPair {
    &TEST_RSA
}

/// A fresh ledger in a temp directory; keep the `TempDir` alive for the
/// duration of the test.
pub fn test_ledger() -> (TempDir, BallotLedger) {
    let dir = tempfile::tempdir().expect("tempdir");
    let ledger = BallotLedger::open(dir.path()).expect("open ledger");
    (dir, ledger)
}
