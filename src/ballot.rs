//! Weighted ballot construction and server-side acceptance.
//!
//! A yes/no vote of weight `w` encrypts `v * w` and carries a disjunctive
//! proof over `{0, w}`, so an accepted ciphertext contributes either
//! nothing or exactly the voter's weight to the aggregate. The weight tag
//! travels as a plain `weight_<w>` string; see DESIGN.md for the channel's
//! known limits.

use std::sync::Arc;

use num_bigint_dig::BigUint;
use num_traits::Zero;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::credentials::{Credential, CredentialError, CredentialVerifier};
use crate::crypto::elgamal::{encrypt, Ciphertext, ElGamalError};
use crate::crypto::or_proof::{self, BallotProof};
use crate::group::{GroupError, GroupParams};
use crate::storage::ledger::{AppendReceipt, BallotLedger, LedgerError};

const LOG_TARGET: &str = "ballot::cast";

const WEIGHT_TAG_PREFIX: &str = "weight_";

#[derive(Debug, Error)]
pub enum BallotError {
    #[error("vote weight must be positive")]
    ZeroWeight,
    #[error("ballot weight tag is malformed or non-positive")]
    MalformedWeightTag,
    #[error("ballot proof does not verify")]
    InvalidProof,
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error(transparent)]
    ElGamal(#[from] ElGamalError),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("invalid credential")]
    InvalidCredential,
    #[error("credential store failure: {0}")]
    CredentialStore(CredentialError),
    #[error(transparent)]
    Ballot(#[from] BallotError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// The wire payload a voter submits: ciphertext, well-formedness proof and
/// the weight tag the tally will parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBallot {
    pub ciphertext: Ciphertext,
    pub zkp: BallotProof,
    pub weight_signature: String,
}

pub fn weight_tag(weight: u64) -> String {
    format!("{WEIGHT_TAG_PREFIX}{weight}")
}

/// Parse `weight_<w>` into a positive weight.
pub fn parse_weight_tag(tag: &str) -> Option<u64> {
    let weight: u64 = tag.strip_prefix(WEIGHT_TAG_PREFIX)?.parse().ok()?;
    (weight > 0).then_some(weight)
}

/// Encrypt `vote * weight` and attach the `{0, weight}` proof.
pub fn create_ballot<R: Rng>(
    group: &GroupParams,
    y: &BigUint,
    vote: bool,
    weight: u64,
    rng: &mut R,
) -> Result<EncryptedBallot, BallotError> {
    if weight == 0 {
        return Err(BallotError::ZeroWeight);
    }
    let plaintext = if vote { weight } else { 0 };
    let (randomness, ciphertext) = encrypt(group, y, plaintext, rng)?;
    let zkp = or_proof::prove(
        group,
        y,
        &ciphertext,
        &randomness,
        &BigUint::zero(),
        &BigUint::from(weight),
        vote,
        rng,
    )?;
    Ok(EncryptedBallot {
        ciphertext,
        zkp,
        weight_signature: weight_tag(weight),
    })
}

/// Check a ballot's weight tag and proof; returns the weight on success.
pub fn verify_ballot_parts(
    group: &GroupParams,
    y: &BigUint,
    ciphertext: &Ciphertext,
    zkp: &BallotProof,
    weight_signature: &str,
) -> Result<u64, BallotError> {
    let weight = parse_weight_tag(weight_signature).ok_or(BallotError::MalformedWeightTag)?;
    let valid = or_proof::verify(
        group,
        y,
        ciphertext,
        &BigUint::zero(),
        &BigUint::from(weight),
        zkp,
    );
    if !valid {
        return Err(BallotError::InvalidProof);
    }
    Ok(weight)
}

impl EncryptedBallot {
    pub fn verify(&self, group: &GroupParams, y: &BigUint) -> Result<u64, BallotError> {
        verify_ballot_parts(group, y, &self.ciphertext, &self.zkp, &self.weight_signature)
    }
}

/// Server-side acceptance path: proof check, credential burn, append.
///
/// The proof is checked before the credential so an unproven ballot cannot
/// consume a serial. When both the credential lock and the ledger lock are
/// held, the credential verifier's comes first.
pub struct BallotBox {
    group: GroupParams,
    y: BigUint,
    verifier: Arc<CredentialVerifier>,
    ledger: Arc<BallotLedger>,
}

impl BallotBox {
    pub fn new(
        group: GroupParams,
        y: BigUint,
        verifier: Arc<CredentialVerifier>,
        ledger: Arc<BallotLedger>,
    ) -> Self {
        Self {
            group,
            y,
            verifier,
            ledger,
        }
    }

    pub fn submit(
        &self,
        ballot: EncryptedBallot,
        credential: &Credential,
    ) -> Result<AppendReceipt, SubmitError> {
        let weight = ballot.verify(&self.group, &self.y).map_err(|err| {
            tracing::warn!(target: LOG_TARGET, error = %err, "ballot rejected before storage");
            err
        })?;

        match self.verifier.verify(credential) {
            Ok(()) => {}
            Err(err @ (CredentialError::DuplicateSerial | CredentialError::BadSignature)) => {
                tracing::warn!(target: LOG_TARGET, error = %err, "ballot rejected: invalid credential");
                return Err(SubmitError::InvalidCredential);
            }
            Err(err) => return Err(SubmitError::CredentialStore(err)),
        }

        let receipt =
            self.ledger
                .append(ballot.ciphertext, ballot.zkp, ballot.weight_signature)?;
        tracing::info!(
            target: LOG_TARGET,
            index = receipt.index,
            weight,
            "ballot accepted"
        );
        Ok(receipt)
    }
}
