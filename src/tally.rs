//! Verifiable tally over the ballot ledger.
//!
//! Every stored ballot is re-verified before it counts: a failing proof or
//! a malformed weight tag drops the entry (with an audit log line) rather
//! than poisoning the aggregate. The surviving ciphertexts multiply into
//! one aggregate, which decrypts to the weighted yes-total, bounded by the
//! sum of accepted weights.

use std::sync::Arc;

use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::ballot::verify_ballot_parts;
use crate::crypto::elgamal::{decrypt, recover_exponent, Ciphertext, ElGamalError};
use crate::crypto::homomorphic::combine;
use crate::crypto::tally_proof::{self, DecryptionProof};
use crate::keys::ElGamalKeyPair;
use crate::storage::ledger::{BallotLedger, LedgerError};

const LOG_TARGET: &str = "ballot::tally";

#[derive(Debug, Error)]
pub enum TallyError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Decrypt(ElGamalError),
    #[error("aggregate decrypts outside 0..={bound}; the ledger is corrupt")]
    DecryptionOutOfRange { bound: u64 },
}

/// A completed tally with everything an observer needs to re-check it.
#[derive(Debug, Clone, Serialize)]
pub struct TallyResult {
    pub total_votes: u64,
    pub total_weight: u64,
    pub result: u64,
    pub proof: DecryptionProof,
    pub final_cipher: Ciphertext,
}

/// An empty ledger (or one with no valid ballots) is a distinct outcome,
/// not a failure.
#[derive(Debug, Clone)]
pub enum TallyOutcome {
    Empty,
    Counted(TallyResult),
}

pub struct Tallier {
    keys: Arc<ElGamalKeyPair>,
    ledger: Arc<BallotLedger>,
}

impl Tallier {
    pub fn new(keys: Arc<ElGamalKeyPair>, ledger: Arc<BallotLedger>) -> Self {
        Self { keys, ledger }
    }

    pub fn tally<R: Rng>(&self, rng: &mut R) -> Result<TallyOutcome, TallyError> {
        let group = &self.keys.group;
        let ballots = self.ledger.scan()?;

        let mut accepted: Vec<Ciphertext> = Vec::with_capacity(ballots.len());
        let mut total_weight = 0u64;
        for (index, ballot) in ballots.iter().enumerate() {
            match verify_ballot_parts(
                group,
                &self.keys.y,
                &ballot.ciphertext,
                &ballot.zkp,
                &ballot.weight_signature,
            ) {
                Ok(weight) => {
                    total_weight += weight;
                    accepted.push(ballot.ciphertext.clone());
                }
                Err(err) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        index,
                        error = %err,
                        "discarding stored ballot"
                    );
                }
            }
        }

        if accepted.is_empty() {
            tracing::info!(target: LOG_TARGET, "tally over empty ledger");
            return Ok(TallyOutcome::Empty);
        }

        let aggregate = combine(group, &accepted);
        let g_m = decrypt(group, self.keys.secret(), &aggregate).map_err(TallyError::Decrypt)?;
        let result = recover_exponent(group, &g_m, total_weight)
            .map_err(|_| TallyError::DecryptionOutOfRange {
                bound: total_weight,
            })?;
        let proof = tally_proof::prove(group, self.keys.secret(), &aggregate, rng);

        tracing::info!(
            target: LOG_TARGET,
            total_votes = accepted.len(),
            total_weight,
            result,
            "tally complete"
        );
        Ok(TallyOutcome::Counted(TallyResult {
            total_votes: accepted.len() as u64,
            total_weight,
            result,
            proof,
            final_cipher: aggregate,
        }))
    }
}
