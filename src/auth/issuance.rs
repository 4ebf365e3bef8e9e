//! Credential issuance: roster-gated blind signing on the authority side,
//! serial drawing and unblinding on the voter side.
//!
//! The authority never sees the serial it signs; unlinkability between the
//! issuance session and the eventual ballot rests on that blindness.

use std::sync::Arc;

use num_bigint_dig::{BigUint, RandBigInt};
use rand::Rng;
use thiserror::Error;

use crate::auth::credentials::{Credential, SERIAL_BITS};
use crate::auth::roster::ShareholderRoster;
use crate::crypto::blind::{BlindClient, BlindError, BlindSigner};
use crate::keys::RsaKeyPair;
use crate::num_serde::parse_dec;

const LOG_TARGET: &str = "ballot::issuance";

#[derive(Debug, Error)]
pub enum IssuanceError {
    #[error("voter id {0:?} is not on the shareholder roster")]
    InvalidVoterId(String),
    #[error("blinded serial is not a decimal integer")]
    InvalidBlindedFormat,
}

/// What the authority hands back: the blind signature plus the voter's
/// registered weight.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub voter_id: String,
    pub signed_blinded: BigUint,
    pub weight: u64,
}

/// Authority side of issuance.
pub struct IssuanceService {
    roster: Arc<ShareholderRoster>,
    key: Arc<RsaKeyPair>,
}

impl IssuanceService {
    pub fn new(roster: Arc<ShareholderRoster>, key: Arc<RsaKeyPair>) -> Self {
        Self { roster, key }
    }

    /// Check roster membership, then obliviously sign the blinded serial.
    /// The weight comes from the roster, never from the request.
    pub fn issue(
        &self,
        voter_id: &str,
        blinded_serial: &str,
    ) -> Result<IssuedCredential, IssuanceError> {
        let Some(voter) = self.roster.get(voter_id) else {
            tracing::warn!(target: LOG_TARGET, voter_id, "issuance refused: unknown voter");
            return Err(IssuanceError::InvalidVoterId(voter_id.to_owned()));
        };
        let blinded = parse_dec(blinded_serial).map_err(|_| {
            tracing::warn!(target: LOG_TARGET, voter_id, "issuance refused: malformed blinded serial");
            IssuanceError::InvalidBlindedFormat
        })?;

        let signed_blinded = BlindSigner::new(&self.key).sign(&blinded);
        tracing::info!(
            target: LOG_TARGET,
            voter_id,
            weight = voter.weight,
            "issued blind signature"
        );
        Ok(IssuedCredential {
            voter_id: voter_id.to_owned(),
            signed_blinded,
            weight: voter.weight,
        })
    }
}

/// Voter-side state between blinding and unblinding.
pub struct CredentialRequest {
    pub serial: BigUint,
    pub blinded: BigUint,
    unblinder: BigUint,
    client: BlindClient,
}

/// Draw a fresh serial and blind it for submission to the authority.
pub fn begin_credential_request<R: Rng>(
    n: &BigUint,
    e: &BigUint,
    rng: &mut R,
) -> Result<CredentialRequest, BlindError> {
    let serial = rng.gen_biguint(SERIAL_BITS);
    let client = BlindClient::new(n.clone(), e.clone());
    let blinded = client.blind(&serial, rng)?;
    Ok(CredentialRequest {
        serial,
        blinded: blinded.blinded,
        unblinder: blinded.unblinder,
        client,
    })
}

impl CredentialRequest {
    /// Unblind the authority's response into a usable credential.
    pub fn finish(self, signed_blinded: &BigUint) -> Result<Credential, BlindError> {
        let signature = self.client.unblind(signed_blinded, &self.unblinder)?;
        Ok(Credential {
            serial_number: self.serial,
            signature,
        })
    }
}
