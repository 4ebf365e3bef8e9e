//! Request and response shapes for the three transport surfaces.
//!
//! Big integers cross the wire as decimal strings; the core types already
//! serialize that way, so DTOs mostly re-wrap them with the exact field
//! names the endpoints promise.

use serde::{Deserialize, Serialize};

use crate::auth::credentials::Credential;
use crate::auth::issuance::IssuedCredential;
use crate::auth::roster::Voter;
use crate::ballot::EncryptedBallot;
use crate::crypto::elgamal::Ciphertext;
use crate::group::GroupParams;
use crate::keys::ElGamalKeyPair;
use crate::storage::ledger::{LedgerCheck, StoredBallot};
use crate::storage::merkle::MerkleProof;
use crate::tally::TallyResult;
use num_bigint_dig::BigUint;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub struct VoterInfoRequest {
    pub name: Option<String>,
    pub uuid: Option<String>,
    pub voter_type: Option<String>,
    pub weight: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CredentialRequestBody {
    pub voter_id: String,
    pub blinded_serial: String,
    /// Client-asserted identity details; informational only, the roster is
    /// authoritative for weights.
    pub voter_info: Option<VoterInfoRequest>,
}

#[derive(Debug, Serialize)]
pub struct CredentialResponse {
    pub voter_id: String,
    pub signed_blinded: String,
    pub weight: u64,
}

impl From<IssuedCredential> for CredentialResponse {
    fn from(issued: IssuedCredential) -> Self {
        Self {
            voter_id: issued.voter_id,
            signed_blinded: issued.signed_blinded.to_str_radix(10),
            weight: issued.weight,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RosterResponse {
    pub shareholders: BTreeMap<String, Voter>,
}

#[derive(Debug, Deserialize)]
pub struct EncryptRequest {
    pub vote: u64,
    pub weight: u64,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub encrypted_vote: EncryptedBallot,
    pub credential: Credential,
    pub voter_id: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub vote_index: usize,
    pub merkle_proof: MerkleProof,
}

#[derive(Debug, Serialize)]
pub struct TallyProofResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub a1: String,
    pub a2: String,
    pub challenge: String,
    pub response: String,
    pub g: String,
    pub p: String,
    pub public_key: String,
}

#[derive(Debug, Serialize)]
pub struct TallyResponse {
    pub total_votes: u64,
    pub total_weight: u64,
    pub result: u64,
    pub proof: TallyProofResponse,
    pub final_cipher: Ciphertext,
}

impl TallyResponse {
    pub fn from_result(result: TallyResult, keys: &ElGamalKeyPair) -> Self {
        let proof = TallyProofResponse {
            kind: "chaum-pedersen",
            a1: result.proof.a1.to_str_radix(10),
            a2: result.proof.a2.to_str_radix(10),
            challenge: result.proof.challenge.to_str_radix(10),
            response: result.proof.response.to_str_radix(10),
            g: keys.group.g.to_str_radix(10),
            p: keys.group.p.to_str_radix(10),
            public_key: keys.y.to_str_radix(10),
        };
        Self {
            total_votes: result.total_votes,
            total_weight: result.total_weight,
            result: result.result,
            proof,
            final_cipher: result.final_cipher,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote: Option<StoredBallot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merkle_proof: Option<MerkleProof>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerifyResponse {
    pub fn from_check(check: LedgerCheck) -> Self {
        if check.ok() {
            Self {
                verified: true,
                vote: Some(check.entry),
                merkle_proof: check.merkle_proof,
                error: None,
            }
        } else {
            let reason = if check.merkle_ok {
                "hash chain mismatch"
            } else {
                "Invalid Merkle proof"
            };
            Self {
                verified: false,
                vote: None,
                merkle_proof: None,
                error: Some(reason.to_owned()),
            }
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            verified: false,
            vote: None,
            merkle_proof: None,
            error: Some(error.into()),
        }
    }
}

/// Public election parameters, enough for a voter to encrypt and blind.
#[derive(Debug, Serialize)]
pub struct ParametersResponse {
    pub p: String,
    pub g: String,
    pub public_key: String,
    pub rsa_n: String,
    pub rsa_e: String,
}

impl ParametersResponse {
    pub fn new(group: &GroupParams, y: &BigUint, n: &BigUint, e: &BigUint) -> Self {
        Self {
            p: group.p.to_str_radix(10),
            g: group.g.to_str_radix(10),
            public_key: y.to_str_radix(10),
            rsa_n: n.to_str_radix(10),
            rsa_e: e.to_str_radix(10),
        }
    }
}
