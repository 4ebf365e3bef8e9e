//! Chaum-Pedersen proof that the announced tally matches the aggregate
//! ciphertext.
//!
//! The tallier proves `log_g(y) = log_A(B / g^m)` for the aggregate
//! `(A, B)` and declared total `m`, i.e. that decryption used the same
//! secret exponent that produced the public key. Anyone holding the public
//! parameters can re-check the result without learning the key.

use num_bigint_dig::BigUint;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::crypto::elgamal::Ciphertext;
use crate::crypto::transcript::TranscriptBuilder;
use crate::group::GroupParams;

const LOG_TARGET: &str = "ballot::tally_proof";

const TRANSCRIPT_KIND: &str = "ballot/decryption/v1";

/// Proof of correct decryption of an aggregate ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionProof {
    /// `T1 = g^w`.
    #[serde(with = "crate::num_serde::dec")]
    pub a1: BigUint,
    /// `T2 = A^w`.
    #[serde(with = "crate::num_serde::dec")]
    pub a2: BigUint,
    #[serde(with = "crate::num_serde::dec")]
    pub challenge: BigUint,
    #[serde(with = "crate::num_serde::dec")]
    pub response: BigUint,
}

pub fn prove<R: Rng>(
    group: &GroupParams,
    x: &BigUint,
    aggregate: &Ciphertext,
    rng: &mut R,
) -> DecryptionProof {
    let nonce = group.random_scalar(rng);
    let a1 = group.pow_g(&nonce);
    let a2 = group.pow(&aggregate.alpha, &nonce);

    let challenge = derive_challenge(group, aggregate, &a1, &a2);
    let response = (&nonce + &challenge * x) % &group.q;

    DecryptionProof {
        a1,
        a2,
        challenge,
        response,
    }
}

/// Check `g^s = T1 * y^c` and `A^s = T2 * (B / g^m)^c` for the declared
/// total `m`.
pub fn verify(
    group: &GroupParams,
    y: &BigUint,
    aggregate: &Ciphertext,
    declared_total: u64,
    proof: &DecryptionProof,
) -> bool {
    let expected = derive_challenge(group, aggregate, &proof.a1, &proof.a2);
    if proof.challenge != expected {
        return false;
    }

    let lhs1 = group.pow_g(&proof.response);
    let rhs1 = group.mul(&proof.a1, &group.pow(y, &proof.challenge));
    if lhs1 != rhs1 {
        return false;
    }

    let g_m = group.pow_g(&BigUint::from(declared_total));
    let stripped = match group.inv(&g_m) {
        Ok(inv) => group.mul(&aggregate.beta, &inv),
        Err(err) => {
            tracing::warn!(target: LOG_TARGET, error = %err, "proof rejected: malformed input");
            return false;
        }
    };
    let lhs2 = group.pow(&aggregate.alpha, &proof.response);
    let rhs2 = group.mul(&proof.a2, &group.pow(&stripped, &proof.challenge));
    lhs2 == rhs2
}

fn derive_challenge(
    group: &GroupParams,
    aggregate: &Ciphertext,
    a1: &BigUint,
    a2: &BigUint,
) -> BigUint {
    let mut transcript = TranscriptBuilder::new(TRANSCRIPT_KIND);
    transcript.append_uint(&aggregate.alpha);
    transcript.append_uint(&aggregate.beta);
    transcript.append_uint(a1);
    transcript.append_uint(a2);
    transcript.challenge(&group.q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::elgamal::encrypt;
    use crate::crypto::homomorphic::combine;
    use crate::test_utils::test_keys;
    use num_traits::One;

    #[test]
    fn valid_decryption_proof_verifies() {
        let mut rng = rand::thread_rng();
        let keys = test_keys();

        let cts: Vec<_> = [2u64, 3, 5]
            .iter()
            .map(|m| encrypt(&keys.group, &keys.y, *m, &mut rng).expect("encrypt").1)
            .collect();
        let aggregate = combine(&keys.group, &cts);

        let proof = prove(&keys.group, keys.secret(), &aggregate, &mut rng);
        assert!(verify(&keys.group, &keys.y, &aggregate, 10, &proof));
    }

    #[test]
    fn wrong_total_fails_verification() {
        let mut rng = rand::thread_rng();
        let keys = test_keys();

        let (_, ct) = encrypt(&keys.group, &keys.y, 4, &mut rng).expect("encrypt");
        let proof = prove(&keys.group, keys.secret(), &ct, &mut rng);
        assert!(verify(&keys.group, &keys.y, &ct, 4, &proof));
        assert!(!verify(&keys.group, &keys.y, &ct, 5, &proof));
    }

    #[test]
    fn tampered_proof_fields_fail_verification() {
        let mut rng = rand::thread_rng();
        let keys = test_keys();

        let (_, ct) = encrypt(&keys.group, &keys.y, 4, &mut rng).expect("encrypt");
        let proof = prove(&keys.group, keys.secret(), &ct, &mut rng);

        let mut bad = proof.clone();
        bad.a1 = group_elem_plus_one(&keys.group, &bad.a1);
        assert!(!verify(&keys.group, &keys.y, &ct, 4, &bad));

        let mut bad = proof.clone();
        bad.a2 = group_elem_plus_one(&keys.group, &bad.a2);
        assert!(!verify(&keys.group, &keys.y, &ct, 4, &bad));

        let mut bad = proof.clone();
        bad.response = (&bad.response + BigUint::one()) % &keys.group.q;
        assert!(!verify(&keys.group, &keys.y, &ct, 4, &bad));
    }

    fn group_elem_plus_one(group: &GroupParams, value: &BigUint) -> BigUint {
        (value + BigUint::one()) % &group.p
    }
}
