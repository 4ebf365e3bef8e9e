//! Disjunctive proof that a ciphertext encrypts one of two public values.
//!
//! A weighted yes/no ballot encrypts either `0` or the voter's weight `w`,
//! so the proof is instantiated over the pair `{0, w}`. The honest branch
//! runs a real Chaum-Pedersen sub-proof; the other branch is simulated by
//! choosing its challenge and response first. The verifier only learns that
//! the sub-challenges add up to the transcript challenge, never which
//! branch was real.

use num_bigint_dig::BigUint;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::crypto::elgamal::Ciphertext;
use crate::crypto::transcript::TranscriptBuilder;
use crate::group::{GroupError, GroupParams};

const LOG_TARGET: &str = "ballot::or_proof";

const TRANSCRIPT_KIND: &str = "ballot/or_proof/v1";

/// Non-interactive OR-proof for a ciphertext `(alpha, beta)`.
///
/// Branch 1 speaks about the first candidate value, branch 2 about the
/// second. All scalars live mod the subgroup order `q`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotProof {
    /// Commitments `(A1, B1)` for the first branch.
    #[serde(with = "crate::num_serde::dec_pair")]
    pub com1: (BigUint, BigUint),
    /// Commitments `(A2, B2)` for the second branch.
    #[serde(with = "crate::num_serde::dec_pair")]
    pub com2: (BigUint, BigUint),
    #[serde(with = "crate::num_serde::dec")]
    pub cha1: BigUint,
    #[serde(with = "crate::num_serde::dec")]
    pub cha2: BigUint,
    #[serde(with = "crate::num_serde::dec")]
    pub resp1: BigUint,
    #[serde(with = "crate::num_serde::dec")]
    pub resp2: BigUint,
}

/// Prove that `ciphertext` encrypts `v1` (when `encrypts_second`) or `v0`,
/// given the encryption randomness.
pub fn prove<R: Rng>(
    group: &GroupParams,
    y: &BigUint,
    ciphertext: &Ciphertext,
    randomness: &BigUint,
    v0: &BigUint,
    v1: &BigUint,
    encrypts_second: bool,
    rng: &mut R,
) -> Result<BallotProof, GroupError> {
    let q = &group.q;

    // Honest branch commitments.
    let nonce = group.random_scalar(rng);
    let a_real = group.pow_g(&nonce);
    let b_real = group.pow(y, &nonce);

    // Simulated branch: pick its challenge and response, then solve for
    // commitments that make the verification equations hold.
    let cha_sim = group.random_scalar(rng);
    let resp_sim = group.random_scalar(rng);
    let other_value = if encrypts_second { v0 } else { v1 };
    let target_sim = branch_target(group, &ciphertext.beta, other_value)?;
    let a_sim = group.mul(
        &group.pow_g(&resp_sim),
        &group.inv(&group.pow(&ciphertext.alpha, &cha_sim))?,
    );
    let b_sim = group.mul(
        &group.pow(y, &resp_sim),
        &group.inv(&group.pow(&target_sim, &cha_sim))?,
    );

    let (com1, com2) = if encrypts_second {
        ((a_sim, b_sim), (a_real, b_real))
    } else {
        ((a_real, b_real), (a_sim, b_sim))
    };

    let challenge = derive_challenge(group, y, ciphertext, &com1, &com2);
    let cha_real = (&challenge + q - &cha_sim) % q;
    let resp_real = (&nonce + &cha_real * randomness) % q;

    let (cha1, cha2, resp1, resp2) = if encrypts_second {
        (cha_sim, cha_real, resp_sim, resp_real)
    } else {
        (cha_real, cha_sim, resp_real, resp_sim)
    };

    Ok(BallotProof {
        com1,
        com2,
        cha1,
        cha2,
        resp1,
        resp2,
    })
}

/// Check a proof against the candidate pair `(v0, v1)`.
pub fn verify(
    group: &GroupParams,
    y: &BigUint,
    ciphertext: &Ciphertext,
    v0: &BigUint,
    v1: &BigUint,
    proof: &BallotProof,
) -> bool {
    match verify_inner(group, y, ciphertext, v0, v1, proof) {
        Ok(valid) => valid,
        Err(err) => {
            tracing::warn!(target: LOG_TARGET, error = %err, "proof rejected: malformed input");
            false
        }
    }
}

fn verify_inner(
    group: &GroupParams,
    y: &BigUint,
    ciphertext: &Ciphertext,
    v0: &BigUint,
    v1: &BigUint,
    proof: &BallotProof,
) -> Result<bool, GroupError> {
    let q = &group.q;
    let challenge = derive_challenge(group, y, ciphertext, &proof.com1, &proof.com2);
    if (&proof.cha1 + &proof.cha2) % q != challenge {
        return Ok(false);
    }

    let first = verify_branch(
        group,
        y,
        ciphertext,
        v0,
        &proof.com1,
        &proof.cha1,
        &proof.resp1,
    )?;
    let second = verify_branch(
        group,
        y,
        ciphertext,
        v1,
        &proof.com2,
        &proof.cha2,
        &proof.resp2,
    )?;
    Ok(first && second)
}

/// The two Chaum-Pedersen equations for one branch:
/// `g^s = A * alpha^c` and `y^s = B * (beta / g^v)^c`.
fn verify_branch(
    group: &GroupParams,
    y: &BigUint,
    ciphertext: &Ciphertext,
    value: &BigUint,
    com: &(BigUint, BigUint),
    cha: &BigUint,
    resp: &BigUint,
) -> Result<bool, GroupError> {
    let lhs_a = group.pow_g(resp);
    let rhs_a = group.mul(&com.0, &group.pow(&ciphertext.alpha, cha));
    if lhs_a != rhs_a {
        return Ok(false);
    }

    let target = branch_target(group, &ciphertext.beta, value)?;
    let lhs_b = group.pow(y, resp);
    let rhs_b = group.mul(&com.1, &group.pow(&target, cha));
    Ok(lhs_b == rhs_b)
}

/// `beta / g^v`: what `y^r` must equal if the ciphertext encrypts `v`.
fn branch_target(
    group: &GroupParams,
    beta: &BigUint,
    value: &BigUint,
) -> Result<BigUint, GroupError> {
    let g_v = group.pow_g(value);
    Ok(group.mul(beta, &group.inv(&g_v)?))
}

fn derive_challenge(
    group: &GroupParams,
    y: &BigUint,
    ciphertext: &Ciphertext,
    com1: &(BigUint, BigUint),
    com2: &(BigUint, BigUint),
) -> BigUint {
    let mut transcript = TranscriptBuilder::new(TRANSCRIPT_KIND);
    transcript.append_uint(&group.g);
    transcript.append_uint(y);
    transcript.append_uint(&ciphertext.alpha);
    transcript.append_uint(&ciphertext.beta);
    transcript.append_uint(&com1.0);
    transcript.append_uint(&com1.1);
    transcript.append_uint(&com2.0);
    transcript.append_uint(&com2.1);
    transcript.challenge(&group.q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::elgamal::encrypt;
    use crate::test_utils::test_keys;
    use num_traits::{One, Zero};

    fn candidates(weight: u64) -> (BigUint, BigUint) {
        (BigUint::zero(), BigUint::from(weight))
    }

    #[test]
    fn honest_proofs_verify_for_both_branches() {
        let mut rng = rand::thread_rng();
        let keys = test_keys();
        let (v0, v1) = candidates(1);

        for vote in [false, true] {
            let m = if vote { 1 } else { 0 };
            let (r, ct) = encrypt(&keys.group, &keys.y, m, &mut rng).expect("encrypt");
            let proof = prove(&keys.group, &keys.y, &ct, &r, &v0, &v1, vote, &mut rng)
                .expect("prove");
            assert!(verify(&keys.group, &keys.y, &ct, &v0, &v1, &proof));
        }
    }

    #[test]
    fn weighted_domain_accepts_zero_and_weight() {
        let mut rng = rand::thread_rng();
        let keys = test_keys();
        let weight = 5u64;
        let (v0, v1) = candidates(weight);

        for vote in [false, true] {
            let m = if vote { weight } else { 0 };
            let (r, ct) = encrypt(&keys.group, &keys.y, m, &mut rng).expect("encrypt");
            let proof = prove(&keys.group, &keys.y, &ct, &r, &v0, &v1, vote, &mut rng)
                .expect("prove");
            assert!(verify(&keys.group, &keys.y, &ct, &v0, &v1, &proof));
        }
    }

    #[test]
    fn out_of_domain_plaintext_cannot_be_proven() {
        let mut rng = rand::thread_rng();
        let keys = test_keys();
        let weight = 5u64;
        let (v0, v1) = candidates(weight);

        // Encrypt 2w and claim the high branch anyway.
        let (r, ct) = encrypt(&keys.group, &keys.y, 2 * weight, &mut rng).expect("encrypt");
        let proof =
            prove(&keys.group, &keys.y, &ct, &r, &v0, &v1, true, &mut rng).expect("prove");
        assert!(!verify(&keys.group, &keys.y, &ct, &v0, &v1, &proof));
    }

    #[test]
    fn tampered_proofs_are_rejected() {
        let mut rng = rand::thread_rng();
        let keys = test_keys();
        let (v0, v1) = candidates(3);

        let (r, ct) = encrypt(&keys.group, &keys.y, 3, &mut rng).expect("encrypt");
        let proof =
            prove(&keys.group, &keys.y, &ct, &r, &v0, &v1, true, &mut rng).expect("prove");

        let mut bad = proof.clone();
        bad.resp1 = (&bad.resp1 + BigUint::one()) % &keys.group.q;
        assert!(!verify(&keys.group, &keys.y, &ct, &v0, &v1, &bad));

        let mut bad = proof.clone();
        bad.cha2 = (&bad.cha2 + BigUint::one()) % &keys.group.q;
        assert!(!verify(&keys.group, &keys.y, &ct, &v0, &v1, &bad));

        let mut bad = proof.clone();
        std::mem::swap(&mut bad.com1, &mut bad.com2);
        assert!(!verify(&keys.group, &keys.y, &ct, &v0, &v1, &bad));
    }

    #[test]
    fn proof_is_bound_to_its_ciphertext() {
        let mut rng = rand::thread_rng();
        let keys = test_keys();
        let (v0, v1) = candidates(1);

        let (r, ct) = encrypt(&keys.group, &keys.y, 1, &mut rng).expect("encrypt");
        let (_, other) = encrypt(&keys.group, &keys.y, 1, &mut rng).expect("encrypt");
        let proof =
            prove(&keys.group, &keys.y, &ct, &r, &v0, &v1, true, &mut rng).expect("prove");
        assert!(!verify(&keys.group, &keys.y, &other, &v0, &v1, &proof));
    }
}
