//! End-to-end election scenarios over the core engine: issuance, casting,
//! acceptance, tallying and audit, without the HTTP layer.

use std::sync::Arc;

use num_bigint_dig::BigUint;
use num_traits::One;
use tempfile::TempDir;
use uuid::Uuid;

use crate::auth::credentials::{Credential, CredentialVerifier};
use crate::auth::issuance::{begin_credential_request, IssuanceService};
use crate::auth::roster::{ShareholderRoster, Voter};
use crate::ballot::{create_ballot, BallotBox, BallotError, EncryptedBallot, SubmitError};
use crate::crypto::tally_proof;
use crate::keys::ElGamalKeyPair;
use crate::storage::ledger::BallotLedger;
use crate::tally::{Tallier, TallyOutcome, TallyResult};
use crate::test_utils::{test_keys, test_rsa};

struct Election {
    dir: TempDir,
    keys: Arc<ElGamalKeyPair>,
    issuance: IssuanceService,
    ballot_box: Arc<BallotBox>,
    ledger: Arc<BallotLedger>,
    tallier: Tallier,
}

fn new_election(voters: &[(&str, u64)]) -> Election {
    let keys = Arc::new(test_keys().clone());
    let rsa = Arc::new(test_rsa().clone());
    let dir = tempfile::tempdir().expect("tempdir");

    let roster = Arc::new(ShareholderRoster::from_voters(voters.iter().map(
        |(voter_id, weight)| Voter {
            name: format!("Voter {voter_id}"),
            uuid: Uuid::new_v4(),
            voter_id: (*voter_id).to_owned(),
            voter_type: "shareholder".to_owned(),
            weight: *weight,
        },
    )));
    let verifier = Arc::new(
        CredentialVerifier::open(
            dir.path().join("used_serials.json"),
            rsa.n.clone(),
            rsa.e.clone(),
        )
        .expect("open verifier"),
    );
    let ledger = Arc::new(BallotLedger::open(dir.path()).expect("open ledger"));

    let issuance = IssuanceService::new(roster, Arc::clone(&rsa));
    let ballot_box = Arc::new(BallotBox::new(
        keys.group.clone(),
        keys.y.clone(),
        verifier,
        Arc::clone(&ledger),
    ));
    let tallier = Tallier::new(Arc::clone(&keys), Arc::clone(&ledger));

    Election {
        dir,
        keys,
        issuance,
        ballot_box,
        ledger,
        tallier,
    }
}

impl Election {
    fn obtain_credential(&self, voter_id: &str) -> Credential {
        let mut rng = rand::thread_rng();
        let rsa = test_rsa();
        let request = begin_credential_request(&rsa.n, &rsa.e, &mut rng).expect("blind serial");
        let issued = self
            .issuance
            .issue(voter_id, &request.blinded.to_str_radix(10))
            .expect("issue credential");
        request.finish(&issued.signed_blinded).expect("unblind")
    }

    fn make_ballot(&self, vote: bool, weight: u64) -> EncryptedBallot {
        let mut rng = rand::thread_rng();
        create_ballot(&self.keys.group, &self.keys.y, vote, weight, &mut rng)
            .expect("create ballot")
    }

    fn cast(&self, voter_id: &str, vote: bool, weight: u64) -> usize {
        let credential = self.obtain_credential(voter_id);
        let ballot = self.make_ballot(vote, weight);
        self.ballot_box
            .submit(ballot, &credential)
            .expect("submit ballot")
            .index
    }

    fn counted_tally(&self) -> TallyResult {
        let mut rng = rand::thread_rng();
        match self.tallier.tally(&mut rng).expect("tally") {
            TallyOutcome::Counted(result) => result,
            TallyOutcome::Empty => panic!("expected a counted tally"),
        }
    }

    fn assert_tally_proof(&self, result: &TallyResult) {
        assert!(tally_proof::verify(
            &self.keys.group,
            &self.keys.y,
            &result.final_cipher,
            result.result,
            &result.proof,
        ));
    }
}

#[test]
fn single_yes_vote_with_unit_weight() {
    let election = new_election(&[("voter_a", 1)]);
    election.cast("voter_a", true, 1);

    let result = election.counted_tally();
    assert_eq!(result.result, 1);
    assert_eq!(result.total_votes, 1);
    assert_eq!(result.total_weight, 1);
    election.assert_tally_proof(&result);
}

#[test]
fn weighted_no_vote_counts_zero() {
    let election = new_election(&[("voter_a", 5)]);
    election.cast("voter_a", false, 5);

    let result = election.counted_tally();
    assert_eq!(result.result, 0);
    assert_eq!(result.total_votes, 1);
    assert_eq!(result.total_weight, 5);
    election.assert_tally_proof(&result);
}

#[test]
fn three_weighted_voters_produce_a_verifiable_board_result() {
    let election = new_election(&[("voter_a", 5), ("voter_b", 3), ("voter_c", 2)]);
    election.cast("voter_a", true, 5);
    election.cast("voter_b", true, 3);
    election.cast("voter_c", false, 2);

    let result = election.counted_tally();
    assert_eq!(result.result, 8);
    assert_eq!(result.total_weight, 10);
    assert_eq!(result.total_votes, 3);
    election.assert_tally_proof(&result);

    // Every stored ballot has a valid inclusion proof and chain position.
    for index in 0..3 {
        let check = election.ledger.verify(index).expect("verify");
        assert!(check.ok(), "ballot {index} failed audit");
    }
}

#[test]
fn reused_credentials_are_rejected_without_growing_the_ledger() {
    let election = new_election(&[("voter_a", 2)]);
    let credential = election.obtain_credential("voter_a");

    let first = election.make_ballot(true, 2);
    election
        .ballot_box
        .submit(first, &credential)
        .expect("first submission");
    assert_eq!(election.ledger.len().expect("len"), 1);

    let second = election.make_ballot(false, 2);
    let err = election
        .ballot_box
        .submit(second, &credential)
        .expect_err("double spend must fail");
    assert!(matches!(err, SubmitError::InvalidCredential));
    assert_eq!(election.ledger.len().expect("len"), 1);
}

#[test]
fn tampered_proofs_are_rejected_and_do_not_burn_the_credential() {
    let election = new_election(&[("voter_a", 3)]);
    let credential = election.obtain_credential("voter_a");

    let mut ballot = election.make_ballot(true, 3);
    ballot.zkp.resp1 = (&ballot.zkp.resp1 + BigUint::one()) % &election.keys.group.q;
    let err = election
        .ballot_box
        .submit(ballot, &credential)
        .expect_err("tampered proof must fail");
    assert!(matches!(err, SubmitError::Ballot(BallotError::InvalidProof)));
    assert_eq!(election.ledger.len().expect("len"), 0);

    // The rejection happened before the serial was consumed, so an honest
    // retry with the same credential still goes through.
    let honest = election.make_ballot(true, 3);
    election
        .ballot_box
        .submit(honest, &credential)
        .expect("honest retry");
    assert_eq!(election.ledger.len().expect("len"), 1);
}

#[test]
fn ledger_tampering_is_caught_by_the_audit_path() {
    let election = new_election(&[("voter_a", 1), ("voter_b", 1)]);
    election.cast("voter_a", true, 1);
    election.cast("voter_b", false, 1);

    let votes_path = election.dir.path().join("votes.json");
    let mut file: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&votes_path).expect("read votes"))
            .expect("parse votes");
    file["votes"][1]["ciphertext"]["beta"] = serde_json::Value::String("987654321".into());
    std::fs::write(&votes_path, file.to_string()).expect("write votes");

    let check = election.ledger.verify(1).expect("verify");
    assert!(!check.chain_ok || !check.merkle_ok);
    assert!(!check.ok());
}

#[test]
fn concurrent_submissions_land_in_distinct_slots() {
    let voters: Vec<(String, u64)> = (0..6).map(|i| (format!("voter_{i}"), 1u64)).collect();
    let voter_refs: Vec<(&str, u64)> = voters.iter().map(|(id, w)| (id.as_str(), *w)).collect();
    let election = Arc::new(new_election(&voter_refs));

    let handles: Vec<_> = voters
        .iter()
        .map(|(voter_id, _)| {
            let election = Arc::clone(&election);
            let credential = election.obtain_credential(voter_id);
            std::thread::spawn(move || {
                let ballot = election.make_ballot(true, 1);
                election
                    .ballot_box
                    .submit(ballot, &credential)
                    .expect("submit")
                    .index
            })
        })
        .collect();
    let mut indices: Vec<usize> = handles
        .into_iter()
        .map(|h| h.join().expect("join"))
        .collect();
    indices.sort_unstable();
    assert_eq!(indices, (0..6).collect::<Vec<_>>());

    for index in 0..6 {
        assert!(election.ledger.verify(index).expect("verify").ok());
    }
    let result = election.counted_tally();
    assert_eq!(result.result, 6);
    assert_eq!(result.total_weight, 6);
}

#[test]
fn racing_double_spend_admits_exactly_one_ballot() {
    let election = Arc::new(new_election(&[("voter_a", 1)]));
    let credential = election.obtain_credential("voter_a");

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let election = Arc::clone(&election);
            let credential = credential.clone();
            std::thread::spawn(move || {
                let ballot = election.make_ballot(true, 1);
                election.ballot_box.submit(ballot, &credential).is_ok()
            })
        })
        .collect();
    let accepted = handles
        .into_iter()
        .map(|h| h.join().expect("join"))
        .filter(|ok| *ok)
        .count();

    assert_eq!(accepted, 1);
    assert_eq!(election.ledger.len().expect("len"), 1);
}
