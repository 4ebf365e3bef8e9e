use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rand::rngs::OsRng;
use tracing::info;

use crate::auth::credentials::CredentialVerifier;
use crate::auth::issuance::IssuanceService;
use crate::auth::roster::ShareholderRoster;
use crate::ballot::BallotBox;
use crate::keys::{ElGamalKeyPair, KeyStore, RsaKeyPair};
use crate::storage::ledger::BallotLedger;
use crate::tally::Tallier;

const LOG_TARGET: &str = "server::bootstrap";

/// Everything the transport surfaces need, wired once at startup.
///
/// Key material and the roster are read-only after this point; the
/// credential verifier and the ledger carry their own locks.
pub struct EngineState {
    pub keys: Arc<ElGamalKeyPair>,
    pub rsa: Arc<RsaKeyPair>,
    pub roster: Arc<ShareholderRoster>,
    pub issuance: IssuanceService,
    pub ballot_box: Arc<BallotBox>,
    pub tallier: Arc<Tallier>,
    pub ledger: Arc<BallotLedger>,
}

/// Load-or-generate keys, load the roster and open the stores under
/// `data_dir`.
pub fn initialize(data_dir: &Path, elgamal_bits: usize, rsa_bits: usize) -> Result<EngineState> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;

    let store = KeyStore::new(data_dir);
    let keys = Arc::new(
        store
            .load_or_generate_elgamal(elgamal_bits, &mut OsRng)
            .context("loading elgamal key material")?,
    );
    let rsa = Arc::new(
        store
            .load_or_generate_rsa(rsa_bits, &mut OsRng)
            .context("loading rsa key material")?,
    );

    let roster = Arc::new(
        ShareholderRoster::load_or_seed(&data_dir.join("shareholders.json"))
            .context("loading shareholder roster")?,
    );
    let verifier = Arc::new(
        CredentialVerifier::open(
            data_dir.join("used_serials.json"),
            rsa.n.clone(),
            rsa.e.clone(),
        )
        .context("opening used-serial store")?,
    );
    let ledger = Arc::new(BallotLedger::open(data_dir).context("opening ballot ledger")?);

    let issuance = IssuanceService::new(Arc::clone(&roster), Arc::clone(&rsa));
    let ballot_box = Arc::new(BallotBox::new(
        keys.group.clone(),
        keys.y.clone(),
        Arc::clone(&verifier),
        Arc::clone(&ledger),
    ));
    let tallier = Arc::new(Tallier::new(Arc::clone(&keys), Arc::clone(&ledger)));

    info!(
        target: LOG_TARGET,
        data_dir = %data_dir.display(),
        group_bits = keys.group.bits(),
        voters = roster.all().len(),
        "engine state initialized"
    );
    Ok(EngineState {
        keys,
        rsa,
        roster,
        issuance,
        ballot_box,
        tallier,
        ledger,
    })
}
