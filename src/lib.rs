pub mod auth;
pub mod ballot;
pub mod crypto;
pub mod group;
pub mod keys;
pub mod num_serde;
pub mod server;
pub mod storage;
pub mod tally;

#[cfg(test)]
pub mod test_utils;

#[cfg(test)]
mod e2e;

pub use ballot::{BallotBox, EncryptedBallot};
pub use group::GroupParams;
pub use keys::{ElGamalKeyPair, KeyStore, RsaKeyPair};
pub use storage::ledger::BallotLedger;
pub use tally::{TallyOutcome, Tallier};
