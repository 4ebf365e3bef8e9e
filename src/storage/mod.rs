pub mod canonical;
pub mod hash_chain;
pub mod ledger;
pub mod merkle;
