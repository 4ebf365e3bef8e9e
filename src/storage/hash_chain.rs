//! Running SHA-256 chain over serialized ballots.
//!
//! Each link commits to every earlier ballot:
//! `h_i = sha256(h_{i-1} || canon(entry_i))` with an all-zero genesis value.

use sha2::{Digest, Sha256};

/// Hex predecessor of the first link.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

pub fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashChain {
    hashes: Vec<String>,
}

impl HashChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a chain from previously stored link hashes.
    pub fn from_hashes(hashes: Vec<String>) -> Self {
        Self { hashes }
    }

    /// Append a link over `data` and return its hash.
    pub fn push(&mut self, data: &str) -> String {
        let prev = self.tip().to_owned();
        let link = sha256_hex(&format!("{prev}{data}"));
        self.hashes.push(link.clone());
        link
    }

    /// Hash of the latest link, or the genesis value for an empty chain.
    pub fn tip(&self) -> &str {
        self.hashes.last().map_or(GENESIS_HASH, String::as_str)
    }

    pub fn hashes(&self) -> &[String] {
        &self.hashes
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Recompute the chain over `data` and compare link by link.
    pub fn verify(&self, data: &[String]) -> bool {
        if data.len() != self.hashes.len() {
            return false;
        }
        let mut prev = GENESIS_HASH.to_owned();
        for (entry, stored) in data.iter().zip(&self.hashes) {
            let expected = sha256_hex(&format!("{prev}{entry}"));
            if &expected != stored {
                return false;
            }
            prev = expected;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_links_commit_to_all_prior_entries() {
        let mut chain = HashChain::new();
        let first = chain.push("a");
        let second = chain.push("b");

        assert_eq!(first, sha256_hex(&format!("{GENESIS_HASH}a")));
        assert_eq!(second, sha256_hex(&format!("{first}b")));
        assert_eq!(chain.tip(), second);
    }

    #[test]
    fn verification_accepts_matching_data() {
        let entries = vec!["x".to_owned(), "y".to_owned(), "z".to_owned()];
        let mut chain = HashChain::new();
        for entry in &entries {
            chain.push(entry);
        }
        assert!(chain.verify(&entries));
    }

    #[test]
    fn verification_rejects_mutated_or_truncated_data() {
        let entries = vec!["x".to_owned(), "y".to_owned()];
        let mut chain = HashChain::new();
        for entry in &entries {
            chain.push(entry);
        }

        let mutated = vec!["x".to_owned(), "Y".to_owned()];
        assert!(!chain.verify(&mutated));
        assert!(!chain.verify(&entries[..1].to_vec()));
    }

    #[test]
    fn resumed_chain_continues_from_stored_tip() {
        let mut chain = HashChain::new();
        chain.push("a");
        chain.push("b");

        let mut resumed = HashChain::from_hashes(chain.hashes().to_vec());
        let next = resumed.push("c");

        let mut reference = HashChain::new();
        reference.push("a");
        reference.push("b");
        assert_eq!(next, reference.push("c"));
    }
}
