//! Merkle tree over serialized ballots, with inclusion proofs.
//!
//! Leaves are `sha256(canon(entry))`; internal nodes hash the concatenated
//! hex of their children; an odd node count at any level duplicates the
//! last node. The empty tree has the empty-string root.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::hash_chain::sha256_hex;

#[derive(Debug, Error)]
pub enum MerkleError {
    #[error("no leaf at index {index} (tree has {leaves})")]
    LeafOutOfRange { index: usize, leaves: usize },
}

/// Sibling hashes from a leaf up to the root. Each step records the sibling
/// hash and whether that sibling sits to the left of the running hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerkleProof(pub Vec<(String, bool)>);

#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<String>>,
}

impl MerkleTree {
    /// Hash the serialized entries into leaves and fold the levels upward.
    pub fn build<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let leaves: Vec<String> = entries.into_iter().map(sha256_hex).collect();
        if leaves.is_empty() {
            return Self { levels: Vec::new() };
        }

        let mut levels = vec![leaves];
        while levels.last().map_or(0, Vec::len) > 1 {
            let current = levels.last().expect("at least one level");
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                next.push(sha256_hex(&format!("{left}{right}")));
            }
            levels.push(next);
        }
        Self { levels }
    }

    /// Root hash; the empty string when the tree has no leaves.
    pub fn root(&self) -> String {
        self.levels
            .last()
            .and_then(|level| level.first())
            .cloned()
            .unwrap_or_default()
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// Inclusion proof for the leaf at `index`, ordered leaf to root.
    pub fn proof(&self, index: usize) -> Result<MerkleProof, MerkleError> {
        if index >= self.leaf_count() {
            return Err(MerkleError::LeafOutOfRange {
                index,
                leaves: self.leaf_count(),
            });
        }

        let mut steps = Vec::new();
        let mut position = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_is_left = position % 2 == 1;
            let sibling_index = if sibling_is_left {
                position - 1
            } else {
                position + 1
            };
            // Odd level width: the last node is paired with itself.
            let sibling = level.get(sibling_index).unwrap_or(&level[position]);
            steps.push((sibling.clone(), sibling_is_left));
            position /= 2;
        }
        Ok(MerkleProof(steps))
    }
}

/// Recompute the root from a serialized entry and its proof.
pub fn verify_proof(entry: &str, proof: &MerkleProof, root: &str) -> bool {
    let mut current = sha256_hex(entry);
    for (sibling, sibling_is_left) in &proof.0 {
        current = if *sibling_is_left {
            sha256_hex(&format!("{sibling}{current}"))
        } else {
            sha256_hex(&format!("{current}{sibling}"))
        };
    }
    current == root
}
