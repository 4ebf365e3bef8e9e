//! Shareholder roster: who may request a credential, and at what weight.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const LOG_TARGET: &str = "ballot::roster";

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("roster io: {0}")]
    Io(#[from] std::io::Error),
    #[error("roster file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub name: String,
    pub uuid: Uuid,
    pub voter_id: String,
    pub voter_type: String,
    pub weight: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct RosterFile {
    shareholders: BTreeMap<String, Voter>,
}

/// Read-only after load; the engine never mutates the roster at runtime.
#[derive(Debug, Clone)]
pub struct ShareholderRoster {
    voters: BTreeMap<String, Voter>,
}

impl ShareholderRoster {
    /// Load `shareholders.json`, seeding a small default roster on first
    /// start so a fresh deployment is immediately usable.
    pub fn load_or_seed(path: &Path) -> Result<Self, RosterError> {
        if !path.exists() {
            let file = RosterFile {
                shareholders: default_shareholders(),
            };
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, serde_json::to_string_pretty(&file)?)?;
            tracing::info!(
                target: LOG_TARGET,
                path = %path.display(),
                count = file.shareholders.len(),
                "seeded default shareholder roster"
            );
            return Ok(Self {
                voters: file.shareholders,
            });
        }

        let body = fs::read_to_string(path)?;
        let file: RosterFile = serde_json::from_str(&body)?;
        tracing::info!(
            target: LOG_TARGET,
            path = %path.display(),
            count = file.shareholders.len(),
            "loaded shareholder roster"
        );
        Ok(Self {
            voters: file.shareholders,
        })
    }

    pub fn from_voters(voters: impl IntoIterator<Item = Voter>) -> Self {
        Self {
            voters: voters
                .into_iter()
                .map(|v| (v.voter_id.clone(), v))
                .collect(),
        }
    }

    pub fn get(&self, voter_id: &str) -> Option<&Voter> {
        self.voters.get(voter_id)
    }

    pub fn contains(&self, voter_id: &str) -> bool {
        self.voters.contains_key(voter_id)
    }

    pub fn weight_of(&self, voter_id: &str) -> Option<u64> {
        self.voters.get(voter_id).map(|v| v.weight)
    }

    pub fn all(&self) -> &BTreeMap<String, Voter> {
        &self.voters
    }

    /// Sum of every registered weight; upper bound for any honest tally.
    pub fn total_weight(&self) -> u64 {
        self.voters.values().map(|v| v.weight).sum()
    }
}

fn default_shareholders() -> BTreeMap<String, Voter> {
    let seed = [
        ("shareholder_001", "Alice Hartmann", 5u64),
        ("shareholder_002", "Bao Tran", 3),
        ("shareholder_003", "Carla Reyes", 2),
    ];
    seed.into_iter()
        .map(|(voter_id, name, weight)| {
            (
                voter_id.to_owned(),
                Voter {
                    name: name.to_owned(),
                    uuid: Uuid::new_v4(),
                    voter_id: voter_id.to_owned(),
                    voter_type: "shareholder".to_owned(),
                    weight,
                },
            )
        })
        .collect()
}
