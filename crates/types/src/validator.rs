//! Validator and voter sets.
//!
//! Ostracon elects a weighted voter subset of the validator set each height
//! (VRF-based; the election itself is the consensus engine's business).
//! This module carries the sets as data and answers the weighted-threshold
//! questions the light client asks.

use crate::{Error, Hash, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single validator: identity plus voting power.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Address derived from the public key.
    pub address: Vec<u8>,
    /// Public key bytes (suite-agnostic at this layer).
    pub pub_key: Vec<u8>,
    /// Voting power.
    pub voting_power: i64,
}

impl Validator {
    /// Create a new validator.
    pub fn new(address: Vec<u8>, pub_key: Vec<u8>, voting_power: i64) -> Self {
        Self {
            address,
            pub_key,
            voting_power,
        }
    }
}

/// The full validator set at a height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ValidatorSet {
    /// Validators, in canonical order.
    pub validators: Vec<Validator>,
}

impl ValidatorSet {
    /// Create a set, rejecting duplicate addresses.
    pub fn new(validators: Vec<Validator>) -> Result<Self> {
        let mut seen: HashMap<&[u8], ()> = HashMap::with_capacity(validators.len());
        for v in &validators {
            if seen.insert(v.address.as_slice(), ()).is_some() {
                return Err(Error::InvalidValidatorSet(format!(
                    "duplicate validator address {}",
                    hex::encode(&v.address)
                )));
            }
            if v.voting_power < 0 {
                return Err(Error::InvalidValidatorSet(format!(
                    "negative voting power for {}",
                    hex::encode(&v.address)
                )));
            }
        }
        Ok(Self { validators })
    }

    /// Sum of all voting power.
    pub fn total_voting_power(&self) -> i64 {
        self.validators.iter().map(|v| v.voting_power).sum()
    }

    /// Number of validators.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Look up a validator by address.
    pub fn get(&self, address: &[u8]) -> Option<&Validator> {
        self.validators.iter().find(|v| v.address == address)
    }

    /// Deterministic hash of the set.
    pub fn hash(&self) -> Hash {
        let mut buf = Vec::new();
        for v in &self.validators {
            buf.extend_from_slice(&v.address);
            buf.extend_from_slice(&v.pub_key);
            buf.extend_from_slice(&v.voting_power.to_be_bytes());
        }
        Hash::sha256(&buf)
    }
}

/// The voter subset sampled from the validator set for one height.
///
/// Voter weights may differ from the underlying validators' staking power;
/// commits are verified against voter weights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VoterSet {
    /// Voters, in sampling order (commit signature slots follow this order).
    pub voters: Vec<Validator>,
}

impl VoterSet {
    /// Create a voter set from the sampled voters.
    pub fn new(voters: Vec<Validator>) -> Self {
        Self { voters }
    }

    /// Sum of the voters' weights.
    pub fn total_voting_power(&self) -> i64 {
        self.voters.iter().map(|v| v.voting_power).sum()
    }

    /// Minimum weight for a commit to be accepted: strictly more than 2/3.
    pub fn two_thirds_threshold(&self) -> i64 {
        self.total_voting_power() * 2 / 3 + 1
    }

    /// Number of voters.
    pub fn len(&self) -> usize {
        self.voters.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.voters.is_empty()
    }

    /// Voter at a signature slot index.
    pub fn get(&self, index: usize) -> Option<&Validator> {
        self.voters.get(index)
    }

    /// Deterministic hash of the set.
    pub fn hash(&self) -> Hash {
        let mut buf = Vec::new();
        for v in &self.voters {
            buf.extend_from_slice(&v.address);
            buf.extend_from_slice(&v.voting_power.to_be_bytes());
        }
        Hash::sha256(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn val(id: u8, power: i64) -> Validator {
        Validator::new(vec![id; 20], vec![id; 32], power)
    }

    #[test]
    fn rejects_duplicate_addresses() {
        assert!(ValidatorSet::new(vec![val(1, 10), val(1, 20)]).is_err());
        assert!(ValidatorSet::new(vec![val(1, 10), val(2, 20)]).is_ok());
    }

    #[test]
    fn two_thirds_threshold_is_strict() {
        let voters = VoterSet::new(vec![val(1, 1), val(2, 1), val(3, 1)]);
        // total 3, need strictly more than 2
        assert_eq!(voters.two_thirds_threshold(), 3);
        let voters = VoterSet::new(vec![val(1, 50), val(2, 50)]);
        assert_eq!(voters.two_thirds_threshold(), 67);
    }
}
