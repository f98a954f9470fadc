//! Header and commit verification rules.

use crate::source::LightBlock;
use crate::{ProviderError, Result};
use ostracon_types::{Commit, Header, VoterSet};

fn fail(height: i64, reason: impl Into<String>) -> ProviderError {
    ProviderError::Verification {
        height,
        reason: reason.into(),
    }
}

/// Check that `commit` certifies `header` with strictly more than two
/// thirds of the voter weight.
///
/// Signature slots follow voter-set order; an absent slot contributes
/// nothing. Cryptographic signature checks belong to the consensus
/// engine's key suite, this layer verifies structure and weight.
pub fn verify_commit(header: &Header, commit: &Commit, voters: &VoterSet) -> Result<()> {
    let height = header.height;
    if commit.height != height {
        return Err(fail(
            height,
            format!("commit is for height {}", commit.height),
        ));
    }
    if commit.block_id.hash != header.hash() {
        return Err(fail(height, "commit certifies a different block"));
    }
    if commit.signatures.len() != voters.len() {
        return Err(fail(
            height,
            format!(
                "commit has {} signature slots for {} voters",
                commit.signatures.len(),
                voters.len()
            ),
        ));
    }

    let mut tallied: i64 = 0;
    for (index, sig) in commit.signatures.iter().enumerate() {
        if !sig.is_present() {
            continue;
        }
        let voter = voters
            .get(index)
            .ok_or_else(|| fail(height, "signature slot out of range"))?;
        if sig.validator_address != voter.address {
            return Err(fail(
                height,
                format!("signature slot {index} does not match its voter"),
            ));
        }
        tallied += voter.voting_power;
    }
    if tallied < voters.two_thirds_threshold() {
        return Err(fail(
            height,
            format!(
                "insufficient voting power: tallied {tallied}, need {}",
                voters.two_thirds_threshold()
            ),
        ));
    }
    Ok(())
}

/// Check `block` is internally consistent: its sets hash to what the
/// header commits to, and its commit clears the voter threshold.
pub fn verify_light_block(block: &LightBlock) -> Result<()> {
    let height = block.height();
    if block.validators.hash() != block.header.validators_hash {
        return Err(fail(height, "validator set does not match header"));
    }
    if block.next_validators.hash() != block.header.next_validators_hash {
        return Err(fail(height, "next validator set does not match header"));
    }
    if block.voters.hash() != block.header.voters_hash {
        return Err(fail(height, "voter set does not match header"));
    }
    verify_commit(&block.header, &block.commit, &block.voters)
}

/// Check `next` directly extends `trusted`.
pub fn verify_adjacent(trusted: &LightBlock, next: &LightBlock) -> Result<()> {
    let height = next.height();
    if height != trusted.height() + 1 {
        return Err(fail(
            height,
            format!("expected height {}", trusted.height() + 1),
        ));
    }
    if next.header.chain_id != trusted.header.chain_id {
        return Err(fail(height, "chain id changed"));
    }
    if next.header.last_block_id.hash != trusted.header.hash() {
        return Err(fail(height, "header does not link to trusted header"));
    }
    if next.header.validators_hash != trusted.header.next_validators_hash {
        return Err(fail(
            height,
            "validator set does not match the one announced by the trusted header",
        ));
    }
    verify_light_block(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ostracon_types::{BlockId, CommitSig, Validator};

    fn voter(id: u8, power: i64) -> Validator {
        Validator::new(vec![id; 20], vec![id; 32], power)
    }

    fn signed_commit(header: &Header, voters: &VoterSet, present: &[bool]) -> Commit {
        let signatures = voters
            .voters
            .iter()
            .zip(present)
            .map(|(v, &p)| {
                if p {
                    CommitSig {
                        validator_address: v.address.clone(),
                        timestamp: header.time,
                        signature: vec![1; 64],
                    }
                } else {
                    CommitSig::absent()
                }
            })
            .collect();
        Commit {
            height: header.height,
            round: 0,
            block_id: BlockId {
                hash: header.hash(),
                part_set_header: Default::default(),
            },
            signatures,
        }
    }

    #[test]
    fn test_commit_meets_threshold() {
        let voters = VoterSet::new(vec![voter(1, 10), voter(2, 10), voter(3, 10)]);
        let header = Header {
            height: 5,
            ..Default::default()
        };
        let commit = signed_commit(&header, &voters, &[true, true, true]);
        assert!(verify_commit(&header, &commit, &voters).is_ok());
    }

    #[test]
    fn test_commit_below_threshold_rejected() {
        let voters = VoterSet::new(vec![voter(1, 10), voter(2, 10), voter(3, 10)]);
        let header = Header {
            height: 5,
            ..Default::default()
        };
        // 20 of 30 tallied; threshold is 21.
        let commit = signed_commit(&header, &voters, &[true, true, false]);
        let err = verify_commit(&header, &commit, &voters).unwrap_err();
        assert!(matches!(err, ProviderError::Verification { height: 5, .. }));
    }

    #[test]
    fn test_commit_for_wrong_block_rejected() {
        let voters = VoterSet::new(vec![voter(1, 10)]);
        let header = Header {
            height: 5,
            ..Default::default()
        };
        let other = Header {
            height: 5,
            chain_id: "other".into(),
            ..Default::default()
        };
        let commit = signed_commit(&other, &voters, &[true]);
        assert!(verify_commit(&header, &commit, &voters).is_err());
    }
}
