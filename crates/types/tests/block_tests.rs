//! Tests for block structures and signer sets.

use ostracon_types::{Block, CommitSig, Header, Validator, ValidatorSet, VoterSet};

fn val(id: u8, power: i64) -> Validator {
    Validator::new(vec![id; 20], vec![id; 32], power)
}

#[test]
fn test_header_hash_changes_with_height() {
    let mut header = Header {
        chain_id: "test-chain".to_string(),
        height: 1,
        ..Default::default()
    };
    let h1 = header.hash();
    header.height = 2;
    assert_ne!(h1, header.hash());
}

#[test]
fn test_block_height_shortcut() {
    let block = Block {
        header: Header {
            height: 42,
            ..Default::default()
        },
        ..Default::default()
    };
    assert_eq!(block.height(), 42);
}

#[test]
fn test_commit_sig_absent() {
    let sig = CommitSig::absent();
    assert!(!sig.is_present());
}

#[test]
fn test_validator_set_total_power() {
    let set = ValidatorSet::new(vec![val(1, 10), val(2, 20), val(3, 30)]).unwrap();
    assert_eq!(set.total_voting_power(), 60);
    assert_eq!(set.len(), 3);
}

#[test]
fn test_voter_set_hash_depends_on_weights() {
    let a = VoterSet::new(vec![val(1, 10)]);
    let b = VoterSet::new(vec![val(1, 11)]);
    assert_ne!(a.hash(), b.hash());
}
