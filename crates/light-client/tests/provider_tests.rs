//! State-provider integration tests over a mock block source.

use async_trait::async_trait;
use ostracon_light_client::{
    BlockSource, LightBlock, LightClient, ProviderError, StateProvider, TrustOptions,
};
use ostracon_types::{
    BlockId, Commit, CommitSig, ConsensusParams, Hash, Header, Validator, ValidatorSet, VoterSet,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const CHAIN_ID: &str = "test-chain";

fn val(id: u8, power: i64) -> Validator {
    Validator::new(vec![id; 20], vec![id; 32], power)
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as i64
}

/// Build a fully signed chain of `n` light blocks starting at height 1.
fn build_chain(n: i64) -> Vec<LightBlock> {
    let validators = ValidatorSet::new(vec![val(1, 10), val(2, 10), val(3, 10)]).unwrap();
    let voters = VoterSet::new(validators.validators.clone());
    let time = now_nanos();

    let mut chain = Vec::with_capacity(n as usize);
    let mut prev_hash = Hash::default();
    for height in 1..=n {
        let header = Header {
            chain_id: CHAIN_ID.into(),
            height,
            time,
            last_block_id: BlockId {
                hash: prev_hash,
                part_set_header: Default::default(),
            },
            validators_hash: validators.hash(),
            next_validators_hash: validators.hash(),
            voters_hash: voters.hash(),
            app_hash: Hash::sha256(&height.to_be_bytes()),
            last_results_hash: Hash::sha256(&(height * 31).to_be_bytes()),
            ..Default::default()
        };
        prev_hash = header.hash();
        let signatures = voters
            .voters
            .iter()
            .map(|v| CommitSig {
                validator_address: v.address.clone(),
                timestamp: time,
                signature: vec![7; 64],
            })
            .collect();
        let commit = Commit {
            height,
            round: 0,
            block_id: BlockId {
                hash: prev_hash,
                part_set_header: Default::default(),
            },
            signatures,
        };
        chain.push(LightBlock {
            header,
            commit,
            validators: validators.clone(),
            next_validators: validators.clone(),
            voters: voters.clone(),
        });
    }
    chain
}

struct MockSource {
    id: String,
    blocks: HashMap<i64, LightBlock>,
    broken: bool,
}

impl MockSource {
    fn new(id: &str, chain: &[LightBlock]) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            blocks: chain.iter().map(|b| (b.height(), b.clone())).collect(),
            broken: false,
        })
    }

    fn broken(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            blocks: HashMap::new(),
            broken: true,
        })
    }
}

#[async_trait]
impl BlockSource for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn light_block(&self, height: i64) -> ostracon_light_client::Result<LightBlock> {
        if self.broken {
            return Err(ProviderError::Source("connection refused".into()));
        }
        self.blocks
            .get(&height)
            .cloned()
            .ok_or(ProviderError::NoSource(height))
    }

    async fn consensus_params(
        &self,
        _height: i64,
    ) -> ostracon_light_client::Result<ConsensusParams> {
        if self.broken {
            return Err(ProviderError::Source("connection refused".into()));
        }
        Ok(ConsensusParams::default())
    }
}

fn trust_at(chain: &[LightBlock], height: i64) -> TrustOptions {
    TrustOptions {
        period: Duration::from_secs(3600),
        height,
        hash: chain[(height - 1) as usize].header.hash(),
    }
}

#[tokio::test]
async fn test_requires_two_sources() {
    let chain = build_chain(3);
    let sources: Vec<Arc<dyn BlockSource>> = vec![MockSource::new("a", &chain)];
    let err = LightClient::new(sources, trust_at(&chain, 1)).unwrap_err();
    assert!(matches!(err, ProviderError::InsufficientProviders(1)));
}

#[tokio::test]
async fn test_rejects_bad_trust_options() {
    let chain = build_chain(3);
    let sources: Vec<Arc<dyn BlockSource>> =
        vec![MockSource::new("a", &chain), MockSource::new("b", &chain)];
    let trust = TrustOptions {
        period: Duration::ZERO,
        height: 1,
        hash: chain[0].header.hash(),
    };
    let err = LightClient::new(sources, trust).unwrap_err();
    assert!(matches!(err, ProviderError::InvalidTrustPeriod));
}

#[tokio::test]
async fn test_verifies_sequentially_from_anchor() {
    let chain = build_chain(6);
    let sources: Vec<Arc<dyn BlockSource>> =
        vec![MockSource::new("a", &chain), MockSource::new("b", &chain)];
    let mut light = LightClient::new(sources, trust_at(&chain, 1)).unwrap();
    let block = light.verify_to_height(5).await.unwrap();
    assert_eq!(block.height(), 5);
    // Intermediate heights were verified along the way.
    assert!(light.verified_hash(3).is_some());
}

#[tokio::test]
async fn test_rejects_anchor_hash_mismatch() {
    let chain = build_chain(3);
    let sources: Vec<Arc<dyn BlockSource>> =
        vec![MockSource::new("a", &chain), MockSource::new("b", &chain)];
    let trust = TrustOptions {
        period: Duration::from_secs(3600),
        height: 1,
        hash: Hash::sha256(b"not the real header"),
    };
    let mut light = LightClient::new(sources, trust).unwrap();
    let err = light.verify_to_height(1).await.unwrap_err();
    assert!(matches!(err, ProviderError::Verification { height: 1, .. }));
}

#[tokio::test]
async fn test_rejects_tampered_header() {
    let mut chain = build_chain(4);
    let trust = trust_at(&chain, 1);
    // Tamper with height 3: the commit no longer certifies the header.
    chain[2].header.app_hash = Hash::sha256(b"tampered");
    let sources: Vec<Arc<dyn BlockSource>> =
        vec![MockSource::new("a", &chain), MockSource::new("b", &chain)];
    let mut light = LightClient::new(sources, trust).unwrap();
    let err = light.verify_to_height(4).await.unwrap_err();
    assert!(matches!(err, ProviderError::Verification { height: 3, .. }));
}

#[tokio::test]
async fn test_falls_over_to_witness() {
    let chain = build_chain(4);
    let sources: Vec<Arc<dyn BlockSource>> = vec![
        MockSource::broken("primary"),
        MockSource::new("witness", &chain),
    ];
    let mut light = LightClient::new(sources, trust_at(&chain, 1)).unwrap();
    let block = light.verify_to_height(3).await.unwrap();
    assert_eq!(block.height(), 3);
}

#[tokio::test]
async fn test_rejects_expired_anchor() {
    let mut chain = build_chain(2);
    // Re-sign height 1 with an old timestamp so the trust period lapses.
    chain[0].header.time = 1_000_000_000;
    let trust = TrustOptions {
        period: Duration::from_secs(10),
        height: 1,
        hash: chain[0].header.hash(),
    };
    chain[0].commit.block_id.hash = chain[0].header.hash();
    let sources: Vec<Arc<dyn BlockSource>> =
        vec![MockSource::new("a", &chain), MockSource::new("b", &chain)];
    let mut light = LightClient::new(sources, trust).unwrap();
    let err = light.verify_to_height(1).await.unwrap_err();
    assert!(matches!(
        err,
        ProviderError::OutsideTrustPeriod { height: 1 }
    ));
}

#[tokio::test]
async fn test_app_hash_comes_from_next_header() {
    let chain = build_chain(5);
    let sources: Vec<Arc<dyn BlockSource>> =
        vec![MockSource::new("a", &chain), MockSource::new("b", &chain)];
    let provider = StateProvider::new(CHAIN_ID, sources, trust_at(&chain, 1)).unwrap();
    let app_hash = provider.app_hash(3).await.unwrap();
    assert_eq!(app_hash, chain[3].header.app_hash);
}

#[tokio::test]
async fn test_state_is_fully_populated() {
    let chain = build_chain(6);
    let sources: Vec<Arc<dyn BlockSource>> =
        vec![MockSource::new("a", &chain), MockSource::new("b", &chain)];
    let provider = StateProvider::new(CHAIN_ID, sources, trust_at(&chain, 1)).unwrap();
    let state = provider.state(3).await.unwrap();

    assert_eq!(state.chain_id, CHAIN_ID);
    assert_eq!(state.last_block_height, 3);
    assert_eq!(state.last_block_id.hash, chain[2].header.hash());
    assert_eq!(state.app_hash, chain[3].header.app_hash);
    assert_eq!(state.last_results_hash, chain[3].header.last_results_hash);
    assert_eq!(state.validators, chain[3].validators);
    assert_eq!(state.next_validators, chain[4].validators);
    assert_eq!(state.last_validators, chain[2].validators);
    assert_eq!(state.last_height_validators_changed, 5);
    assert_eq!(state.consensus_params, ConsensusParams::default());
    assert!(state.is_bootstrapped());
}

#[tokio::test]
async fn test_commit_matches_requested_height() {
    let chain = build_chain(4);
    let sources: Vec<Arc<dyn BlockSource>> =
        vec![MockSource::new("a", &chain), MockSource::new("b", &chain)];
    let provider = StateProvider::new(CHAIN_ID, sources, trust_at(&chain, 1)).unwrap();
    let commit = provider.commit(2).await.unwrap();
    assert_eq!(commit.height, 2);
    assert_eq!(commit.block_id.hash, chain[1].header.hash());
}
