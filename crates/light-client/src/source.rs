//! Block sources and the trust anchor.

use crate::{ProviderError, Result};
use async_trait::async_trait;
use ostracon_types::{Commit, ConsensusParams, Hash, Header, ValidatorSet, VoterSet};
use std::time::Duration;

/// Everything the light client needs about one height: the signed header
/// plus the sets it is verified against.
#[derive(Debug, Clone)]
pub struct LightBlock {
    /// The header at this height.
    pub header: Header,
    /// Commit certifying the header.
    pub commit: Commit,
    /// Validator set at this height.
    pub validators: ValidatorSet,
    /// Validator set at the next height.
    pub next_validators: ValidatorSet,
    /// Voter subset whose signatures appear in the commit.
    pub voters: VoterSet,
}

impl LightBlock {
    /// Height shortcut.
    pub fn height(&self) -> i64 {
        self.header.height
    }
}

/// The subjective trust anchor a light client starts from. Obtained out of
/// band (operator, block explorer); everything after it is verified.
#[derive(Debug, Clone)]
pub struct TrustOptions {
    /// How long the anchor header stays trustworthy.
    pub period: Duration,
    /// Height of the trusted header.
    pub height: i64,
    /// Hash of the trusted header.
    pub hash: Hash,
}

impl TrustOptions {
    /// Check the anchor is usable.
    pub fn validate(&self) -> Result<()> {
        if self.period.is_zero() {
            return Err(ProviderError::InvalidTrustPeriod);
        }
        if self.height <= 0 {
            return Err(ProviderError::InvalidTrustHeight);
        }
        Ok(())
    }
}

/// One backing endpoint the light client can fetch blocks from. The first
/// source is the primary; the rest are witnesses used when it fails.
#[async_trait]
pub trait BlockSource: Send + Sync + 'static {
    /// Identifier for logs, usually the endpoint address.
    fn id(&self) -> &str;

    /// Fetch the light block at `height`.
    async fn light_block(&self, height: i64) -> Result<LightBlock>;

    /// Fetch the consensus parameters in force at `height`.
    async fn consensus_params(&self, height: i64) -> Result<ConsensusParams>;
}
