//! Sequential light client over a primary source plus witnesses.

use crate::source::{BlockSource, LightBlock, TrustOptions};
use crate::verifier;
use crate::{ProviderError, Result};
use ostracon_types::Hash;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Light client: fetches light blocks from its sources and verifies them
/// sequentially from a subjective trust anchor.
///
/// The first source is the primary; when it fails for a height the
/// witnesses are tried in order. Verified blocks are cached so the state
/// provider can ask for neighbouring heights without refetching.
pub struct LightClient {
    sources: Vec<Arc<dyn BlockSource>>,
    trust: TrustOptions,
    verified: HashMap<i64, Arc<LightBlock>>,
    /// Highest height in `verified` that chains back to the anchor.
    latest_verified: Option<i64>,
}

impl std::fmt::Debug for LightClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightClient")
            .field(
                "sources",
                &self.sources.iter().map(|s| s.id()).collect::<Vec<_>>(),
            )
            .field("trust", &self.trust)
            .field("verified", &self.verified.len())
            .field("latest_verified", &self.latest_verified)
            .finish()
    }
}

impl LightClient {
    /// Create a light client from at least two distinct sources and a
    /// trust anchor.
    pub fn new(sources: Vec<Arc<dyn BlockSource>>, trust: TrustOptions) -> Result<Self> {
        if sources.len() < 2 {
            return Err(ProviderError::InsufficientProviders(sources.len()));
        }
        trust.validate()?;
        Ok(Self {
            sources,
            trust,
            verified: HashMap::new(),
            latest_verified: None,
        })
    }

    /// The trust anchor this client was initialized with.
    pub fn trust_options(&self) -> &TrustOptions {
        &self.trust
    }

    /// Return the verified light block at `height`, fetching and verifying
    /// everything between the anchor and `height` as needed.
    pub async fn verify_to_height(&mut self, height: i64) -> Result<Arc<LightBlock>> {
        if height < self.trust.height {
            return Err(ProviderError::Verification {
                height,
                reason: format!("below the trusted height {}", self.trust.height),
            });
        }
        if let Some(block) = self.verified.get(&height) {
            return Ok(Arc::clone(block));
        }

        if self.latest_verified.is_none() {
            self.verify_anchor().await?;
        }
        let mut latest = match self.latest_verified {
            Some(h) => h,
            None => self.trust.height,
        };

        while latest < height {
            let trusted = match self.verified.get(&latest) {
                Some(b) => Arc::clone(b),
                None => return Err(ProviderError::NoSource(latest)),
            };
            let next = self.fetch(latest + 1).await?;
            verifier::verify_adjacent(&trusted, &next)?;
            latest += 1;
            debug!("light: verified header at height {latest}");
            self.verified.insert(latest, Arc::new(next));
            self.latest_verified = Some(latest);
        }

        match self.verified.get(&height) {
            Some(b) => Ok(Arc::clone(b)),
            None => Err(ProviderError::NoSource(height)),
        }
    }

    /// Fetch and check the anchor block: its hash must match the trusted
    /// hash, and its time must fall inside the trust period.
    async fn verify_anchor(&mut self) -> Result<()> {
        let anchor = self.fetch(self.trust.height).await?;
        let hash = anchor.header.hash();
        if hash != self.trust.hash {
            return Err(ProviderError::Verification {
                height: self.trust.height,
                reason: format!(
                    "header hash {hash} does not match the trusted hash {}",
                    self.trust.hash
                ),
            });
        }
        self.check_trust_period(&anchor)?;
        verifier::verify_light_block(&anchor)?;
        self.verified.insert(anchor.height(), Arc::new(anchor));
        self.latest_verified = Some(self.trust.height);
        Ok(())
    }

    fn check_trust_period(&self, anchor: &LightBlock) -> Result<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        let header_time = Duration::from_nanos(anchor.header.time.max(0) as u64);
        if now.saturating_sub(header_time) > self.trust.period {
            return Err(ProviderError::OutsideTrustPeriod {
                height: anchor.height(),
            });
        }
        Ok(())
    }

    /// Fetch `height` from the primary, falling over to witnesses.
    async fn fetch(&self, height: i64) -> Result<LightBlock> {
        for source in &self.sources {
            match source.light_block(height).await {
                Ok(block) => return Ok(block),
                Err(err) => {
                    warn!(
                        "light: source {} failed for height {height}: {err}",
                        source.id()
                    );
                }
            }
        }
        Err(ProviderError::NoSource(height))
    }

    /// Fetch the consensus parameters at `height`, with witness fallback.
    pub async fn consensus_params(
        &self,
        height: i64,
    ) -> Result<ostracon_types::ConsensusParams> {
        for source in &self.sources {
            match source.consensus_params(height).await {
                Ok(params) => return Ok(params),
                Err(err) => {
                    warn!(
                        "light: source {} failed for params at height {height}: {err}",
                        source.id()
                    );
                }
            }
        }
        Err(ProviderError::NoSource(height))
    }

    /// Hash of the verified header at `height`, if already verified.
    pub fn verified_hash(&self, height: i64) -> Option<Hash> {
        self.verified.get(&height).map(|b| b.header.hash())
    }
}
