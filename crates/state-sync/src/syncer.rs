//! The snapshot restore state machine.
//!
//! A restore walks discovery, offer, fetch, apply, verify: the best pooled
//! snapshot is offered to the application together with the light-client
//! verified app hash, its chunks are fetched from peers in parallel and
//! applied strictly in order, and the application's post-restore `Info` is
//! checked against the verified hash before the chain state is handed up.

use crate::chunks::{Chunk, ChunkQueue};
use crate::messages::{encode_msg, ChunkRequest, SnapshotsRequest, CHUNK_CHANNEL, SNAPSHOT_CHANNEL};
use crate::snapshots::{Snapshot, SnapshotPool};
use crate::{Result, StateSyncError};
use async_trait::async_trait;
use ostracon_abci::proto::{
    self, ApplySnapshotChunkResult, OfferSnapshotResult, RequestApplySnapshotChunk, RequestInfo,
    RequestOfferSnapshot,
};
use ostracon_abci::Client;
use ostracon_config::StateSyncConfig;
use ostracon_core::{ChannelSender, PeerId};
use ostracon_light_client::StateProvider;
use ostracon_types::{ChainState, Commit, Hash};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long an idle fetcher waits before looking for reclaimable chunks.
const FETCHER_IDLE_WAIT: Duration = Duration::from_millis(200);

/// Source of light-client-verified chain state, keyed by snapshot height.
#[async_trait]
pub trait StateSource: Send + Sync {
    /// The verified app hash after executing `height`.
    async fn app_hash(&self, height: u64) -> Result<Hash>;

    /// The verified commit certifying `height`.
    async fn commit(&self, height: u64) -> Result<Commit>;

    /// The verified chain state at `height`.
    async fn state(&self, height: u64) -> Result<ChainState>;
}

#[async_trait]
impl StateSource for StateProvider {
    async fn app_hash(&self, height: u64) -> Result<Hash> {
        Ok(StateProvider::app_hash(self, height as i64).await?)
    }

    async fn commit(&self, height: u64) -> Result<Commit> {
        Ok(StateProvider::commit(self, height as i64).await?)
    }

    async fn state(&self, height: u64) -> Result<ChainState> {
        Ok(StateProvider::state(self, height as i64).await?)
    }
}

/// Drives a snapshot restore against the local application.
pub struct Syncer {
    conn: Arc<dyn Client>,
    conn_query: Arc<dyn Client>,
    source: Arc<dyn StateSource>,
    transport: Arc<dyn ChannelSender>,
    pool: Arc<SnapshotPool>,
    current: Mutex<Option<Arc<ChunkQueue>>>,
    temp_dir: std::path::PathBuf,
    chunk_timeout: Duration,
    chunk_fetchers: usize,
}

impl Syncer {
    /// Create a syncer over the snapshot and query connections to the
    /// application.
    pub fn new(
        config: &StateSyncConfig,
        conn: Arc<dyn Client>,
        conn_query: Arc<dyn Client>,
        source: Arc<dyn StateSource>,
        transport: Arc<dyn ChannelSender>,
    ) -> Self {
        Self {
            conn,
            conn_query,
            source,
            transport,
            pool: Arc::new(SnapshotPool::new()),
            current: Mutex::new(None),
            temp_dir: config.temp_dir.clone(),
            chunk_timeout: config.chunk_request_timeout(),
            chunk_fetchers: config.chunk_fetchers.max(1),
        }
    }

    /// Record a snapshot advertised by `peer`. Returns true when it is new.
    pub fn add_snapshot(&self, peer: &PeerId, snapshot: Snapshot) -> bool {
        let added = self.pool.add(peer, snapshot.clone());
        if added {
            info!(
                "statesync: discovered snapshot height={} format={} peer={peer}",
                snapshot.height, snapshot.format
            );
        }
        added
    }

    /// Route a fetched chunk into the restore in progress. Chunks for
    /// other snapshots (stale responses) are dropped.
    pub fn add_chunk(&self, chunk: Chunk) -> Result<bool> {
        let queue = match &*self.current.lock() {
            Some(queue) => Arc::clone(queue),
            None => return Ok(false),
        };
        let snapshot = queue.snapshot();
        if chunk.height != snapshot.height || chunk.format != snapshot.format {
            debug!(
                "statesync: ignoring chunk for snapshot height={} format={}",
                chunk.height, chunk.format
            );
            return Ok(false);
        }
        queue.add(chunk)
    }

    /// Greet a new peer by asking for its snapshots.
    pub async fn add_peer(&self, peer: &PeerId) -> Result<()> {
        debug!("statesync: requesting snapshots from peer {peer}");
        self.transport
            .send(peer, SNAPSHOT_CHANNEL, encode_msg(SnapshotsRequest {}))
            .await?;
        Ok(())
    }

    /// Forget a disconnected peer's snapshots.
    pub fn remove_peer(&self, peer: &PeerId) {
        self.pool.remove_peer(peer);
    }

    /// Restore from the best available snapshot, discovering and retrying
    /// until one succeeds or the application aborts.
    ///
    /// With a zero `discovery_time` no waiting is done: an empty pool
    /// fails immediately with [`StateSyncError::NoSnapshots`].
    pub async fn sync_any(&self, discovery_time: Duration) -> Result<(ChainState, Commit)> {
        if !discovery_time.is_zero() {
            self.request_snapshots().await;
            tokio::time::sleep(discovery_time).await;
        }
        loop {
            let snapshot = match self.pool.best() {
                Some(snapshot) => snapshot,
                None if discovery_time.is_zero() => return Err(StateSyncError::NoSnapshots),
                None => {
                    self.request_snapshots().await;
                    tokio::time::sleep(discovery_time).await;
                    continue;
                }
            };
            match self.sync(&snapshot).await {
                Ok(result) => return Ok(result),
                Err(StateSyncError::Aborted) => return Err(StateSyncError::Aborted),
                Err(StateSyncError::SnapshotRejected) => {
                    info!(
                        "statesync: snapshot height={} format={} rejected, trying next",
                        snapshot.height, snapshot.format
                    );
                    self.pool.reject(&snapshot);
                }
                Err(StateSyncError::SnapshotAppHashMismatch) => {
                    warn!(
                        "statesync: snapshot height={} failed app hash verification, trying next",
                        snapshot.height
                    );
                    self.pool.reject(&snapshot);
                }
                Err(StateSyncError::RetrySnapshot) => {
                    info!(
                        "statesync: retrying snapshot height={} format={}",
                        snapshot.height, snapshot.format
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Restore from one specific snapshot.
    pub async fn sync(&self, snapshot: &Snapshot) -> Result<(ChainState, Commit)> {
        // Verify the height is trustworthy before offering anything.
        let app_hash = self.source.app_hash(snapshot.height).await?;

        self.offer_snapshot(snapshot, app_hash).await?;

        let queue = ChunkQueue::new(snapshot.clone(), &self.temp_dir)?;
        *self.current.lock() = Some(Arc::clone(&queue));
        let fetchers = self.spawn_fetchers(&queue, snapshot);

        let result = self.apply_chunks(&queue, snapshot).await;

        queue.close();
        *self.current.lock() = None;
        for fetcher in fetchers {
            let _ = fetcher.await;
        }
        result?;

        self.verify_app_hash(snapshot, app_hash).await?;

        info!(
            "statesync: snapshot restored at height={} format={}",
            snapshot.height, snapshot.format
        );
        let state = self.source.state(snapshot.height).await?;
        let commit = self.source.commit(snapshot.height).await?;
        Ok((state, commit))
    }

    async fn offer_snapshot(&self, snapshot: &Snapshot, app_hash: Hash) -> Result<()> {
        debug!(
            "statesync: offering snapshot height={} format={}",
            snapshot.height, snapshot.format
        );
        let res = self
            .conn
            .offer_snapshot_sync(RequestOfferSnapshot {
                snapshot: Some(proto::Snapshot {
                    height: snapshot.height,
                    format: snapshot.format,
                    chunks: snapshot.chunks,
                    hash: snapshot.hash.clone(),
                    metadata: snapshot.metadata.clone(),
                }),
                app_hash: bytes::Bytes::copy_from_slice(app_hash.as_bytes()),
            })
            .await?;
        match res.result() {
            OfferSnapshotResult::Accept => Ok(()),
            OfferSnapshotResult::Abort => Err(StateSyncError::Aborted),
            OfferSnapshotResult::Reject => Err(StateSyncError::SnapshotRejected),
            OfferSnapshotResult::RejectFormat => {
                self.pool.reject_format(snapshot.format);
                Err(StateSyncError::SnapshotRejected)
            }
            OfferSnapshotResult::RejectSender => {
                for peer in self.pool.get_peers(snapshot) {
                    self.ban_peer(&peer, "snapshot sender rejected by application")
                        .await;
                }
                Err(StateSyncError::SnapshotRejected)
            }
            OfferSnapshotResult::Unknown => Err(StateSyncError::SnapshotRejected),
        }
    }

    fn spawn_fetchers(&self, queue: &Arc<ChunkQueue>, snapshot: &Snapshot) -> Vec<JoinHandle<()>> {
        (0..self.chunk_fetchers)
            .map(|_| {
                let queue = Arc::clone(queue);
                let snapshot = snapshot.clone();
                let pool = Arc::clone(&self.pool);
                let transport = Arc::clone(&self.transport);
                let timeout = self.chunk_timeout;
                tokio::spawn(async move {
                    fetch_chunks(queue, snapshot, pool, transport, timeout).await;
                })
            })
            .collect()
    }

    async fn apply_chunks(&self, queue: &Arc<ChunkQueue>, snapshot: &Snapshot) -> Result<()> {
        let mut applied: u32 = 0;
        while applied < snapshot.chunks {
            let chunk = match queue.next().await {
                Some(chunk) => chunk,
                None => return Err(StateSyncError::ChunkQueueClosed),
            };
            let res = self
                .conn
                .apply_snapshot_chunk_sync(RequestApplySnapshotChunk {
                    index: chunk.index,
                    chunk: chunk.chunk.clone(),
                    sender: chunk.sender.to_string(),
                })
                .await?;

            // Side requests apply regardless of the verdict.
            for sender in &res.reject_senders {
                let peer = PeerId::from_bytes(hex::decode(sender).unwrap_or_default());
                self.ban_peer(&peer, "chunk sender rejected by application")
                    .await;
                queue.discard_sender(&peer);
            }
            for index in &res.refetch_chunks {
                debug!("statesync: refetching chunk {index}");
                queue.discard(*index);
            }

            match res.result() {
                ApplySnapshotChunkResult::Accept => {
                    applied = chunk.index + 1;
                }
                ApplySnapshotChunkResult::Retry => {
                    queue.retry(chunk.index);
                }
                ApplySnapshotChunkResult::Abort => return Err(StateSyncError::Aborted),
                ApplySnapshotChunkResult::RetrySnapshot => {
                    return Err(StateSyncError::RetrySnapshot)
                }
                ApplySnapshotChunkResult::RejectSnapshot => {
                    return Err(StateSyncError::SnapshotRejected)
                }
                ApplySnapshotChunkResult::Unknown => return Err(StateSyncError::SnapshotRejected),
            }
        }
        Ok(())
    }

    /// Compare the application's post-restore report against the verified
    /// header.
    async fn verify_app_hash(&self, snapshot: &Snapshot, app_hash: Hash) -> Result<()> {
        let info = self.conn_query.info_sync(RequestInfo::default()).await?;
        if info.last_block_app_hash != app_hash.as_bytes() {
            warn!(
                "statesync: app hash mismatch at height={}: expected {app_hash}, app reported {}",
                snapshot.height,
                hex::encode(&info.last_block_app_hash)
            );
            return Err(StateSyncError::SnapshotAppHashMismatch);
        }
        if info.last_block_height != snapshot.height as i64 {
            warn!(
                "statesync: height mismatch: snapshot {} but app reported {}",
                snapshot.height, info.last_block_height
            );
            return Err(StateSyncError::SnapshotAppHashMismatch);
        }
        Ok(())
    }

    async fn request_snapshots(&self) {
        for peer in self.transport.connected_peers() {
            if let Err(err) = self.add_peer(&peer).await {
                debug!("statesync: snapshot request to {peer} failed: {err}");
            }
        }
    }

    async fn ban_peer(&self, peer: &PeerId, reason: &str) {
        warn!("statesync: banning peer {peer}: {reason}");
        self.pool.reject_peer(peer);
        if let Err(err) = self.transport.ban_peer(peer, reason).await {
            debug!("statesync: could not ban peer {peer}: {err}");
        }
    }
}

/// One chunk-fetch worker: claims indexes, requests them from random
/// peers, and re-queues on timeout. Exits when the queue closes.
async fn fetch_chunks(
    queue: Arc<ChunkQueue>,
    snapshot: Snapshot,
    pool: Arc<SnapshotPool>,
    transport: Arc<dyn ChannelSender>,
    timeout: Duration,
) {
    loop {
        let index = match queue.allocate() {
            Ok(Some(index)) => index,
            Ok(None) => {
                // All claimed; wait in case a discard frees one up.
                tokio::time::sleep(FETCHER_IDLE_WAIT).await;
                continue;
            }
            Err(_) => return,
        };

        let peer = match pool.get_peer(&snapshot) {
            Some(peer) => peer,
            None => {
                queue.discard(index);
                tokio::time::sleep(FETCHER_IDLE_WAIT).await;
                continue;
            }
        };

        debug!("statesync: fetching chunk {index} from peer {peer}");
        let request = ChunkRequest {
            height: snapshot.height,
            format: snapshot.format,
            index,
        };
        if let Err(err) = transport
            .send(&peer, CHUNK_CHANNEL, encode_msg(request))
            .await
        {
            debug!("statesync: chunk request to {peer} failed: {err}");
            pool.remove_peer(&peer);
            queue.discard(index);
            continue;
        }

        if !queue.wait_for(index, timeout).await {
            debug!("statesync: chunk {index} timed out, re-queueing");
            queue.discard(index);
        }
    }
}
