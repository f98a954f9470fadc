//! Discovered-snapshot pool with peer attribution and blacklists.

use crate::messages::SnapshotsResponse;
use bytes::Bytes;
use ostracon_core::PeerId;
use ostracon_types::Hash;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::collections::{BTreeSet, HashMap, HashSet};

/// How many snapshots to keep track of per peer, and to serve to a peer.
pub const RECENT_SNAPSHOTS: usize = 10;

/// A snapshot advertised by one or more peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Height the snapshot was taken at.
    pub height: u64,
    /// Application-defined snapshot format.
    pub format: u32,
    /// Number of chunks; may be zero.
    pub chunks: u32,
    /// Application-defined snapshot digest.
    pub hash: Bytes,
    /// Opaque application metadata.
    pub metadata: Bytes,
}

impl Snapshot {
    /// Identity of the snapshot within the pool. Metadata is deliberately
    /// excluded: two advertisements differing only in metadata are the
    /// same snapshot.
    pub fn key(&self) -> SnapshotKey {
        let mut buf = Vec::with_capacity(16 + self.hash.len());
        buf.extend_from_slice(&self.height.to_be_bytes());
        buf.extend_from_slice(&self.format.to_be_bytes());
        buf.extend_from_slice(&self.chunks.to_be_bytes());
        buf.extend_from_slice(&self.hash);
        SnapshotKey(Hash::sha256(&buf))
    }
}

impl From<SnapshotsResponse> for Snapshot {
    fn from(m: SnapshotsResponse) -> Self {
        Self {
            height: m.height,
            format: m.format,
            chunks: m.chunks,
            hash: m.hash,
            metadata: m.metadata,
        }
    }
}

/// Opaque pool identity of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotKey(pub Hash);

#[derive(Default)]
struct PoolInner {
    snapshots: HashMap<SnapshotKey, Snapshot>,
    snapshot_peers: HashMap<SnapshotKey, BTreeSet<PeerId>>,
    peer_snapshots: HashMap<PeerId, BTreeSet<SnapshotKey>>,
    blacklisted_snapshots: HashSet<SnapshotKey>,
    blacklisted_formats: HashSet<u32>,
    blacklisted_peers: HashSet<PeerId>,
}

/// Pool of snapshots discovered from peers.
///
/// Snapshots are keyed by (height, format, chunks, hash); every peer that
/// advertises one is recorded so chunk fetchers can spread requests.
/// Rejections are remembered for the life of the pool so a rejected
/// snapshot, format, or peer is never considered again.
#[derive(Default)]
pub struct SnapshotPool {
    inner: RwLock<PoolInner>,
}

impl SnapshotPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `peer` advertises `snapshot`. Returns true when the
    /// snapshot was not known before. Blacklisted snapshots, formats, and
    /// peers are ignored, as is anything past the per-peer cap.
    pub fn add(&self, peer: &PeerId, snapshot: Snapshot) -> bool {
        let key = snapshot.key();
        let mut inner = self.inner.write();
        if inner.blacklisted_snapshots.contains(&key)
            || inner.blacklisted_formats.contains(&snapshot.format)
            || inner.blacklisted_peers.contains(peer)
        {
            return false;
        }
        let peer_known = inner.peer_snapshots.entry(peer.clone()).or_default();
        if peer_known.len() >= RECENT_SNAPSHOTS && !peer_known.contains(&key) {
            return false;
        }
        peer_known.insert(key);
        inner
            .snapshot_peers
            .entry(key)
            .or_default()
            .insert(peer.clone());
        inner.snapshots.insert(key, snapshot).is_none()
    }

    /// Best candidate to offer next: highest height, then newest format,
    /// then the snapshot most peers can serve.
    pub fn best(&self) -> Option<Snapshot> {
        self.ranked().into_iter().next()
    }

    /// All candidate snapshots, best first.
    pub fn ranked(&self) -> Vec<Snapshot> {
        let inner = self.inner.read();
        let mut candidates: Vec<&Snapshot> = inner.snapshots.values().collect();
        candidates.sort_by(|a, b| {
            b.height
                .cmp(&a.height)
                .then(b.format.cmp(&a.format))
                .then_with(|| {
                    let pa = inner.snapshot_peers.get(&a.key()).map_or(0, BTreeSet::len);
                    let pb = inner.snapshot_peers.get(&b.key()).map_or(0, BTreeSet::len);
                    pb.cmp(&pa)
                })
        });
        candidates.into_iter().cloned().collect()
    }

    /// A random peer known to carry `snapshot`.
    pub fn get_peer(&self, snapshot: &Snapshot) -> Option<PeerId> {
        let peers = self.get_peers(snapshot);
        peers.choose(&mut rand::thread_rng()).cloned()
    }

    /// All peers known to carry `snapshot`.
    pub fn get_peers(&self, snapshot: &Snapshot) -> Vec<PeerId> {
        let inner = self.inner.read();
        inner
            .snapshot_peers
            .get(&snapshot.key())
            .map(|peers| peers.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Blacklist `snapshot` and drop it from the pool.
    pub fn reject(&self, snapshot: &Snapshot) {
        let key = snapshot.key();
        let mut inner = self.inner.write();
        inner.blacklisted_snapshots.insert(key);
        Self::remove_key(&mut inner, key);
    }

    /// Blacklist a snapshot format and drop every snapshot carrying it.
    pub fn reject_format(&self, format: u32) {
        let mut inner = self.inner.write();
        inner.blacklisted_formats.insert(format);
        let keys: Vec<SnapshotKey> = inner
            .snapshots
            .iter()
            .filter(|(_, s)| s.format == format)
            .map(|(k, _)| *k)
            .collect();
        for key in keys {
            Self::remove_key(&mut inner, key);
        }
    }

    /// Blacklist `peer` and forget everything it advertised. Snapshots no
    /// other peer carries are dropped.
    pub fn reject_peer(&self, peer: &PeerId) {
        let mut inner = self.inner.write();
        inner.blacklisted_peers.insert(peer.clone());
        Self::unlink_peer(&mut inner, peer);
    }

    /// Forget a disconnected peer without blacklisting it.
    pub fn remove_peer(&self, peer: &PeerId) {
        let mut inner = self.inner.write();
        Self::unlink_peer(&mut inner, peer);
    }

    /// Number of candidate snapshots.
    pub fn len(&self) -> usize {
        self.inner.read().snapshots.len()
    }

    /// Whether the pool holds no candidates.
    pub fn is_empty(&self) -> bool {
        self.inner.read().snapshots.is_empty()
    }

    fn remove_key(inner: &mut PoolInner, key: SnapshotKey) {
        inner.snapshots.remove(&key);
        if let Some(peers) = inner.snapshot_peers.remove(&key) {
            for peer in peers {
                if let Some(known) = inner.peer_snapshots.get_mut(&peer) {
                    known.remove(&key);
                }
            }
        }
    }

    fn unlink_peer(inner: &mut PoolInner, peer: &PeerId) {
        let keys = inner.peer_snapshots.remove(peer).unwrap_or_default();
        for key in keys {
            let orphaned = match inner.snapshot_peers.get_mut(&key) {
                Some(peers) => {
                    peers.remove(peer);
                    peers.is_empty()
                }
                None => true,
            };
            if orphaned {
                inner.snapshot_peers.remove(&key);
                inner.snapshots.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: u8) -> PeerId {
        PeerId::from_bytes(vec![id])
    }

    fn snapshot(height: u64, format: u32) -> Snapshot {
        Snapshot {
            height,
            format,
            chunks: 3,
            hash: Bytes::from(vec![height as u8, format as u8]),
            metadata: Bytes::new(),
        }
    }

    #[test]
    fn test_add_is_idempotent_per_snapshot() {
        let pool = SnapshotPool::new();
        assert!(pool.add(&peer(1), snapshot(1, 1)));
        assert!(!pool.add(&peer(2), snapshot(1, 1)));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get_peers(&snapshot(1, 1)).len(), 2);
    }

    #[test]
    fn test_ranking_prefers_height_then_format_then_peers() {
        let pool = SnapshotPool::new();
        pool.add(&peer(1), snapshot(1, 2));
        pool.add(&peer(1), snapshot(2, 1));
        pool.add(&peer(1), snapshot(2, 2));
        pool.add(&peer(2), snapshot(2, 2));

        let ranked = pool.ranked();
        assert_eq!(ranked[0], snapshot(2, 2));
        assert_eq!(ranked[1], snapshot(2, 1));
        assert_eq!(ranked[2], snapshot(1, 2));
        assert_eq!(pool.best(), Some(snapshot(2, 2)));
    }

    #[test]
    fn test_per_peer_cap() {
        let pool = SnapshotPool::new();
        for h in 0..RECENT_SNAPSHOTS as u64 {
            assert!(pool.add(&peer(1), snapshot(h, 1)));
        }
        assert!(!pool.add(&peer(1), snapshot(99, 1)));
        // Re-advertising a known snapshot is fine.
        assert!(!pool.add(&peer(1), snapshot(0, 1)));
        assert_eq!(pool.len(), RECENT_SNAPSHOTS);
    }

    #[test]
    fn test_rejected_snapshot_never_returns() {
        let pool = SnapshotPool::new();
        pool.add(&peer(1), snapshot(1, 1));
        pool.reject(&snapshot(1, 1));
        assert!(pool.is_empty());
        assert!(!pool.add(&peer(2), snapshot(1, 1)));
    }

    #[test]
    fn test_reject_format_drops_all_carriers() {
        let pool = SnapshotPool::new();
        pool.add(&peer(1), snapshot(1, 1));
        pool.add(&peer(1), snapshot(2, 1));
        pool.add(&peer(1), snapshot(2, 2));
        pool.reject_format(1);
        assert_eq!(pool.ranked(), vec![snapshot(2, 2)]);
        assert!(!pool.add(&peer(2), snapshot(3, 1)));
    }

    #[test]
    fn test_remove_peer_drops_orphans_only() {
        let pool = SnapshotPool::new();
        pool.add(&peer(1), snapshot(1, 1));
        pool.add(&peer(1), snapshot(2, 1));
        pool.add(&peer(2), snapshot(2, 1));
        pool.remove_peer(&peer(1));
        assert_eq!(pool.ranked(), vec![snapshot(2, 1)]);
        // Not blacklisted: the peer may come back.
        assert!(pool.add(&peer(1), snapshot(1, 1)));
    }

    #[test]
    fn test_reject_peer_is_permanent() {
        let pool = SnapshotPool::new();
        pool.add(&peer(1), snapshot(1, 1));
        pool.reject_peer(&peer(1));
        assert!(pool.is_empty());
        assert!(!pool.add(&peer(1), snapshot(5, 5)));
    }
}
