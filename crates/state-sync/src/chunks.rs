//! Chunk queue buffering fetched snapshot chunks on disk.
//!
//! Fetchers run in parallel and chunks arrive in any order, but the
//! application must see them in strict ascending index order. The queue
//! spills chunk bodies into a per-restore temporary directory so a large
//! snapshot never has to fit in memory, and hands them out one at a time
//! through [`ChunkQueue::next`].

use crate::snapshots::Snapshot;
use crate::{Result, StateSyncError};
use bytes::Bytes;
use ostracon_core::PeerId;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use tracing::debug;

/// A fetched snapshot chunk, attributed to the peer that served it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Snapshot height.
    pub height: u64,
    /// Snapshot format.
    pub format: u32,
    /// Chunk index.
    pub index: u32,
    /// Chunk body.
    pub chunk: Bytes,
    /// Peer the chunk was fetched from.
    pub sender: PeerId,
}

struct QueueInner {
    files: HashMap<u32, PathBuf>,
    senders: HashMap<u32, PeerId>,
    allocated: HashSet<u32>,
    next_apply: u32,
    closed: bool,
}

/// Disk-backed queue for the chunks of one snapshot restore.
pub struct ChunkQueue {
    snapshot: Snapshot,
    dir: TempDir,
    inner: Mutex<QueueInner>,
    added: Notify,
}

impl ChunkQueue {
    /// Create a queue for `snapshot`, spilling chunks under `temp_dir`
    /// (the OS temp dir when empty). The directory is removed on drop.
    pub fn new(snapshot: Snapshot, temp_dir: &std::path::Path) -> Result<Arc<Self>> {
        let base = if temp_dir.as_os_str().is_empty() {
            std::env::temp_dir()
        } else {
            temp_dir.to_path_buf()
        };
        let dir = tempfile::Builder::new()
            .prefix("ostracon-statesync-")
            .tempdir_in(base)?;
        Ok(Arc::new(Self {
            snapshot,
            dir,
            inner: Mutex::new(QueueInner {
                files: HashMap::new(),
                senders: HashMap::new(),
                allocated: HashSet::new(),
                next_apply: 0,
                closed: false,
            }),
            added: Notify::new(),
        }))
    }

    /// The snapshot being restored.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Hand out the lowest chunk index no fetcher has claimed yet.
    /// `None` when every index is currently claimed or stored.
    pub fn allocate(&self) -> Result<Option<u32>> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(StateSyncError::ChunkQueueClosed);
        }
        for index in 0..self.snapshot.chunks {
            if !inner.allocated.contains(&index) && !inner.files.contains_key(&index) {
                inner.allocated.insert(index);
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Store a fetched chunk. Returns false when the index is already
    /// stored (duplicate responses are harmless).
    pub fn add(&self, chunk: Chunk) -> Result<bool> {
        if chunk.index >= self.snapshot.chunks {
            return Err(StateSyncError::ChunkOutOfRange {
                index: chunk.index,
                chunks: self.snapshot.chunks,
            });
        }
        let path = self.dir.path().join(format!("chunk-{}", chunk.index));
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(StateSyncError::ChunkQueueClosed);
            }
            if inner.files.contains_key(&chunk.index) {
                return Ok(false);
            }
            std::fs::write(&path, &chunk.chunk)?;
            inner.files.insert(chunk.index, path);
            inner.senders.insert(chunk.index, chunk.sender);
        }
        self.added.notify_waiters();
        Ok(true)
    }

    /// Whether the chunk at `index` is stored.
    pub fn has(&self, index: u32) -> bool {
        self.inner.lock().files.contains_key(&index)
    }

    /// The next chunk in apply order, waiting for it to arrive if needed.
    /// `None` once every chunk has been handed out or the queue closed.
    pub async fn next(&self) -> Option<Chunk> {
        loop {
            let notified = self.added.notified();
            {
                let mut inner = self.inner.lock();
                if inner.closed || inner.next_apply >= self.snapshot.chunks {
                    return None;
                }
                let index = inner.next_apply;
                if let Some(path) = inner.files.get(&index).cloned() {
                    let body = match std::fs::read(&path) {
                        Ok(body) => body,
                        Err(err) => {
                            // Spilled file vanished under us; refetch.
                            debug!("statesync: chunk {index} unreadable, refetching: {err}");
                            inner.files.remove(&index);
                            inner.allocated.remove(&index);
                            inner.senders.remove(&index);
                            continue;
                        }
                    };
                    let sender = inner
                        .senders
                        .get(&index)
                        .cloned()
                        .unwrap_or_else(|| PeerId::from_bytes(Vec::new()));
                    inner.next_apply = index + 1;
                    return Some(Chunk {
                        height: self.snapshot.height,
                        format: self.snapshot.format,
                        index,
                        chunk: Bytes::from(body),
                        sender,
                    });
                }
            }
            notified.await;
        }
    }

    /// Re-apply the stored chunk at `index` on the next [`next`] call.
    ///
    /// [`next`]: ChunkQueue::next
    pub fn retry(&self, index: u32) {
        let mut inner = self.inner.lock();
        if index < inner.next_apply {
            inner.next_apply = index;
        }
    }

    /// Drop the stored chunk at `index` so a fetcher downloads it again,
    /// and rewind the apply cursor if it had already passed it.
    pub fn discard(&self, index: u32) {
        let mut inner = self.inner.lock();
        if let Some(path) = inner.files.remove(&index) {
            let _ = std::fs::remove_file(path);
        }
        inner.senders.remove(&index);
        inner.allocated.remove(&index);
        if index < inner.next_apply {
            inner.next_apply = index;
        }
    }

    /// Drop every unapplied chunk served by `peer`.
    pub fn discard_sender(&self, peer: &PeerId) {
        let indexes: Vec<u32> = {
            let inner = self.inner.lock();
            inner
                .senders
                .iter()
                .filter(|(index, sender)| **index >= inner.next_apply && *sender == peer)
                .map(|(index, _)| *index)
                .collect()
        };
        for index in indexes {
            self.discard(index);
        }
    }

    /// Peer that served the chunk at `index`, if stored.
    pub fn sender(&self, index: u32) -> Option<PeerId> {
        self.inner.lock().senders.get(&index).cloned()
    }

    /// Wait until the chunk at `index` is stored, up to `timeout`.
    pub async fn wait_for(&self, index: u32, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.added.notified();
                {
                    let inner = self.inner.lock();
                    if inner.closed {
                        return false;
                    }
                    if inner.files.contains_key(&index) {
                        return true;
                    }
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.unwrap_or(false)
    }

    /// Close the queue, releasing every waiter.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.added.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: u8) -> PeerId {
        PeerId::from_bytes(vec![id])
    }

    fn snapshot(chunks: u32) -> Snapshot {
        Snapshot {
            height: 1,
            format: 1,
            chunks,
            hash: Bytes::from_static(&[1, 2, 3]),
            metadata: Bytes::new(),
        }
    }

    fn chunk(index: u32, sender: u8) -> Chunk {
        Chunk {
            height: 1,
            format: 1,
            index,
            chunk: Bytes::from(vec![index as u8; 4]),
            sender: peer(sender),
        }
    }

    #[tokio::test]
    async fn test_next_returns_in_index_order() {
        let queue = ChunkQueue::new(snapshot(3), std::path::Path::new("")).unwrap();
        // Arrive out of order.
        queue.add(chunk(2, 1)).unwrap();
        queue.add(chunk(0, 1)).unwrap();
        queue.add(chunk(1, 2)).unwrap();

        for expected in 0..3 {
            let got = queue.next().await.unwrap();
            assert_eq!(got.index, expected);
            assert_eq!(got.chunk, Bytes::from(vec![expected as u8; 4]));
        }
        queue.close();
        assert!(queue.next().await.is_none());
    }

    #[tokio::test]
    async fn test_next_waits_for_missing_chunk() {
        let queue = ChunkQueue::new(snapshot(1), std::path::Path::new("")).unwrap();
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.next().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.add(chunk(0, 1)).unwrap();
        let got = waiter.await.unwrap().unwrap();
        assert_eq!(got.index, 0);
    }

    #[tokio::test]
    async fn test_allocate_hands_out_each_index_once() {
        let queue = ChunkQueue::new(snapshot(2), std::path::Path::new("")).unwrap();
        assert_eq!(queue.allocate().unwrap(), Some(0));
        assert_eq!(queue.allocate().unwrap(), Some(1));
        assert_eq!(queue.allocate().unwrap(), None);
        // Discarding makes the index allocatable again.
        queue.discard(1);
        assert_eq!(queue.allocate().unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_rejects_out_of_range_index() {
        let queue = ChunkQueue::new(snapshot(2), std::path::Path::new("")).unwrap();
        let err = queue.add(chunk(2, 1)).unwrap_err();
        assert!(matches!(
            err,
            StateSyncError::ChunkOutOfRange { index: 2, chunks: 2 }
        ));
    }

    #[tokio::test]
    async fn test_duplicate_add_is_ignored() {
        let queue = ChunkQueue::new(snapshot(1), std::path::Path::new("")).unwrap();
        assert!(queue.add(chunk(0, 1)).unwrap());
        assert!(!queue.add(chunk(0, 2)).unwrap());
        assert_eq!(queue.sender(0), Some(peer(1)));
    }

    #[tokio::test]
    async fn test_retry_replays_stored_chunk() {
        let queue = ChunkQueue::new(snapshot(2), std::path::Path::new("")).unwrap();
        queue.add(chunk(0, 1)).unwrap();
        queue.add(chunk(1, 1)).unwrap();
        assert_eq!(queue.next().await.unwrap().index, 0);
        queue.retry(0);
        assert_eq!(queue.next().await.unwrap().index, 0);
        assert_eq!(queue.next().await.unwrap().index, 1);
    }

    #[tokio::test]
    async fn test_discard_sender_keeps_applied_chunks() {
        let queue = ChunkQueue::new(snapshot(3), std::path::Path::new("")).unwrap();
        queue.add(chunk(0, 1)).unwrap();
        queue.add(chunk(1, 1)).unwrap();
        queue.add(chunk(2, 2)).unwrap();
        assert_eq!(queue.next().await.unwrap().index, 0);
        queue.discard_sender(&peer(1));
        // Chunk 0 was already applied and stays; chunk 1 must be refetched.
        assert!(queue.has(0));
        assert!(!queue.has(1));
        assert!(queue.has(2));
    }

    #[tokio::test]
    async fn test_zero_chunk_snapshot_completes_immediately() {
        let queue = ChunkQueue::new(snapshot(0), std::path::Path::new("")).unwrap();
        assert_eq!(queue.allocate().unwrap(), None);
        assert!(queue.next().await.is_none());
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let queue = ChunkQueue::new(snapshot(1), std::path::Path::new("")).unwrap();
        assert!(!queue.wait_for(0, Duration::from_millis(10)).await);
        queue.add(chunk(0, 1)).unwrap();
        assert!(queue.wait_for(0, Duration::from_millis(10)).await);
    }
}
