//! The state-sync reactor: peer-facing message handling.
//!
//! Inbound envelopes are pushed onto a bounded queue and handled by a
//! worker task, so the peer read loop never blocks on the application.
//! The reactor serves the local application's snapshots and chunks to
//! peers, and routes discovery and chunk responses into the [`Syncer`]
//! when one is attached.

use crate::messages::{self, encode_msg, message, ChunkResponse, SnapshotsResponse};
use crate::snapshots::RECENT_SNAPSHOTS;
use crate::syncer::Syncer;
use crate::Result;
use bytes::Bytes;
use ostracon_abci::proto::RequestLoadSnapshotChunk;
use ostracon_abci::Client;
use ostracon_core::{ChannelId, ChannelSender, PeerId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default capacity of the inbound envelope queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

struct Envelope {
    peer: PeerId,
    channel: ChannelId,
    payload: Bytes,
}

/// Peer-facing half of state sync.
pub struct Reactor {
    queue_tx: mpsc::Sender<Envelope>,
    worker: JoinHandle<()>,
}

impl Reactor {
    /// Start a reactor serving snapshots from `conn` and replying over
    /// `transport`. A [`Syncer`] is attached on nodes that are themselves
    /// state syncing; serving-only nodes pass `None`.
    pub fn new(
        conn: Arc<dyn Client>,
        transport: Arc<dyn ChannelSender>,
        syncer: Option<Arc<Syncer>>,
        queue_capacity: usize,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(queue_capacity.max(1));
        let worker = tokio::spawn(run_worker(queue_rx, conn, transport, syncer));
        Self { queue_tx, worker }
    }

    /// Hand an inbound message to the reactor. Never blocks; when the
    /// queue is full the envelope is dropped and the peer can retry.
    pub fn receive(&self, peer: PeerId, channel: ChannelId, payload: Bytes) {
        let envelope = Envelope {
            peer,
            channel,
            payload,
        };
        if let Err(mpsc::error::TrySendError::Full(envelope)) = self.queue_tx.try_send(envelope) {
            warn!(
                "statesync: receive queue full, dropping message from peer {}",
                envelope.peer
            );
        }
    }

    /// Stop the worker.
    pub fn stop(&self) {
        self.worker.abort();
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run_worker(
    mut queue_rx: mpsc::Receiver<Envelope>,
    conn: Arc<dyn Client>,
    transport: Arc<dyn ChannelSender>,
    syncer: Option<Arc<Syncer>>,
) {
    while let Some(envelope) = queue_rx.recv().await {
        if let Err(err) = handle(&envelope, &conn, &transport, &syncer).await {
            warn!(
                "statesync: failed to handle message from peer {}: {err}",
                envelope.peer
            );
        }
    }
}

async fn handle(
    envelope: &Envelope,
    conn: &Arc<dyn Client>,
    transport: &Arc<dyn ChannelSender>,
    syncer: &Option<Arc<Syncer>>,
) -> Result<()> {
    match messages::decode_msg(&envelope.payload)? {
        message::Payload::SnapshotsRequest(_) => {
            serve_snapshots(envelope, conn, transport).await
        }
        message::Payload::SnapshotsResponse(msg) => {
            if let Some(syncer) = syncer {
                syncer.add_snapshot(&envelope.peer, msg.into());
            }
            Ok(())
        }
        message::Payload::ChunkRequest(req) => {
            debug!(
                "statesync: peer {} requested chunk {} of snapshot height={} format={}",
                envelope.peer, req.index, req.height, req.format
            );
            let res = conn
                .load_snapshot_chunk_sync(RequestLoadSnapshotChunk {
                    height: req.height,
                    format: req.format,
                    chunk: req.index,
                })
                .await?;
            let missing = res.chunk.is_empty();
            let response = ChunkResponse {
                height: req.height,
                format: req.format,
                index: req.index,
                chunk: if missing { Bytes::new() } else { res.chunk },
                missing,
            };
            transport
                .send(&envelope.peer, messages::CHUNK_CHANNEL, encode_msg(response))
                .await?;
            Ok(())
        }
        message::Payload::ChunkResponse(msg) => {
            if msg.missing {
                debug!(
                    "statesync: peer {} is missing chunk {} of snapshot height={}",
                    envelope.peer, msg.index, msg.height
                );
                return Ok(());
            }
            if let Some(syncer) = syncer {
                syncer.add_chunk(crate::chunks::Chunk {
                    height: msg.height,
                    format: msg.format,
                    index: msg.index,
                    chunk: msg.chunk,
                    sender: envelope.peer.clone(),
                })?;
            }
            Ok(())
        }
    }
}

/// Answer a discovery request with up to ten snapshots, newest first.
async fn serve_snapshots(
    envelope: &Envelope,
    conn: &Arc<dyn Client>,
    transport: &Arc<dyn ChannelSender>,
) -> Result<()> {
    let res = conn.list_snapshots_sync().await?;
    let mut snapshots = res.snapshots;
    snapshots.sort_by(|a, b| b.height.cmp(&a.height).then(b.format.cmp(&a.format)));
    snapshots.truncate(RECENT_SNAPSHOTS);
    debug!(
        "statesync: advertising {} snapshots to peer {}",
        snapshots.len(),
        envelope.peer
    );
    for snapshot in snapshots {
        let response = SnapshotsResponse {
            height: snapshot.height,
            format: snapshot.format,
            chunks: snapshot.chunks,
            hash: snapshot.hash,
            metadata: snapshot.metadata,
        };
        transport
            .send(
                &envelope.peer,
                messages::SNAPSHOT_CHANNEL,
                encode_msg(response),
            )
            .await?;
    }
    Ok(())
}
