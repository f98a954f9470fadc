//! The ordered transaction pool.

use crate::cache::TxCache;
use crate::wal::Wal;
use crate::{MempoolError, Result};
use ostracon_abci::proto::{
    self, request, response, CheckTxType, Request, RequestCheckTx, Response, ResponseCheckTx,
    ResponseDeliverTx,
};
use ostracon_abci::{Client, GlobalCallback, ResponseCallback};
use ostracon_config::MempoolConfig;
use ostracon_types::{Block, Header, Tx, TxKey};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, warn};

/// Pre-admission filter applied before the transaction reaches the
/// application.
pub type PreCheckFn = Arc<dyn Fn(&Tx) -> std::result::Result<(), String> + Send + Sync>;

/// Filter applied to every CheckTx verdict; a failure invalidates the
/// transaction even when the application accepted it.
pub type PostCheckFn =
    Arc<dyn Fn(&Tx, &ResponseCheckTx) -> std::result::Result<(), String> + Send + Sync>;

/// Receives the admission decision of [`Mempool::check_tx_async`].
pub type PrepareCallback = Box<dyn FnOnce(Option<&MempoolError>) + Send>;

/// Metadata accompanying a transaction submission.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxInfo {
    /// Internal id of the peer the transaction arrived from; 0 for local
    /// submissions. Recorded so the gossip layer can skip echoing a
    /// transaction back to its source.
    pub sender_id: u16,
}

struct PoolEntry {
    tx: Tx,
    gas_wanted: i64,
    senders: HashSet<u16>,
}

/// Admission-ordered entries plus a key index into them.
#[derive(Default)]
struct OrderedTxs {
    seq: u64,
    order: BTreeMap<u64, PoolEntry>,
    index: HashMap<TxKey, u64>,
}

impl OrderedTxs {
    fn insert(&mut self, key: TxKey, entry: PoolEntry) {
        self.seq += 1;
        self.index.insert(key, self.seq);
        self.order.insert(self.seq, entry);
    }

    fn remove(&mut self, key: &TxKey) -> Option<PoolEntry> {
        let seq = self.index.remove(key)?;
        self.order.remove(&seq)
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

#[derive(Default)]
struct Reserved {
    count: usize,
    bytes: i64,
}

struct PoolState {
    config: MempoolConfig,
    txs: Mutex<OrderedTxs>,
    cache: TxCache,
    wal: Mutex<Option<Wal>>,
    txs_bytes: AtomicI64,
    height: AtomicI64,
    reserved: Mutex<Reserved>,
    notified_txs_available: AtomicBool,
    txs_available: Mutex<Option<mpsc::Sender<()>>>,
    recheck_outstanding: AtomicUsize,
    recheck_done: Notify,
    pre_check: Mutex<Option<PreCheckFn>>,
    post_check: Mutex<Option<PostCheckFn>>,
}

impl PoolState {
    fn size(&self) -> usize {
        self.txs.lock().len()
    }

    fn size_bytes(&self) -> i64 {
        self.txs_bytes.load(Ordering::SeqCst)
    }

    fn full_error(&self, reserved: &Reserved, tx_size: usize) -> Option<MempoolError> {
        let num_txs = self.size();
        let txs_bytes = self.size_bytes();
        let over_count = num_txs + reserved.count >= self.config.size;
        let over_bytes =
            txs_bytes + reserved.bytes + tx_size as i64 > self.config.max_txs_bytes;
        if over_count || over_bytes {
            return Some(MempoolError::MempoolFull {
                num_txs,
                max_txs: self.config.size,
                txs_bytes,
                max_txs_bytes: self.config.max_txs_bytes,
            });
        }
        None
    }

    /// Claim capacity for a check in flight; the authoritative full test.
    fn reserve(&self, tx_size: usize) -> Result<()> {
        let mut reserved = self.reserved.lock();
        if let Some(err) = self.full_error(&reserved, tx_size) {
            return Err(err);
        }
        reserved.count += 1;
        reserved.bytes += tx_size as i64;
        Ok(())
    }

    fn release_reservation(&self, tx_size: usize) {
        let mut reserved = self.reserved.lock();
        reserved.count = reserved.count.saturating_sub(1);
        reserved.bytes = (reserved.bytes - tx_size as i64).max(0);
    }

    /// The admission pipeline, run before the application sees the
    /// transaction. On success the transaction is cached and capacity is
    /// reserved for it.
    fn prepare(
        &self,
        tx: &Tx,
        info: &TxInfo,
        client_err: Option<ostracon_abci::ClientError>,
    ) -> Result<()> {
        let key = tx.key();
        let tx_size = tx.len();

        if self.txs.lock().index.contains_key(&key) {
            return Err(MempoolError::TxInMap);
        }
        if let Some(err) = self.full_error(&self.reserved.lock(), tx_size) {
            return Err(err);
        }
        if tx_size > self.config.max_tx_bytes {
            return Err(MempoolError::TxTooLarge {
                max: self.config.max_tx_bytes,
                actual: tx_size,
            });
        }
        if let Some(pre_check) = self.pre_check.lock().clone() {
            pre_check(tx).map_err(MempoolError::PreCheck)?;
        }
        if let Some(wal) = self.wal.lock().as_mut() {
            wal.write(tx.as_bytes())
                .map_err(|e| MempoolError::Wal(e.to_string()))?;
        }
        if let Some(err) = client_err {
            return Err(err.into());
        }
        if !self.cache.push(key) {
            // Seen before. If it is still resident, remember this sender so
            // gossip does not echo the tx back to it.
            let mut txs = self.txs.lock();
            if let Some(seq) = txs.index.get(&key).copied() {
                if let Some(entry) = txs.order.get_mut(&seq) {
                    entry.senders.insert(info.sender_id);
                }
            }
            return Err(MempoolError::TxInCache);
        }
        if let Err(err) = self.reserve(tx_size) {
            self.cache.remove(&key);
            return Err(err);
        }
        Ok(())
    }

    /// Process the verdict for a first-time check: release the reservation
    /// and either admit the entry or forget the transaction.
    fn handle_first_time(&self, tx: &Tx, sender_id: u16, res: &ResponseCheckTx) {
        self.release_reservation(tx.len());

        let mut keep = res.code == 0;
        if keep {
            if let Some(post_check) = self.post_check.lock().clone() {
                if let Err(err) = post_check(tx, res) {
                    debug!(tx = %tx.key(), error = %err, "mempool: post-check rejected tx");
                    keep = false;
                }
            }
        }

        if keep {
            let key = tx.key();
            {
                let mut txs = self.txs.lock();
                if !txs.index.contains_key(&key) {
                    self.txs_bytes.fetch_add(tx.len() as i64, Ordering::SeqCst);
                    let mut senders = HashSet::new();
                    senders.insert(sender_id);
                    txs.insert(
                        key,
                        PoolEntry {
                            tx: tx.clone(),
                            gas_wanted: res.gas_wanted,
                            senders,
                        },
                    );
                }
            }
            debug!(tx = %key, size = self.size(), "mempool: added valid tx");
            self.notify_txs_available();
        } else {
            debug!(tx = %tx.key(), code = res.code, log = %res.log, "mempool: rejected invalid tx");
            if !self.config.keep_invalid_txs_in_cache {
                self.cache.remove(&tx.key());
            }
        }
    }

    /// Process the verdict for a recheck: drop the entry if it went invalid
    /// and count down the in-flight recheck window.
    fn handle_recheck(&self, req: &RequestCheckTx, res: &ResponseCheckTx) {
        let tx = Tx::from(req.tx.clone());
        let key = tx.key();

        let mut keep = res.code == 0;
        if keep {
            if let Some(post_check) = self.post_check.lock().clone() {
                if let Err(err) = post_check(&tx, res) {
                    debug!(tx = %key, error = %err, "mempool: post-check rejected tx on recheck");
                    keep = false;
                }
            }
        }
        if !keep {
            debug!(tx = %key, code = res.code, "mempool: tx invalidated by recheck");
            self.remove_tx(&key, !self.config.keep_invalid_txs_in_cache);
        }

        let _ = self
            .recheck_outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if self.recheck_outstanding.load(Ordering::SeqCst) == 0 {
            self.recheck_done.notify_waiters();
        }
    }

    fn remove_tx(&self, key: &TxKey, remove_from_cache: bool) -> bool {
        let removed = self.txs.lock().remove(key);
        if let Some(entry) = &removed {
            self.txs_bytes
                .fetch_sub(entry.tx.len() as i64, Ordering::SeqCst);
        }
        if remove_from_cache {
            self.cache.remove(key);
        }
        removed.is_some()
    }

    /// Fire the txs-available signal, at most once per height.
    fn notify_txs_available(&self) {
        if self.size() == 0 {
            return;
        }
        let sender = self.txs_available.lock().clone();
        if let Some(sender) = sender {
            if !self.notified_txs_available.swap(true, Ordering::SeqCst) {
                let _ = sender.try_send(());
            }
        }
    }
}

/// The mempool: an admission-ordered pool of application-validated
/// transactions, backed by one ABCI mempool connection.
pub struct Mempool {
    update_mtx: Arc<RwLock<()>>,
    client: Arc<dyn Client>,
    state: Arc<PoolState>,
}

impl Mempool {
    /// A new mempool at `height` over `client`. Installs the pool's global
    /// callback on the client, which routes recheck verdicts back into the
    /// pool.
    pub fn new(config: MempoolConfig, client: Arc<dyn Client>, height: i64) -> Self {
        let state = Arc::new(PoolState {
            cache: TxCache::new(config.cache_size),
            config,
            txs: Mutex::new(OrderedTxs::default()),
            wal: Mutex::new(None),
            txs_bytes: AtomicI64::new(0),
            height: AtomicI64::new(height),
            reserved: Mutex::new(Reserved::default()),
            notified_txs_available: AtomicBool::new(false),
            txs_available: Mutex::new(None),
            recheck_outstanding: AtomicUsize::new(0),
            recheck_done: Notify::new(),
            pre_check: Mutex::new(None),
            post_check: Mutex::new(None),
        });

        let global_cb: GlobalCallback = {
            let state = state.clone();
            Arc::new(move |req: &Request, res: &Response| {
                if let (
                    Some(request::Value::CheckTx(creq)),
                    Some(response::Value::CheckTx(cres)),
                ) = (&req.value, &res.value)
                {
                    if creq.check_type() == CheckTxType::Recheck {
                        state.handle_recheck(creq, cres);
                    }
                }
            })
        };
        client.set_global_callback(global_cb);

        Self {
            update_mtx: Arc::new(RwLock::new(())),
            client,
            state,
        }
    }

    /// Open the write-ahead log; a no-op when `wal_dir` is unset.
    pub fn init_wal(&self) -> Result<()> {
        if !self.state.config.wal_enabled() {
            return Ok(());
        }
        let wal = Wal::open(&self.state.config.wal_dir)
            .map_err(|e| MempoolError::Wal(e.to_string()))?;
        *self.state.wal.lock() = Some(wal);
        Ok(())
    }

    /// Close the write-ahead log.
    pub fn close_wal(&self) {
        self.state.wal.lock().take();
    }

    /// Install a pre-admission filter.
    pub fn set_pre_check(&self, f: PreCheckFn) {
        *self.state.pre_check.lock() = Some(f);
    }

    /// Install a verdict filter.
    pub fn set_post_check(&self, f: PostCheckFn) {
        *self.state.post_check.lock() = Some(f);
    }

    /// Number of resident transactions.
    pub fn size(&self) -> usize {
        self.state.size()
    }

    /// Total bytes of resident transactions.
    pub fn size_bytes(&self) -> i64 {
        self.state.size_bytes()
    }

    /// Take the exclusive lock required around [`update`](Mempool::update).
    pub async fn lock(&self) -> OwnedRwLockWriteGuard<()> {
        self.update_mtx.clone().write_owned().await
    }

    /// Create the single-fire signal armed whenever the pool turns
    /// non-empty at a new height.
    pub fn enable_txs_available(&self) -> mpsc::Receiver<()> {
        let (tx, rx) = mpsc::channel(1);
        *self.state.txs_available.lock() = Some(tx);
        rx
    }

    /// Admit `tx` and wait for the application's verdict.
    pub async fn check_tx_sync(&self, tx: Tx, info: TxInfo) -> Result<ResponseCheckTx> {
        let _shared = self.update_mtx.read().await;
        self.state.prepare(&tx, &info, self.client.error())?;

        let req = RequestCheckTx {
            tx: tx.0.clone(),
            r#type: CheckTxType::New as i32,
        };
        let res = match self.client.check_tx_sync(req).await {
            Ok(res) => res,
            Err(err) => {
                self.state.release_reservation(tx.len());
                if !self.state.config.keep_invalid_txs_in_cache {
                    self.state.cache.remove(&tx.key());
                }
                return Err(err.into());
            }
        };
        self.state.handle_first_time(&tx, info.sender_id, &res);
        Ok(res)
    }

    /// Admit `tx` without waiting for the verdict. `prepare_cb` receives
    /// the admission decision; `check_tx_cb` receives the eventual ABCI
    /// response.
    pub async fn check_tx_async(
        &self,
        tx: Tx,
        info: TxInfo,
        prepare_cb: Option<PrepareCallback>,
        check_tx_cb: Option<ResponseCallback>,
    ) {
        let _shared = self.update_mtx.read().await;
        if let Err(err) = self.state.prepare(&tx, &info, self.client.error()) {
            if let Some(cb) = prepare_cb {
                cb(Some(&err));
            }
            return;
        }
        if let Some(cb) = prepare_cb {
            cb(None);
        }

        let req = RequestCheckTx {
            tx: tx.0.clone(),
            r#type: CheckTxType::New as i32,
        };
        let callback: ResponseCallback = {
            let state = self.state.clone();
            let tx = tx.clone();
            let sender_id = info.sender_id;
            Arc::new(move |res: &Response| {
                if let Some(response::Value::CheckTx(cres)) = &res.value {
                    state.handle_first_time(&tx, sender_id, cres);
                }
                if let Some(user_cb) = &check_tx_cb {
                    user_cb(res);
                }
            })
        };
        if let Err(err) = self.client.check_tx_async(req, Some(callback)).await {
            warn!(error = %err, "mempool: check_tx dispatch failed");
            self.state.release_reservation(tx.len());
            if !self.state.config.keep_invalid_txs_in_cache {
                self.state.cache.remove(&tx.key());
            }
        }
    }

    /// An admission-order prefix bounded by serialized bytes and total gas;
    /// either bound may be `-1` for unbounded.
    pub async fn reap_max_bytes_max_gas(&self, max_bytes: i64, max_gas: i64) -> Vec<Tx> {
        self.reap_max_bytes_max_gas_max_txs(max_bytes, max_gas, 0)
            .await
    }

    /// As [`reap_max_bytes_max_gas`](Mempool::reap_max_bytes_max_gas) with
    /// an additional count cap; `max_txs <= 0` disables the cap.
    pub async fn reap_max_bytes_max_gas_max_txs(
        &self,
        max_bytes: i64,
        max_gas: i64,
        max_txs: i64,
    ) -> Vec<Tx> {
        let _shared = self.update_mtx.read().await;
        let txs = self.state.txs.lock();
        let mut out = Vec::new();
        let mut total_bytes: i64 = 0;
        let mut total_gas: i64 = 0;
        for entry in txs.order.values() {
            if max_txs > 0 && out.len() as i64 >= max_txs {
                break;
            }
            // Byte budgets are measured against the exact proto wire size,
            // raw length undercounts the per-tx framing.
            let size = entry.tx.proto_size() as i64;
            if max_bytes > -1 && total_bytes + size > max_bytes {
                break;
            }
            let new_gas = total_gas + entry.gas_wanted;
            if max_gas > -1 && new_gas > max_gas {
                break;
            }
            total_bytes += size;
            total_gas = new_gas;
            out.push(entry.tx.clone());
        }
        out
    }

    /// The first `n` transactions in admission order; all when `n < 0`.
    pub async fn reap_max_txs(&self, n: i64) -> Vec<Tx> {
        let _shared = self.update_mtx.read().await;
        let txs = self.state.txs.lock();
        let limit = if n < 0 { txs.len() } else { n as usize };
        txs.order
            .values()
            .take(limit)
            .map(|entry| entry.tx.clone())
            .collect()
    }

    /// Digest a committed block: drop its transactions from the pool and
    /// recheck the remainder. The caller must hold the exclusive lock from
    /// [`lock`](Mempool::lock).
    pub async fn update(
        &self,
        block: &Block,
        deliver_tx_responses: &[ResponseDeliverTx],
        pre_check: Option<PreCheckFn>,
        post_check: Option<PostCheckFn>,
    ) -> Result<()> {
        let state = &self.state;
        state.height.store(block.height(), Ordering::SeqCst);
        state
            .notified_txs_available
            .store(false, Ordering::SeqCst);
        if pre_check.is_some() {
            *state.pre_check.lock() = pre_check;
        }
        if post_check.is_some() {
            *state.post_check.lock() = post_check;
        }

        for (tx, res) in block.txs.iter().zip(deliver_tx_responses) {
            if res.code == 0 {
                // Committed txs stay cached so late gossip of them is
                // rejected cheaply.
                state.cache.push(tx.key());
            } else if !state.config.keep_invalid_txs_in_cache {
                state.cache.remove(&tx.key());
            }
            state.remove_tx(&tx.key(), false);
        }

        if state.size() > 0 {
            if state.config.recheck {
                debug!(
                    height = block.height(),
                    remaining = state.size(),
                    "mempool: rechecking txs"
                );
                self.recheck_txs(&block.header).await?;
                if state.size() > 0 {
                    state.notify_txs_available();
                }
            } else {
                state.notify_txs_available();
            }
        }
        Ok(())
    }

    /// Re-run CheckTx on every resident transaction inside a
    /// BeginRecheckTx/EndRecheckTx window. Verdicts come back through the
    /// global callback while this method drives the window.
    async fn recheck_txs(&self, header: &Header) -> Result<()> {
        let snapshot: Vec<Tx> = {
            let txs = self.state.txs.lock();
            txs.order.values().map(|entry| entry.tx.clone()).collect()
        };
        if snapshot.is_empty() {
            return Ok(());
        }
        self.state
            .recheck_outstanding
            .store(snapshot.len(), Ordering::SeqCst);

        self.client
            .begin_recheck_tx_sync(proto::Header::from(header))
            .await?;
        for tx in &snapshot {
            let req = RequestCheckTx {
                tx: tx.0.clone(),
                r#type: CheckTxType::Recheck as i32,
            };
            self.client.check_tx_async(req, None).await?;
        }
        self.client.flush().await?;
        self.wait_rechecks_done().await;
        let res = self.client.end_recheck_tx_sync(header.height).await?;
        if res.code != 0 {
            warn!(code = res.code, height = header.height, "mempool: EndRecheckTx failed");
        }
        Ok(())
    }

    async fn wait_rechecks_done(&self) {
        loop {
            let notified = self.state.recheck_done.notified();
            if self.state.recheck_outstanding.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Drop every resident transaction and forget the seen-cache. Not
    /// consistent with consensus; operator escape hatch only.
    pub async fn flush(&self) {
        let _shared = self.update_mtx.read().await;
        let mut txs = self.state.txs.lock();
        txs.order.clear();
        txs.index.clear();
        self.state.txs_bytes.store(0, Ordering::SeqCst);
        self.state.cache.reset();
    }

    /// Forward a Flush barrier down the mempool connection.
    pub async fn flush_app_conn(&self) -> Result<()> {
        self.client.flush().await.map_err(Into::into)
    }

    /// Remove one transaction by key, optionally forgetting it in the
    /// cache. Returns whether it was resident.
    pub fn remove_tx_by_key(&self, key: &TxKey, remove_from_cache: bool) -> bool {
        self.state.remove_tx(key, remove_from_cache)
    }

    /// Height the pool last saw a commit for.
    pub fn height(&self) -> i64 {
        self.state.height.load(Ordering::SeqCst)
    }

    /// Peers already known to hold `key`, so gossip can skip echoing the
    /// transaction back to them. Empty when the transaction is not
    /// resident.
    pub fn senders(&self, key: &TxKey) -> Vec<u16> {
        let txs = self.state.txs.lock();
        match txs.index.get(key) {
            Some(seq) => txs
                .order
                .get(seq)
                .map(|entry| entry.senders.iter().copied().collect())
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }
}
