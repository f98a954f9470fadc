//! Mempool behavior tests over an in-process ABCI application.

use async_trait::async_trait;
use ostracon_abci::proto::{RequestCheckTx, ResponseCheckTx, ResponseDeliverTx};
use ostracon_abci::{Application, LocalClient};
use ostracon_config::MempoolConfig;
use ostracon_mempool::{Mempool, MempoolError, TxInfo};
use ostracon_types::{Block, Header, Tx};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

/// Accepts transactions whose first byte is at least `reject_below`; the
/// threshold can be raised between heights to make rechecks invalidate
/// previously admitted transactions.
struct ThresholdApp {
    reject_below: AtomicU8,
    checks: AtomicUsize,
}

impl ThresholdApp {
    fn accept_all() -> Self {
        Self {
            reject_below: AtomicU8::new(0),
            checks: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Application for ThresholdApp {
    async fn check_tx(&self, req: RequestCheckTx) -> ResponseCheckTx {
        self.checks.fetch_add(1, Ordering::SeqCst);
        let first = req.tx.first().copied().unwrap_or(0);
        let code = u32::from(first < self.reject_below.load(Ordering::SeqCst));
        ResponseCheckTx {
            code,
            gas_wanted: 1,
            ..Default::default()
        }
    }
}

fn mempool_with(config: MempoolConfig) -> (Mempool, Arc<ThresholdApp>) {
    let app = Arc::new(ThresholdApp::accept_all());
    let client = Arc::new(LocalClient::new(app.clone()));
    (Mempool::new(config, client, 0), app)
}

fn tx(first: u8, len: usize) -> Tx {
    let mut bytes = vec![first];
    bytes.resize(len, 0xaa);
    Tx::from(bytes)
}

fn block_at(height: i64, txs: Vec<Tx>) -> Block {
    Block {
        header: Header {
            height,
            ..Default::default()
        },
        txs,
        last_commit: Default::default(),
    }
}

#[tokio::test]
async fn test_admission_and_duplicate_rejection() {
    let (mempool, _app) = mempool_with(MempoolConfig::default());
    let t = tx(1, 8);

    let res = mempool.check_tx_sync(t.clone(), TxInfo::default()).await.unwrap();
    assert_eq!(res.code, 0);
    assert_eq!(mempool.size(), 1);
    assert_eq!(mempool.size_bytes(), 8);

    // Resident duplicates hit the pool map before the cache.
    let err = mempool.check_tx_sync(t, TxInfo::default()).await.unwrap_err();
    assert!(matches!(err, MempoolError::TxInMap));
    assert_eq!(mempool.size(), 1);
}

#[tokio::test]
async fn test_committed_tx_resubmission_hits_cache() {
    let (mempool, _app) = mempool_with(MempoolConfig::default());
    let t = tx(1, 8);
    mempool.check_tx_sync(t.clone(), TxInfo::default()).await.unwrap();

    let guard = mempool.lock().await;
    let ok = ResponseDeliverTx::default();
    mempool
        .update(&block_at(1, vec![t.clone()]), &[ok], None, None)
        .await
        .unwrap();
    drop(guard);
    assert_eq!(mempool.size(), 0);

    // Gone from the pool but still in the seen-cache.
    let err = mempool.check_tx_sync(t, TxInfo::default()).await.unwrap_err();
    assert!(matches!(err, MempoolError::TxInCache));
}

#[tokio::test]
async fn test_sender_recorded_on_admission() {
    let (mempool, _app) = mempool_with(MempoolConfig::default());
    let t = tx(1, 8);
    mempool
        .check_tx_sync(t.clone(), TxInfo { sender_id: 7 })
        .await
        .unwrap();

    // A resident duplicate is refused by the pool map before any sender
    // bookkeeping happens.
    let err = mempool
        .check_tx_sync(t.clone(), TxInfo { sender_id: 9 })
        .await
        .unwrap_err();
    assert!(matches!(err, MempoolError::TxInMap));
    assert_eq!(mempool.senders(&t.key()), vec![7]);
}

#[tokio::test]
async fn test_tx_too_large() {
    let config = MempoolConfig {
        max_tx_bytes: 16,
        ..Default::default()
    };
    let (mempool, _app) = mempool_with(config);
    let err = mempool
        .check_tx_sync(tx(1, 17), TxInfo::default())
        .await
        .unwrap_err();
    match err {
        MempoolError::TxTooLarge { max, actual } => {
            assert_eq!(max, 16);
            assert_eq!(actual, 17);
        }
        other => panic!("unexpected: {other:?}"),
    }
    // Exactly at the limit is fine.
    let res = mempool.check_tx_sync(tx(2, 16), TxInfo::default()).await.unwrap();
    assert_eq!(res.code, 0);
}

#[tokio::test]
async fn test_mempool_full_by_count() {
    let config = MempoolConfig {
        size: 2,
        ..Default::default()
    };
    let (mempool, _app) = mempool_with(config);
    mempool.check_tx_sync(tx(1, 4), TxInfo::default()).await.unwrap();
    mempool.check_tx_sync(tx(2, 4), TxInfo::default()).await.unwrap();

    let err = mempool
        .check_tx_sync(tx(3, 4), TxInfo::default())
        .await
        .unwrap_err();
    match err {
        MempoolError::MempoolFull { num_txs, max_txs, .. } => {
            assert_eq!(num_txs, 2);
            assert_eq!(max_txs, 2);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn test_mempool_full_by_bytes() {
    let config = MempoolConfig {
        max_txs_bytes: 10,
        ..Default::default()
    };
    let (mempool, _app) = mempool_with(config);
    mempool.check_tx_sync(tx(1, 6), TxInfo::default()).await.unwrap();
    let err = mempool
        .check_tx_sync(tx(2, 6), TxInfo::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MempoolError::MempoolFull { .. }));
}

#[tokio::test]
async fn test_pre_check_rejection() {
    let (mempool, app) = mempool_with(MempoolConfig::default());
    mempool.set_pre_check(Arc::new(|tx: &Tx| {
        if tx.len() % 2 == 0 {
            Ok(())
        } else {
            Err("odd-length tx".into())
        }
    }));

    let err = mempool
        .check_tx_sync(tx(1, 9), TxInfo::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MempoolError::PreCheck(_)));
    // The application never saw it.
    assert_eq!(app.checks.load(Ordering::SeqCst), 0);

    mempool.check_tx_sync(tx(1, 8), TxInfo::default()).await.unwrap();
    assert_eq!(app.checks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rejected_tx_not_kept_in_cache_by_default() {
    let (mempool, app) = mempool_with(MempoolConfig::default());
    app.reject_below.store(10, Ordering::SeqCst);

    let t = tx(1, 4);
    let res = mempool.check_tx_sync(t.clone(), TxInfo::default()).await.unwrap();
    assert_ne!(res.code, 0);
    assert_eq!(mempool.size(), 0);

    // Not cached, so a resubmission reaches the application again.
    app.reject_below.store(0, Ordering::SeqCst);
    let res = mempool.check_tx_sync(t, TxInfo::default()).await.unwrap();
    assert_eq!(res.code, 0);
    assert_eq!(mempool.size(), 1);
}

#[tokio::test]
async fn test_keep_invalid_txs_in_cache() {
    let config = MempoolConfig {
        keep_invalid_txs_in_cache: true,
        ..Default::default()
    };
    let (mempool, app) = mempool_with(config);
    app.reject_below.store(10, Ordering::SeqCst);

    let t = tx(1, 4);
    let res = mempool.check_tx_sync(t.clone(), TxInfo::default()).await.unwrap();
    assert_ne!(res.code, 0);

    // Still cached; the resubmission is refused without an ABCI round trip.
    let checks_before = app.checks.load(Ordering::SeqCst);
    let err = mempool.check_tx_sync(t, TxInfo::default()).await.unwrap_err();
    assert!(matches!(err, MempoolError::TxInCache));
    assert_eq!(app.checks.load(Ordering::SeqCst), checks_before);
}

#[tokio::test]
async fn test_check_tx_async_callbacks() {
    let (mempool, _app) = mempool_with(MempoolConfig::default());

    let prepared = Arc::new(AtomicUsize::new(0));
    let verdicts = Arc::new(AtomicUsize::new(0));
    let prepare_cb = {
        let prepared = prepared.clone();
        Box::new(move |err: Option<&MempoolError>| {
            assert!(err.is_none());
            prepared.fetch_add(1, Ordering::SeqCst);
        })
    };
    let check_cb: ostracon_abci::ResponseCallback = {
        let verdicts = verdicts.clone();
        Arc::new(move |_res| {
            verdicts.fetch_add(1, Ordering::SeqCst);
        })
    };
    mempool
        .check_tx_async(tx(1, 4), TxInfo::default(), Some(prepare_cb), Some(check_cb))
        .await;

    assert_eq!(prepared.load(Ordering::SeqCst), 1);
    assert_eq!(verdicts.load(Ordering::SeqCst), 1);
    assert_eq!(mempool.size(), 1);
}

#[tokio::test]
async fn test_reap_respects_exact_wire_size() {
    let (mempool, _app) = mempool_with(MempoolConfig::default());
    // 20-byte payloads serialize to 22 wire bytes each (tag + len + body).
    for i in 0..15u8 {
        mempool.check_tx_sync(tx(i + 1, 20), TxInfo::default()).await.unwrap();
    }
    assert_eq!(mempool.size(), 15);

    let reaped = mempool.reap_max_bytes_max_gas(240, -1).await;
    assert_eq!(reaped.len(), 10);
    // Prefix in admission order.
    for (i, t) in reaped.iter().enumerate() {
        assert_eq!(t.as_bytes()[0], i as u8 + 1);
    }

    let unbounded = mempool.reap_max_bytes_max_gas(-1, -1).await;
    assert_eq!(unbounded.len(), 15);
}

#[tokio::test]
async fn test_reap_respects_gas_and_count() {
    let (mempool, _app) = mempool_with(MempoolConfig::default());
    for i in 0..6u8 {
        mempool.check_tx_sync(tx(i + 1, 8), TxInfo::default()).await.unwrap();
    }
    // gas_wanted is 1 per tx.
    assert_eq!(mempool.reap_max_bytes_max_gas(-1, 4).await.len(), 4);
    assert_eq!(
        mempool.reap_max_bytes_max_gas_max_txs(-1, -1, 3).await.len(),
        3
    );
    assert_eq!(mempool.reap_max_txs(2).await.len(), 2);
    assert_eq!(mempool.reap_max_txs(-1).await.len(), 6);
}

#[tokio::test]
async fn test_update_removes_committed_txs() {
    let (mempool, _app) = mempool_with(MempoolConfig::default());
    let a = tx(1, 8);
    let b = tx(2, 8);
    mempool.check_tx_sync(a.clone(), TxInfo::default()).await.unwrap();
    mempool.check_tx_sync(b.clone(), TxInfo::default()).await.unwrap();

    let guard = mempool.lock().await;
    let responses = vec![ResponseDeliverTx::default()];
    mempool
        .update(&block_at(1, vec![a]), &responses, None, None)
        .await
        .unwrap();
    drop(guard);

    assert_eq!(mempool.size(), 1);
    assert_eq!(mempool.height(), 1);
    let remaining = mempool.reap_max_txs(-1).await;
    assert_eq!(remaining, vec![b]);
}

#[tokio::test]
async fn test_recheck_invalidates_stale_txs() {
    let (mempool, app) = mempool_with(MempoolConfig::default());
    for first in [1u8, 2, 3, 4] {
        mempool.check_tx_sync(tx(first, 8), TxInfo::default()).await.unwrap();
    }
    assert_eq!(mempool.size(), 4);

    // From the next height on, the application rejects first bytes < 3.
    app.reject_below.store(3, Ordering::SeqCst);
    let guard = mempool.lock().await;
    mempool
        .update(&block_at(1, Vec::new()), &[], None, None)
        .await
        .unwrap();
    drop(guard);

    assert_eq!(mempool.size(), 2);
    let remaining = mempool.reap_max_txs(-1).await;
    assert_eq!(remaining[0].as_bytes()[0], 3);
    assert_eq!(remaining[1].as_bytes()[0], 4);
}

#[tokio::test]
async fn test_update_post_check_evicts_remaining_txs() {
    let (mempool, _app) = mempool_with(MempoolConfig::default());
    for first in [1u8, 2, 3] {
        mempool.check_tx_sync(tx(first, 8), TxInfo::default()).await.unwrap();
    }

    let guard = mempool.lock().await;
    let responses = vec![ResponseDeliverTx::default(), ResponseDeliverTx::default()];
    mempool
        .update(&block_at(1, vec![tx(1, 8), tx(2, 8)]), &responses, None, None)
        .await
        .unwrap();
    drop(guard);
    assert_eq!(mempool.size(), 1);

    // The application keeps accepting everything; only the post_check
    // handed to update can evict the remaining tx during recheck.
    let post_check: ostracon_mempool::PostCheckFn =
        Arc::new(|t: &Tx, _res: &ResponseCheckTx| {
            if t.as_bytes()[0] == 3 {
                Err("no longer valid".into())
            } else {
                Ok(())
            }
        });
    let guard = mempool.lock().await;
    mempool
        .update(&block_at(2, Vec::new()), &[], None, Some(post_check))
        .await
        .unwrap();
    drop(guard);

    assert_eq!(mempool.size(), 0);
    assert_eq!(mempool.height(), 2);
}

#[tokio::test]
async fn test_txs_available_fires_once_per_height() {
    let (mempool, _app) = mempool_with(MempoolConfig::default());
    let mut available = mempool.enable_txs_available();

    mempool.check_tx_sync(tx(1, 4), TxInfo::default()).await.unwrap();
    available.try_recv().unwrap();

    // Second admission at the same height stays silent.
    mempool.check_tx_sync(tx(2, 4), TxInfo::default()).await.unwrap();
    assert!(available.try_recv().is_err());

    // A new height with a non-empty pool re-arms the signal.
    let guard = mempool.lock().await;
    mempool
        .update(&block_at(1, Vec::new()), &[], None, None)
        .await
        .unwrap();
    drop(guard);
    available.try_recv().unwrap();
}

#[tokio::test]
async fn test_flush_clears_pool_and_cache() {
    let (mempool, _app) = mempool_with(MempoolConfig::default());
    let t = tx(1, 4);
    mempool.check_tx_sync(t.clone(), TxInfo::default()).await.unwrap();
    mempool.flush().await;

    assert_eq!(mempool.size(), 0);
    assert_eq!(mempool.size_bytes(), 0);
    // Cache was reset too, so the same tx is admissible again.
    let res = mempool.check_tx_sync(t, TxInfo::default()).await.unwrap();
    assert_eq!(res.code, 0);
}

#[tokio::test]
async fn test_remove_tx_by_key() {
    let (mempool, _app) = mempool_with(MempoolConfig::default());
    let t = tx(1, 4);
    mempool.check_tx_sync(t.clone(), TxInfo::default()).await.unwrap();

    assert!(mempool.remove_tx_by_key(&t.key(), true));
    assert_eq!(mempool.size(), 0);
    assert!(!mempool.remove_tx_by_key(&t.key(), true));

    // Removed from the cache as well, so it can come back.
    let res = mempool.check_tx_sync(t, TxInfo::default()).await.unwrap();
    assert_eq!(res.code, 0);
}

#[tokio::test]
async fn test_wal_records_admitted_txs() {
    let dir = tempfile::tempdir().unwrap();
    let config = MempoolConfig {
        wal_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let (mempool, _app) = mempool_with(config);
    mempool.init_wal().unwrap();

    let t = tx(1, 4);
    mempool.check_tx_sync(t.clone(), TxInfo::default()).await.unwrap();
    mempool.close_wal();

    let contents = std::fs::read(dir.path().join("wal")).unwrap();
    let mut expected = t.as_bytes().to_vec();
    expected.push(b'\n');
    assert_eq!(contents, expected);
}
