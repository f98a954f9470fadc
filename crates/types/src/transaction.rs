//! Raw transactions and their stable identity.
//!
//! A transaction is an opaque byte string at this layer; the application
//! assigns it meaning through CheckTx/DeliverTx. Its identity everywhere in
//! the engine is [`TxKey`], the SHA-256 digest of the raw bytes.

use crate::Hash;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque transaction, as submitted by users and gossiped between peers.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Tx(pub Bytes);

/// SHA-256 digest of a transaction's raw bytes; its stable identity in the
/// mempool and caches.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxKey(pub Hash);

impl Tx {
    /// Compute this transaction's key.
    pub fn key(&self) -> TxKey {
        TxKey(Hash::sha256(&self.0))
    }

    /// Length of the raw transaction in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the transaction is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw transaction bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Exact wire size of this transaction when embedded as one entry of a
    /// protobuf `repeated bytes` field (tag byte + varint length + payload).
    ///
    /// Reap byte budgets are measured against this, not `len()`, because
    /// proto framing adds overhead per transaction.
    pub fn proto_size(&self) -> u64 {
        let len = self.0.len() as u64;
        1 + varint_len(len) + len
    }
}

/// Number of bytes needed to varint-encode `value`.
fn varint_len(value: u64) -> u64 {
    if value == 0 {
        return 1;
    }
    ((64 - value.leading_zeros() as u64) + 6) / 7
}

impl From<Vec<u8>> for Tx {
    fn from(bytes: Vec<u8>) -> Self {
        Tx(Bytes::from(bytes))
    }
}

impl From<Bytes> for Tx {
    fn from(bytes: Bytes) -> Self {
        Tx(bytes)
    }
}

impl From<&[u8]> for Tx {
    fn from(bytes: &[u8]) -> Self {
        Tx(Bytes::copy_from_slice(bytes))
    }
}

impl AsRef<[u8]> for Tx {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tx(0x{})", hex::encode(&self.0))
    }
}

impl fmt::Display for TxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxKey({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_sha256_of_bytes() {
        let tx = Tx::from(vec![0x01]);
        assert_eq!(tx.key().0, Hash::sha256(&[0x01]));
    }

    #[test]
    fn proto_size_accounts_for_framing() {
        // 1-byte payload: tag(1) + len varint(1) + payload(1)
        assert_eq!(Tx::from(vec![0xff]).proto_size(), 3);
        // empty payload still carries framing
        assert_eq!(Tx::from(Vec::new()).proto_size(), 2);
        // 200 bytes: len fits in one varint byte until 128
        let tx = Tx::from(vec![0u8; 200]);
        assert_eq!(tx.proto_size(), 1 + 2 + 200);
    }

    #[test]
    fn varint_len_boundaries() {
        assert_eq!(varint_len(0), 1);
        assert_eq!(varint_len(127), 1);
        assert_eq!(varint_len(128), 2);
        assert_eq!(varint_len(16_383), 2);
        assert_eq!(varint_len(16_384), 3);
    }
}
