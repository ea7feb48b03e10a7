// Block data structure and canonical hashing

use crate::core::Transaction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum clock skew tolerated when validating a successor's timestamp.
pub const TIMESTAMP_SKEW_SECS: i64 = 10;

/// Difficulty carried by the genesis block.
pub const GENESIS_DIFFICULTY: u32 = 1;

/// A block in the chain. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    /// Hash of the preceding block; empty string for genesis.
    pub previous_hash: String,
    /// Unix seconds.
    pub timestamp: i64,
    pub difficulty: u32,
    pub nonce: u64,
    pub transactions: Vec<Transaction>,
    /// Hex SHA-256 over all preceding fields; always consistent with them.
    pub hash: String,
}

impl Block {
    /// Build a block and compute its hash from the given fields.
    pub fn new(
        index: u64,
        previous_hash: String,
        timestamp: i64,
        difficulty: u32,
        nonce: u64,
        transactions: Vec<Transaction>,
    ) -> Self {
        let hash = compute_hash(
            index,
            &previous_hash,
            timestamp,
            difficulty,
            nonce,
            &transactions,
        );
        Self {
            index,
            previous_hash,
            timestamp,
            difficulty,
            nonce,
            transactions,
            hash,
        }
    }

    /// The fixed first block every chain must share.
    pub fn genesis() -> Self {
        Self::new(0, String::new(), 0, GENESIS_DIFFICULTY, 0, Vec::new())
    }

    /// Recompute the hash from this block's fields.
    pub fn compute_hash(&self) -> String {
        compute_hash(
            self.index,
            &self.previous_hash,
            self.timestamp,
            self.difficulty,
            self.nonce,
            &self.transactions,
        )
    }
}

/// Canonical block hash: SHA-256 over the fixed-width big-endian encoding of
/// the integer fields, the previous hash as UTF-8, and the ordered
/// transaction ids as UTF-8. Hex-encoded. Must stay bit-exact across nodes.
pub fn compute_hash(
    index: u64,
    previous_hash: &str,
    timestamp: i64,
    difficulty: u32,
    nonce: u64,
    transactions: &[Transaction],
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(index.to_be_bytes());
    hasher.update(previous_hash.as_bytes());
    hasher.update(timestamp.to_be_bytes());
    hasher.update((difficulty as u64).to_be_bytes());
    hasher.update(nonce.to_be_bytes());
    for tx in transactions {
        hasher.update(tx.id.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Structural validity of `candidate` as the block after `prev`, checked
/// against the local wall clock.
pub fn is_valid_successor(prev: &Block, candidate: &Block) -> bool {
    is_valid_successor_at(prev, candidate, unix_now())
}

/// Like [`is_valid_successor`] with an explicit notion of "now".
pub fn is_valid_successor_at(prev: &Block, candidate: &Block, now: i64) -> bool {
    if prev.index + 1 != candidate.index {
        log::debug!(
            "rejecting block {}: index does not follow {}",
            candidate.index,
            prev.index
        );
        return false;
    }
    if prev.hash != candidate.previous_hash {
        log::debug!("rejecting block {}: previous hash mismatch", candidate.index);
        return false;
    }
    // The candidate may not sit more than the skew in the future of the local
    // clock, nor more than the skew behind its predecessor.
    if !(now > candidate.timestamp - TIMESTAMP_SKEW_SECS
        && candidate.timestamp > prev.timestamp - TIMESTAMP_SKEW_SECS)
    {
        log::debug!(
            "rejecting block {}: timestamp {} outside tolerance",
            candidate.index,
            candidate.timestamp
        );
        return false;
    }
    if candidate.hash != candidate.compute_hash() {
        log::debug!(
            "rejecting block {}: hash does not match contents",
            candidate.index
        );
        return false;
    }
    true
}

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn successor_of(prev: &Block, timestamp: i64) -> Block {
        Block::new(
            prev.index + 1,
            prev.hash.clone(),
            timestamp,
            prev.difficulty,
            0,
            Vec::new(),
        )
    }

    #[test]
    fn genesis_is_fixed() {
        let a = Block::genesis();
        let b = Block::genesis();
        assert_eq!(a, b);
        assert_eq!(a.index, 0);
        assert_eq!(a.previous_hash, "");
        assert_eq!(a.difficulty, GENESIS_DIFFICULTY);
        assert!(a.transactions.is_empty());
        assert_eq!(a.hash, a.compute_hash());
    }

    #[test]
    fn compute_hash_is_deterministic() {
        let h1 = compute_hash(3, "abc", 1_600_000_000, 2, 42, &[]);
        let h2 = compute_hash(3, "abc", 1_600_000_000, 2, 42, &[]);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);

        // Any field change moves the hash.
        assert_ne!(h1, compute_hash(4, "abc", 1_600_000_000, 2, 42, &[]));
        assert_ne!(h1, compute_hash(3, "abd", 1_600_000_000, 2, 42, &[]));
        assert_ne!(h1, compute_hash(3, "abc", 1_600_000_001, 2, 42, &[]));
        assert_ne!(h1, compute_hash(3, "abc", 1_600_000_000, 3, 42, &[]));
        assert_ne!(h1, compute_hash(3, "abc", 1_600_000_000, 2, 43, &[]));
    }

    #[test]
    fn valid_successor_accepted() {
        let genesis = Block::genesis();
        let next = successor_of(&genesis, unix_now());
        assert!(is_valid_successor(&genesis, &next));
        // Re-validating an already-valid block always succeeds.
        assert!(is_valid_successor(&genesis, &next));
    }

    #[test]
    fn successor_rejected_on_bad_index() {
        let genesis = Block::genesis();
        let mut next = successor_of(&genesis, unix_now());
        next.index = 2;
        next.hash = next.compute_hash();
        assert!(!is_valid_successor(&genesis, &next));
    }

    #[test]
    fn successor_rejected_on_bad_link() {
        let genesis = Block::genesis();
        let mut next = successor_of(&genesis, unix_now());
        next.previous_hash = "deadbeef".into();
        next.hash = next.compute_hash();
        assert!(!is_valid_successor(&genesis, &next));
    }

    #[test]
    fn successor_rejected_on_tampered_hash() {
        let genesis = Block::genesis();
        let mut next = successor_of(&genesis, unix_now());
        next.nonce += 1; // hash no longer matches contents
        assert!(!is_valid_successor(&genesis, &next));
    }

    #[test]
    fn successor_rejected_when_too_far_in_future() {
        let genesis = Block::genesis();
        let now = 1_600_000_000;
        let next = successor_of(&genesis, now + TIMESTAMP_SKEW_SECS + 1);
        assert!(!is_valid_successor_at(&genesis, &next, now));
        // Exactly at the boundary the strict comparison still rejects.
        let edge = successor_of(&genesis, now + TIMESTAMP_SKEW_SECS);
        assert!(!is_valid_successor_at(&genesis, &edge, now));
        // One second inside the window is fine.
        let ok = successor_of(&genesis, now + TIMESTAMP_SKEW_SECS - 1);
        assert!(is_valid_successor_at(&genesis, &ok, now));
    }

    #[test]
    fn successor_rejected_when_behind_predecessor() {
        let genesis = Block::genesis();
        let now = 1_600_000_000;
        let parent = successor_of(&genesis, now - 100);
        // More than the skew behind the parent.
        let stale = Block::new(
            parent.index + 1,
            parent.hash.clone(),
            parent.timestamp - TIMESTAMP_SKEW_SECS,
            parent.difficulty,
            0,
            Vec::new(),
        );
        assert!(!is_valid_successor_at(&parent, &stale, now));
        // Just inside the window.
        let ok = Block::new(
            parent.index + 1,
            parent.hash.clone(),
            parent.timestamp - TIMESTAMP_SKEW_SECS + 1,
            parent.difficulty,
            0,
            Vec::new(),
        );
        assert!(is_valid_successor_at(&parent, &ok, now));
    }

    #[test]
    fn serde_uses_camel_case_field_names() {
        let genesis = Block::genesis();
        let json = serde_json::to_value(&genesis).unwrap();
        for key in [
            "index",
            "previousHash",
            "timestamp",
            "difficulty",
            "nonce",
            "transactions",
            "hash",
        ] {
            assert!(json.get(key).is_some(), "missing field {key}");
        }
        let back: Block = serde_json::from_value(json).unwrap();
        assert_eq!(genesis, back);
    }
}
