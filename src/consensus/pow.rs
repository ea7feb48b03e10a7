// Proof of work: difficulty target, nonce search, difficulty adjustment

use crate::core::{Block, Transaction};

/// Difficulty is recomputed every this many blocks.
pub const DIFFICULTY_ADJUST_INTERVAL: u64 = 10;

/// Target seconds between blocks.
pub const TARGET_SECONDS_PER_BLOCK: i64 = 10;

/// Whether a hex hash satisfies `difficulty`.
///
/// Counts `'0'` characters anywhere in the hash, not just the leading run,
/// and is satisfied once the running count reaches `difficulty`. This
/// non-positional rule is weaker than leading-zero proof-of-work but is the
/// wire-compatible behavior and must be preserved as-is.
pub fn hash_matches_difficulty(hash: &str, difficulty: u32) -> bool {
    if difficulty == 0 {
        return true;
    }
    let mut remaining = difficulty;
    for c in hash.chars() {
        if c == '0' {
            remaining -= 1;
            if remaining == 0 {
                return true;
            }
        }
    }
    false
}

/// Difficulty of the next block given the current chain.
///
/// Recomputed only when the last block sits on an adjustment boundary
/// (index a non-zero multiple of [`DIFFICULTY_ADJUST_INTERVAL`]); otherwise
/// the last block's difficulty carries over. Integer (floor) division at the
/// boundary is deliberate.
pub fn next_difficulty(blocks: &[Block]) -> u32 {
    let Some(last) = blocks.last() else {
        return crate::core::GENESIS_DIFFICULTY;
    };
    if last.index == 0 || last.index % DIFFICULTY_ADJUST_INTERVAL != 0 {
        return last.difficulty;
    }
    let anchor = &blocks[blocks.len() - DIFFICULTY_ADJUST_INTERVAL as usize];
    let time_spent = last.timestamp - anchor.timestamp;
    let time_expected = DIFFICULTY_ADJUST_INTERVAL as i64 * TARGET_SECONDS_PER_BLOCK;
    if time_spent < time_expected / 2 {
        last.difficulty + 1
    } else if time_spent > time_expected * 2 {
        last.difficulty.saturating_sub(1)
    } else {
        last.difficulty
    }
}

/// Search nonces from 0 upward until the block hash satisfies `difficulty`.
///
/// CPU-bound and unbounded; runs outside any lock. The `cancelled` probe is
/// sampled periodically so an in-flight search can be abandoned when the
/// chain tip moves; returns `None` in that case. For fixed inputs the result
/// is deterministic: the first satisfying nonce in order.
pub fn mine_block(
    index: u64,
    previous_hash: String,
    timestamp: i64,
    difficulty: u32,
    transactions: Vec<Transaction>,
    cancelled: impl Fn() -> bool,
) -> Option<Block> {
    let mut attempts: u64 = 0;
    for nonce in 0.. {
        let hash = crate::core::compute_hash(
            index,
            &previous_hash,
            timestamp,
            difficulty,
            nonce,
            &transactions,
        );
        if hash_matches_difficulty(&hash, difficulty) {
            log::info!("mined block {index} at difficulty {difficulty} after {} attempts", attempts + 1);
            return Some(Block::new(
                index,
                previous_hash,
                timestamp,
                difficulty,
                nonce,
                transactions,
            ));
        }
        attempts += 1;
        if attempts % 1024 == 0 && cancelled() {
            log::info!("abandoning mining of block {index}: chain tip moved");
            return None;
        }
        if attempts % 100_000 == 0 {
            log::debug!("mining block {index}: {attempts} attempts");
        }
    }
    None
}
