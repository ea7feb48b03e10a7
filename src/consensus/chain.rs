// Chain state: blocks, ledger, mempool, and replacement rules

use crate::consensus::pow;
use crate::core::{is_valid_successor, outpoint_key, Block, Transaction};
use crate::ledger::{TxRejection, UtxoSet};
use std::collections::HashSet;

/// The chain, its derived UTXO set, and pending transactions.
///
/// One instance per node, guarded by a single lock; every mutation happens
/// through the methods here so the UTXO set can never drift from the blocks.
#[derive(Debug)]
pub struct Blockchain {
    blocks: Vec<Block>,
    utxos: UtxoSet,
    mempool: Vec<Transaction>,
}

impl Blockchain {
    /// A fresh chain holding only the genesis block.
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::genesis()],
            utxos: UtxoSet::new(),
            mempool: Vec::new(),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn latest_block(&self) -> &Block {
        // A chain always holds at least genesis.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: a chain holds at least the genesis block.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn utxos(&self) -> &UtxoSet {
        &self.utxos
    }

    /// Pending transactions for the next mined block, in submission order.
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.mempool.clone()
    }

    /// Difficulty the next block must be mined at.
    pub fn next_difficulty(&self) -> u32 {
        pow::next_difficulty(&self.blocks)
    }

    /// Try to append `block` on top of the current tip.
    ///
    /// The block must be a structurally valid successor and its transaction
    /// set must validate as a whole against the ledger; otherwise it is
    /// logged and dropped with state unchanged. Returns whether it was
    /// appended.
    pub fn add_block(&mut self, block: Block) -> bool {
        if !is_valid_successor(self.latest_block(), &block) {
            log::warn!("rejected invalid block {}", block.index);
            return false;
        }
        if let Err(reason) = self.utxos.validate_block_txs(&block.transactions, block.index) {
            log::warn!("rejected block {}: {reason}", block.index);
            return false;
        }
        self.utxos.apply_block_txs(&block.transactions);
        log::info!("appended block {} ({})", block.index, block.hash);
        self.blocks.push(block);
        self.prune_mempool();
        true
    }

    /// Structural validity of a candidate chain: byte-identical genesis,
    /// every consecutive pair a valid successor.
    pub fn is_valid_chain(&self, candidate: &[Block]) -> bool {
        if candidate.first() != Some(&self.blocks[0]) {
            return false;
        }
        candidate
            .windows(2)
            .all(|pair| is_valid_successor(&pair[0], &pair[1]))
    }

    /// Adopt `candidate` iff it is fully valid and strictly longer than the
    /// local chain. The UTXO set is rebuilt by replaying the adopted chain
    /// from genesis; nothing carries over from the old one. Returns whether
    /// the chain was replaced.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> bool {
        if candidate.len() <= self.blocks.len() {
            log::info!(
                "ignoring candidate chain of length {} (local {})",
                candidate.len(),
                self.blocks.len()
            );
            return false;
        }
        if !self.is_valid_chain(&candidate) {
            log::warn!("received chain is structurally invalid");
            return false;
        }
        let utxos = match UtxoSet::replay(&candidate) {
            Ok(set) => set,
            Err(reason) => {
                log::warn!("received chain carries invalid transactions: {reason}");
                return false;
            }
        };
        log::info!(
            "replacing chain: {} -> {} blocks",
            self.blocks.len(),
            candidate.len()
        );
        self.blocks = candidate;
        self.utxos = utxos;
        self.prune_mempool();
        true
    }

    /// Queue a transaction for inclusion in the next mined block after
    /// validating it against the current ledger.
    ///
    /// Block validation judges a transaction set against a static ledger and
    /// cannot see conflicts between pending spends, so admission also rejects
    /// any input already referenced by a queued transaction.
    pub fn submit_transaction(&mut self, tx: Transaction) -> Result<(), TxRejection> {
        self.utxos.validate_spend(&tx)?;
        let pending: HashSet<String> = self
            .mempool
            .iter()
            .flat_map(|t| t.inputs.iter())
            .map(|i| outpoint_key(&i.spent_output_id, i.spent_output_index))
            .collect();
        for input in &tx.inputs {
            let key = outpoint_key(&input.spent_output_id, input.spent_output_index);
            if pending.contains(&key) {
                return Err(TxRejection::PendingConflict(key));
            }
        }
        log::info!("accepted transaction {} into mempool", tx.id);
        self.mempool.push(tx);
        Ok(())
    }

    /// Drop pending transactions the current ledger can no longer satisfy
    /// (inputs spent by an accepted block, or invalidated by replacement).
    fn prune_mempool(&mut self) {
        let utxos = &self.utxos;
        let before = self.mempool.len();
        self.mempool.retain(|tx| utxos.validate_spend(tx).is_ok());
        let dropped = before - self.mempool.len();
        if dropped > 0 {
            log::debug!("pruned {dropped} stale transactions from mempool");
        }
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}
