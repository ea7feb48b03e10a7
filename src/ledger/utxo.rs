// UTXO set and transaction validation

use crate::core::{outpoint_key, Block, Transaction, UnspentTxOut, COINBASE_REWARD};
use crate::wallet;
use std::collections::HashMap;
use thiserror::Error;

/// Why a transaction (or a block's transaction set) was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxRejection {
    #[error("transaction id does not match its contents")]
    IdMismatch,
    #[error("transaction has no inputs or no outputs")]
    Empty,
    #[error("block's first transaction is not a well-formed coinbase")]
    BadCoinbase,
    #[error("block carries no transactions")]
    MissingCoinbase,
    #[error("referenced output {0} is not unspent")]
    MissingUtxo(String),
    #[error("output {0} is already spent by a pending transaction")]
    PendingConflict(String),
    #[error("signature does not recover to the owning address")]
    BadSignature,
    #[error("input amounts do not equal output amounts")]
    Unbalanced,
}

/// The set of spendable outputs, keyed by `(outputId, outputIndex)`.
///
/// Owned exclusively by the chain that produced it; mutated only when a block
/// is accepted, never during validation.
#[derive(Debug, Clone, Default)]
pub struct UtxoSet {
    map: HashMap<String, UnspentTxOut>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, output_id: &str, output_index: u64) -> Option<&UnspentTxOut> {
        self.map.get(&outpoint_key(output_id, output_index))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnspentTxOut> {
        self.map.values()
    }

    /// Validate a block's complete transaction set against this ledger.
    /// The first transaction must be the coinbase for `block_index`; every
    /// other transaction must spend existing outputs with valid signatures
    /// and balance exactly. The set is judged as a whole.
    pub fn validate_block_txs(
        &self,
        txs: &[Transaction],
        block_index: u64,
    ) -> Result<(), TxRejection> {
        let Some((coinbase, rest)) = txs.split_first() else {
            return Err(TxRejection::MissingCoinbase);
        };
        validate_coinbase(coinbase, block_index)?;
        for tx in rest {
            self.validate_spend(tx)?;
        }
        Ok(())
    }

    /// Validate a single non-coinbase transaction against the current set.
    pub fn validate_spend(&self, tx: &Transaction) -> Result<(), TxRejection> {
        if tx.inputs.is_empty() || tx.outputs.is_empty() {
            return Err(TxRejection::Empty);
        }
        if tx.id != tx.compute_id() {
            return Err(TxRejection::IdMismatch);
        }
        let mut spent: u128 = 0;
        for input in &tx.inputs {
            let utxo = self
                .get(&input.spent_output_id, input.spent_output_index)
                .ok_or_else(|| {
                    TxRejection::MissingUtxo(outpoint_key(
                        &input.spent_output_id,
                        input.spent_output_index,
                    ))
                })?;
            match wallet::recover_address(&tx.id, &input.signature) {
                Some(addr) if addr == utxo.address => {}
                _ => return Err(TxRejection::BadSignature),
            }
            spent += utxo.amount as u128;
        }
        let produced: u128 = tx.outputs.iter().map(|o| o.amount as u128).sum();
        if spent != produced {
            return Err(TxRejection::Unbalanced);
        }
        Ok(())
    }

    /// Apply an accepted transaction set: consumed outputs leave the set,
    /// every output of every transaction (coinbase included) joins it.
    /// Callers validate first; application itself cannot fail.
    pub fn apply_block_txs(&mut self, txs: &[Transaction]) {
        for tx in txs {
            for input in &tx.inputs {
                self.map
                    .remove(&outpoint_key(&input.spent_output_id, input.spent_output_index));
            }
            for (i, output) in tx.outputs.iter().enumerate() {
                let key = outpoint_key(&tx.id, i as u64);
                self.map.insert(
                    key,
                    UnspentTxOut {
                        output_id: tx.id.clone(),
                        output_index: i as u64,
                        address: output.address.clone(),
                        amount: output.amount,
                    },
                );
            }
        }
    }

    /// Rebuild a ledger by replaying `blocks` from genesis, validating every
    /// block's transaction set along the way. The first block (genesis) has
    /// no transactions to process.
    pub fn replay(blocks: &[Block]) -> Result<Self, TxRejection> {
        let mut set = Self::new();
        for block in blocks.iter().skip(1) {
            set.validate_block_txs(&block.transactions, block.index)?;
            set.apply_block_txs(&block.transactions);
        }
        Ok(set)
    }
}

/// The coinbase rule: exactly one input whose index is the block index,
/// exactly one output paying the fixed reward, id matching the contents.
fn validate_coinbase(tx: &Transaction, block_index: u64) -> Result<(), TxRejection> {
    if tx.id != tx.compute_id() {
        return Err(TxRejection::IdMismatch);
    }
    if tx.inputs.len() != 1
        || tx.inputs[0].spent_output_index != block_index
        || tx.outputs.len() != 1
        || tx.outputs[0].amount != COINBASE_REWARD
    {
        return Err(TxRejection::BadCoinbase);
    }
    Ok(())
}
