// Transaction data structures

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Amount granted by the mandatory coinbase transaction of every block.
pub const COINBASE_REWARD: u64 = 100;

/// Transaction input - spends a specific unspent output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxIn {
    /// Id of the transaction that produced the output being spent.
    /// Empty for a coinbase input.
    pub spent_output_id: String,
    /// Output position within that transaction. For a coinbase input this is
    /// a sentinel carrying the new block's index.
    pub spent_output_index: u64,
    /// Hex compact recoverable ECDSA signature over the transaction id.
    /// Empty for a coinbase input.
    pub signature: String,
}

/// Transaction output - grants `amount` to `address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOut {
    /// Hex of the owner's compressed public key.
    pub address: String,
    pub amount: u64,
}

/// A transfer of value. Immutable after signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Hex SHA-256 over the positional encoding of inputs and outputs.
    pub id: String,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
}

impl Transaction {
    /// Build a transaction with its id computed from the contents.
    /// Signatures are applied to the inputs afterwards; they are not part of
    /// the id preimage.
    pub fn new(inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Self {
        let mut tx = Self {
            id: String::new(),
            inputs,
            outputs,
        };
        tx.id = tx.compute_id();
        tx
    }

    /// The reward transaction that must lead every block's transaction set:
    /// one sentinel input carrying the block index, one output paying the
    /// fixed reward.
    pub fn coinbase(address: &str, block_index: u64) -> Self {
        Self::new(
            vec![TxIn {
                spent_output_id: String::new(),
                spent_output_index: block_index,
                signature: String::new(),
            }],
            vec![TxOut {
                address: address.to_string(),
                amount: COINBASE_REWARD,
            }],
        )
    }

    /// Canonical id: SHA-256 over `spentOutputId ‖ be64(spentOutputIndex)`
    /// per input followed by `address ‖ be64(amount)` per output, hex-encoded.
    pub fn compute_id(&self) -> String {
        let mut hasher = Sha256::new();
        for input in &self.inputs {
            hasher.update(input.spent_output_id.as_bytes());
            hasher.update(input.spent_output_index.to_be_bytes());
        }
        for output in &self.outputs {
            hasher.update(output.address.as_bytes());
            hasher.update(output.amount.to_be_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// A spendable output tracked by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnspentTxOut {
    pub output_id: String,
    pub output_index: u64,
    pub address: String,
    pub amount: u64,
}

/// Map key for a UTXO: the producing transaction id plus output position.
pub fn outpoint_key(output_id: &str, output_index: u64) -> String {
    format!("{output_id}:{output_index}")
}
