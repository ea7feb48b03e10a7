// Minimal proof-of-work blockchain node with a UTXO ledger

pub mod api;
pub mod cli;
pub mod consensus;
pub mod core;
pub mod error;
pub mod ledger;
pub mod network;
pub mod wallet;

// Re-exports for convenience
pub use cli::{Cli, Commands};
pub use consensus::Blockchain;
pub use core::{Block, Transaction, TxIn, TxOut, UnspentTxOut};
pub use error::NodeError;
pub use ledger::{TxRejection, UtxoSet};
pub use network::{Node, PeerMessage};
pub use wallet::KeyPair;
