// Unspent-output ledger

mod utxo;

pub use utxo::{TxRejection, UtxoSet};
