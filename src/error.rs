// Node-level failures

use thiserror::Error;

/// Failures surfaced by node operations. Structural rejection of a block or
/// chain is not an error; it is an ordinary outcome logged and reported as
/// `false` by the chain methods.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("internal error: {0}")]
    Internal(String),

    #[error("mining abandoned: chain tip changed during the search")]
    MiningSuperseded,

    #[error("mined block no longer extends the chain tip")]
    StaleBlock,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
