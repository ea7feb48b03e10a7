mod chain;
pub mod pow;

pub use chain::Blockchain;
