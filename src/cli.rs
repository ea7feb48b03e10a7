// CLI arguments

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mini-chain")]
#[command(about = "Minimal proof-of-work blockchain node", long_about = None)]
pub struct Cli {
    /// Port for the HTTP control API
    #[arg(long, default_value_t = 3001)]
    pub http_port: u16,

    /// Port for node-to-node gossip
    #[arg(long, default_value_t = 3002)]
    pub gossip_port: u16,

    /// Gossip address of a peer to connect to at startup (repeatable)
    #[arg(long = "peer")]
    pub peers: Vec<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a key pair and print it
    Keygen,
}
