mod message;
mod node;
mod peer;

pub use message::{MessageKind, PeerMessage};
pub use node::Node;
pub use peer::{PeerHandle, PeerRegistry};
