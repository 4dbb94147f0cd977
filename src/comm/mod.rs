//! Message passing between peer ranks: tagged envelopes, the transport
//! trait, and the in-process cluster implementation.

pub mod local;
pub mod message;
pub mod transport;

pub use local::{LocalCluster, LocalComm};
pub use message::{Envelope, Message, MessageData, Tag};
pub use transport::{broadcast, CommError, Transport};
