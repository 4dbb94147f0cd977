//! Vertex storage, label slots and the edge work queue.

pub mod ids;
pub mod index_vec;
pub mod io;
pub mod labels;
pub mod queue;
pub mod store;

pub use ids::{GlobalId, LocalId, Rank};
pub use index_vec::{Idx, IndexVec};
pub use io::{load_graph, read_adjacency, ParseError};
pub use labels::{Labels, PrevRef, INFINITE_LABEL};
pub use queue::{EdgeQueue, EdgeRef};
pub use store::{EdgeFlow, InEdge, OutEdge, Store, Vertex};
