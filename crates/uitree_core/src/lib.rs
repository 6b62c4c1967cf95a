//! UI schema tree core: node model, mutation protocol, traversal,
//! classification, snapshot capture and diff.
//!
//! Transport-free: everything remote goes through [`ports::RemoteTreeStore`].

pub mod arena;
pub mod builders;
pub mod classify;
pub mod composite;
pub mod consistency;
pub mod diff;
pub mod error;
pub mod ids;
pub mod memory;
pub mod mutation;
pub mod node;
pub mod patch;
pub mod path_index;
pub mod ports;
pub mod position;
pub mod route;
pub mod snapshot;
pub mod traversal;

pub use error::{Result, TreeError};
pub use ids::{new_id, NodeId};
pub use memory::InMemoryTreeStore;
pub use mutation::{MutationProtocol, ProtocolConfig};
pub use node::{Props, TreeNode};
pub use patch::NodePatch;
pub use ports::RemoteTreeStore;
pub use position::InsertPosition;
pub use route::{RouteId, RouteNode, RouteType};
pub use snapshot::{Row, Snapshot, TableSpec};
