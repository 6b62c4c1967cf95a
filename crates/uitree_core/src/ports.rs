//! Remote tree store port.
//!
//! The core never talks to a transport directly; everything goes through
//! [`RemoteTreeStore`]. Implemented by `uitree_client::HttpTreeStore` and by
//! [`crate::memory::InMemoryTreeStore`].

use async_trait::async_trait;

use crate::error::Result;
use crate::ids::NodeId;
use crate::node::TreeNode;
use crate::patch::NodePatch;
use crate::position::InsertPosition;
use crate::route::{NewRoute, RouteId, RouteNode, RouteUpdate};
use crate::snapshot::{Row, ROUTES_TABLE};

#[async_trait]
pub trait RemoteTreeStore: Send + Sync {
    // ── Schema tree ─────────────────────────────────────────────

    /// One node without its children. `Ok(None)` when absent.
    async fn get_node(&self, id: &str) -> Result<Option<TreeNode>>;

    /// The node with its full nested subtree. `Ok(None)` when absent.
    async fn get_subtree(&self, id: &str) -> Result<Option<TreeNode>>;

    /// Which of `ids` the store already holds, in no particular order.
    /// Stores with a filtered listing should answer in one round trip.
    async fn existing_ids(&self, ids: &[&str]) -> Result<Vec<NodeId>> {
        let mut found = Vec::new();
        for id in ids {
            if self.get_node(id).await?.is_some() {
                found.push(id.to_string());
            }
        }
        Ok(found)
    }

    /// Store `subtree` as a new detached root. Returns its root id.
    async fn insert_root(&self, subtree: &TreeNode) -> Result<NodeId>;

    /// Attach `subtree` relative to `anchor_id`. Returns its root id.
    /// Fails with `AnchorNotFound` or `InvalidPosition`.
    async fn insert_adjacent(
        &self,
        anchor_id: &str,
        position: InsertPosition,
        subtree: &TreeNode,
    ) -> Result<NodeId>;

    /// Replace the keys named by `patch`. Fails with `NodeNotFound`.
    async fn patch_node(&self, id: &str, patch: &NodePatch) -> Result<()>;

    /// Remove the node and its descendants. Absent nodes are a no-op.
    async fn remove_node(&self, id: &str) -> Result<()>;

    // ── Tables ──────────────────────────────────────────────────

    /// Every row of `table`, unpaginated.
    async fn list_rows(&self, table: &str) -> Result<Vec<Row>>;

    // ── Routes ──────────────────────────────────────────────────

    async fn create_route(&self, fields: &NewRoute) -> Result<RouteId>;

    async fn update_route(&self, id: RouteId, fields: &RouteUpdate) -> Result<()>;

    /// Absent routes are a no-op.
    async fn destroy_route(&self, id: RouteId) -> Result<()>;

    /// Every route, parsed from the routes table.
    async fn list_routes(&self) -> Result<Vec<RouteNode>> {
        self.list_rows(ROUTES_TABLE)
            .await?
            .iter()
            .map(RouteNode::from_row)
            .collect()
    }
}
