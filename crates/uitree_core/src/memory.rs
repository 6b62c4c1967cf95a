//! In-process tree store.
//!
//! Keeps the arena, the closure index and the route table in memory behind
//! a `tokio::sync::RwLock`. Used to rehearse batches offline and by every
//! test; supports injected failures so degraded paths are reachable.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::arena::NodeArena;
use crate::error::{Result, TreeError};
use crate::ids::NodeId;
use crate::node::{TreeNode, NAME};
use crate::patch::NodePatch;
use crate::path_index::{TreePathEntry, TreePathIndex};
use crate::ports::RemoteTreeStore;
use crate::position::InsertPosition;
use crate::route::{NewRoute, RouteId, RouteNode, RouteUpdate};
use crate::snapshot::{Row, ROUTES_TABLE, SCHEMAS_TABLE, TREE_PATH_TABLE};

/// Where the store should fail on purpose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailurePoint {
    /// `list_rows` on this table fails until cleared.
    ListRows(String),
    /// `create_route` succeeds `after` times, then fails.
    CreateRoute { after: usize },
    /// `insert_root` succeeds `after` times, then fails.
    InsertRoot { after: usize },
}

#[derive(Debug, Default)]
struct StoreState {
    arena: NodeArena,
    paths: TreePathIndex,
    routes: BTreeMap<RouteId, RouteNode>,
    last_route_id: RouteId,
    tables: BTreeMap<String, Vec<Row>>,
    failures: Vec<FailurePoint>,
    route_creates: usize,
    root_inserts: usize,
    mutations: usize,
}

impl StoreState {
    fn injected(&self, what: &str) -> TreeError {
        TreeError::TransportFailure(format!("injected failure: {what}"))
    }

    fn create_route_fails(&mut self) -> bool {
        let n = self.route_creates;
        self.route_creates += 1;
        self.failures
            .iter()
            .any(|f| matches!(f, FailurePoint::CreateRoute { after } if n >= *after))
    }

    fn insert_root_fails(&mut self) -> bool {
        let n = self.root_inserts;
        self.root_inserts += 1;
        self.failures
            .iter()
            .any(|f| matches!(f, FailurePoint::InsertRoot { after } if n >= *after))
    }

    fn schema_rows(&self) -> Vec<Row> {
        self.arena
            .document_order()
            .into_iter()
            .map(|record| {
                let mut row = record.node.shallow_schema();
                row.entry(NAME)
                    .or_insert_with(|| Value::String(record.key.clone()));
                row
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTreeStore {
    state: RwLock<StoreState>,
}

impl InMemoryTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provide rows for a table the store does not derive itself.
    pub async fn seed_table(&self, table: impl Into<String>, rows: Vec<Row>) {
        self.state.write().await.tables.insert(table.into(), rows);
    }

    pub async fn inject_failure(&self, point: FailurePoint) {
        self.state.write().await.failures.push(point);
    }

    pub async fn clear_failures(&self) {
        self.state.write().await.failures.clear();
    }

    /// Mutating calls received so far, no-ops included.
    pub async fn mutation_count(&self) -> usize {
        self.state.read().await.mutations
    }

    pub async fn node_count(&self) -> usize {
        self.state.read().await.arena.len()
    }

    pub async fn path_entries(&self) -> Vec<TreePathEntry> {
        self.state.read().await.paths.entries()
    }

    /// Whether the closure index still mentions `id`.
    pub async fn path_references(&self, id: &str) -> bool {
        self.state.read().await.paths.references(id)
    }

    pub async fn ancestors(&self, id: &str) -> Vec<NodeId> {
        self.state.read().await.paths.ancestors(id)
    }

    pub async fn route(&self, id: RouteId) -> Option<RouteNode> {
        self.state.read().await.routes.get(&id).cloned()
    }
}

#[async_trait]
impl RemoteTreeStore for InMemoryTreeStore {
    async fn get_node(&self, id: &str) -> Result<Option<TreeNode>> {
        Ok(self.state.read().await.arena.get(id).cloned())
    }

    async fn get_subtree(&self, id: &str) -> Result<Option<TreeNode>> {
        Ok(self.state.read().await.arena.subtree(id))
    }

    async fn existing_ids(&self, ids: &[&str]) -> Result<Vec<NodeId>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter(|id| state.arena.contains(id))
            .map(|id| id.to_string())
            .collect())
    }

    async fn insert_root(&self, subtree: &TreeNode) -> Result<NodeId> {
        let mut state = self.state.write().await;
        state.mutations += 1;
        if state.insert_root_fails() {
            return Err(state.injected("insert_root"));
        }
        let root_id = state.arena.insert_root(subtree)?;
        state.paths.insert_subtree(&[], subtree);
        Ok(root_id)
    }

    async fn insert_adjacent(
        &self,
        anchor_id: &str,
        position: InsertPosition,
        subtree: &TreeNode,
    ) -> Result<NodeId> {
        let mut state = self.state.write().await;
        state.mutations += 1;
        let root_id = state.arena.insert_adjacent(anchor_id, position, subtree)?;
        let lineage = state.arena.ancestors(&root_id);
        state.paths.insert_subtree(&lineage, subtree);
        Ok(root_id)
    }

    async fn patch_node(&self, id: &str, patch: &NodePatch) -> Result<()> {
        let mut state = self.state.write().await;
        state.mutations += 1;
        state.arena.patch(id, patch)
    }

    async fn remove_node(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.mutations += 1;
        let removed = state.arena.remove(id);
        state.paths.remove_descendants(&removed);
        Ok(())
    }

    async fn list_rows(&self, table: &str) -> Result<Vec<Row>> {
        let state = self.state.read().await;
        if state
            .failures
            .iter()
            .any(|f| matches!(f, FailurePoint::ListRows(t) if t == table))
        {
            return Err(state.injected(table));
        }
        match table {
            ROUTES_TABLE => Ok(state.routes.values().map(RouteNode::to_row).collect()),
            SCHEMAS_TABLE => Ok(state.schema_rows()),
            TREE_PATH_TABLE => Ok(state.paths.rows()),
            other => state
                .tables
                .get(other)
                .cloned()
                .ok_or_else(|| TreeError::TransportFailure(format!("unknown table: {other}"))),
        }
    }

    async fn create_route(&self, fields: &NewRoute) -> Result<RouteId> {
        let mut state = self.state.write().await;
        state.mutations += 1;
        if state.create_route_fails() {
            return Err(state.injected("create_route"));
        }
        if let Some(parent) = fields.parent_id {
            if !state.routes.contains_key(&parent) {
                return Err(TreeError::RouteNotFound(parent));
            }
        }
        state.last_route_id += 1;
        let id = state.last_route_id;
        state.routes.insert(id, RouteNode::from_new(id, fields));
        Ok(id)
    }

    async fn update_route(&self, id: RouteId, fields: &RouteUpdate) -> Result<()> {
        let mut state = self.state.write().await;
        state.mutations += 1;
        let route = state
            .routes
            .get_mut(&id)
            .ok_or(TreeError::RouteNotFound(id))?;
        route.apply(fields);
        Ok(())
    }

    async fn destroy_route(&self, id: RouteId) -> Result<()> {
        let mut state = self.state.write().await;
        state.mutations += 1;
        state.routes.remove(&id);
        Ok(())
    }
}
