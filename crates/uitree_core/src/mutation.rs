//! Mutation protocol: checked insert / patch / remove against a store.
//!
//! Every call validates its preconditions with reads first (anchor exists,
//! ids well-formed and unused, target exists) and only then issues the
//! mutating call. In dry-run mode the reads still happen but the mutating
//! call is skipped; the journal records what would have been sent, and a
//! rehearsal overlay keeps track of what the store would now hold, so later
//! steps can anchor on nodes an earlier step only planned.
//!
//! The protocol assumes it is the only writer during a batch. There is no
//! locking and no optimistic-concurrency check.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{Result, TreeError};
use crate::ids::{is_well_formed, NodeId};
use crate::node::{TreeNode, DEFAULT_CONTAINER_TYPES};
use crate::patch::NodePatch;
use crate::ports::RemoteTreeStore;
use crate::position::InsertPosition;
use crate::route::{NewRoute, RouteId, RouteUpdate};

#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolConfig {
    /// Validate only; issue no mutating call.
    pub dry_run: bool,
    /// Component types allowed to receive child insertions. `None` skips
    /// the check.
    pub container_types: Option<Vec<String>>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            container_types: Some(DEFAULT_CONTAINER_TYPES.iter().map(|s| s.to_string()).collect()),
        }
    }
}

impl ProtocolConfig {
    pub fn rehearsal() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }
}

/// A mutating call, as issued or as it would have been issued.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlannedMutation {
    InsertRoot {
        root_id: NodeId,
        node_count: usize,
    },
    InsertAdjacent {
        anchor_id: NodeId,
        position: InsertPosition,
        root_id: NodeId,
        node_count: usize,
    },
    Patch {
        node_id: NodeId,
        patch: NodePatch,
    },
    Remove {
        node_id: NodeId,
        existed: bool,
    },
    CreateRoute {
        route_id: RouteId,
        fields: NewRoute,
    },
    UpdateRoute {
        route_id: RouteId,
        fields: RouteUpdate,
    },
    DestroyRoute {
        route_id: RouteId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalEntry {
    pub mutation: PlannedMutation,
    /// False when rehearsed, or when the call was a no-op (absent node).
    pub applied: bool,
}

/// Where a rehearsed node would sit, as far as the protocol knows.
#[derive(Debug, Clone)]
enum Placement {
    Root,
    ChildOf(NodeId),
    /// Next to a store node whose parent was never read.
    SiblingOf(NodeId),
}

#[derive(Debug, Clone)]
struct PlannedNode {
    node: TreeNode,
    placement: Placement,
}

/// Store state a dry run has produced so far, layered over the real store.
#[derive(Debug, Default)]
struct Rehearsal {
    planned: HashMap<NodeId, PlannedNode>,
    /// Store nodes patched during the rehearsal.
    edited: HashMap<NodeId, TreeNode>,
    removed: HashSet<NodeId>,
}

impl Rehearsal {
    /// `Some(Some(_))` when the overlay knows the node, `Some(None)` when it
    /// was removed, `None` when the store decides.
    fn lookup(&self, id: &str) -> Option<Option<TreeNode>> {
        if self.removed.contains(id) {
            return Some(None);
        }
        self.planned
            .get(id)
            .map(|p| &p.node)
            .or_else(|| self.edited.get(id))
            .map(|node| Some(node.clone()))
    }

    fn plan(&mut self, subtree: &TreeNode, placement: Placement) {
        self.removed.remove(&subtree.id);
        for (_, child) in &subtree.children {
            self.plan(child, Placement::ChildOf(subtree.id.clone()));
        }
        self.planned.insert(
            subtree.id.clone(),
            PlannedNode {
                node: subtree.shallow(),
                placement,
            },
        );
    }

    fn placement_beside(&self, anchor_id: &str) -> Placement {
        match self.planned.get(anchor_id) {
            Some(anchor) => anchor.placement.clone(),
            None => Placement::SiblingOf(anchor_id.to_string()),
        }
    }

    fn edit(&mut self, node: TreeNode) {
        match self.planned.get_mut(&node.id) {
            Some(planned) => planned.node = node,
            None => {
                self.edited.insert(node.id.clone(), node);
            }
        }
    }

    /// Drop `root` and every planned node known to sit below it.
    /// `store_ids` is the store subtree of `root`, empty when `root` was only
    /// planned.
    fn unplan(&mut self, root: &str, store_ids: Vec<NodeId>) {
        let mut gone: HashSet<NodeId> = store_ids.into_iter().collect();
        gone.insert(root.to_string());
        loop {
            let below: Vec<NodeId> = self
                .planned
                .iter()
                .filter(|(id, planned)| {
                    !gone.contains(id.as_str())
                        && match &planned.placement {
                            Placement::Root => false,
                            Placement::ChildOf(parent) => gone.contains(parent),
                            Placement::SiblingOf(sibling) => sibling != root && gone.contains(sibling),
                        }
                })
                .map(|(id, _)| id.clone())
                .collect();
            if below.is_empty() {
                break;
            }
            gone.extend(below);
        }
        for id in &gone {
            self.planned.remove(id);
            self.edited.remove(id);
        }
        self.removed.extend(gone);
    }
}

pub struct MutationProtocol<'a> {
    store: &'a dyn RemoteTreeStore,
    config: ProtocolConfig,
    journal: Vec<JournalEntry>,
    placeholder_routes: RouteId,
    rehearsal: Option<Rehearsal>,
}

impl<'a> MutationProtocol<'a> {
    pub fn new(store: &'a dyn RemoteTreeStore) -> Self {
        Self::with_config(store, ProtocolConfig::default())
    }

    pub fn with_config(store: &'a dyn RemoteTreeStore, config: ProtocolConfig) -> Self {
        Self {
            store,
            rehearsal: config.dry_run.then(Rehearsal::default),
            config,
            journal: Vec::new(),
            placeholder_routes: 0,
        }
    }

    /// Protocol that validates everything and mutates nothing.
    pub fn dry_run(store: &'a dyn RemoteTreeStore) -> Self {
        Self::with_config(store, ProtocolConfig::rehearsal())
    }

    pub fn is_dry_run(&self) -> bool {
        self.config.dry_run
    }

    pub fn store(&self) -> &'a dyn RemoteTreeStore {
        self.store
    }

    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    pub fn take_journal(&mut self) -> Vec<JournalEntry> {
        std::mem::take(&mut self.journal)
    }

    fn record(&mut self, mutation: PlannedMutation, applied: bool) {
        tracing::info!(
            target: "uitree.mutation",
            dry_run = self.config.dry_run,
            applied,
            mutation = ?mutation,
            "mutation"
        );
        self.journal.push(JournalEntry { mutation, applied });
    }

    // ── Tree ────────────────────────────────────────────────────

    /// Store `subtree` as a new root. Returns its root id.
    pub async fn insert_root(&mut self, subtree: &TreeNode) -> Result<NodeId> {
        self.check_subtree(subtree).await?;

        let root_id = match &mut self.rehearsal {
            Some(rehearsal) => {
                rehearsal.plan(subtree, Placement::Root);
                subtree.id.clone()
            }
            None => self.store.insert_root(subtree).await?,
        };
        self.record(
            PlannedMutation::InsertRoot {
                root_id: root_id.clone(),
                node_count: subtree.node_count(),
            },
            !self.config.dry_run,
        );
        Ok(root_id)
    }

    /// Attach `subtree` relative to `anchor_id`. Returns its root id.
    pub async fn insert_adjacent(
        &mut self,
        anchor_id: &str,
        position: InsertPosition,
        subtree: &TreeNode,
    ) -> Result<NodeId> {
        if !is_well_formed(anchor_id) {
            return Err(TreeError::InvalidInput(format!("malformed anchor id {anchor_id:?}")));
        }
        let anchor = self
            .lookup(anchor_id)
            .await?
            .ok_or_else(|| TreeError::AnchorNotFound(anchor_id.to_string()))?;

        if position.is_child_insertion() {
            if let Some(containers) = &self.config.container_types {
                if !anchor.is_container(containers) {
                    return Err(TreeError::InvalidPosition(format!(
                        "{position} under {anchor_id}: {} does not take children",
                        anchor.component_type
                    )));
                }
            }
        }

        self.check_subtree(subtree).await?;

        let root_id = match &mut self.rehearsal {
            Some(rehearsal) => {
                let placement = if position.is_child_insertion() {
                    Placement::ChildOf(anchor_id.to_string())
                } else {
                    rehearsal.placement_beside(anchor_id)
                };
                if matches!(placement, Placement::Root) {
                    return Err(TreeError::InvalidPosition(format!(
                        "{position} of {anchor_id}: a root has no siblings"
                    )));
                }
                rehearsal.plan(subtree, placement);
                subtree.id.clone()
            }
            None => {
                self.store
                    .insert_adjacent(anchor_id, position, subtree)
                    .await?
            }
        };
        self.record(
            PlannedMutation::InsertAdjacent {
                anchor_id: anchor_id.to_string(),
                position,
                root_id: root_id.clone(),
                node_count: subtree.node_count(),
            },
            !self.config.dry_run,
        );
        Ok(root_id)
    }

    /// Replace the property maps / visibility named in `patch`.
    pub async fn patch(&mut self, node_id: &str, patch: NodePatch) -> Result<()> {
        let current = self.require_node(node_id).await?;
        self.write_patch(node_id, current, &patch).await?;
        self.record(
            PlannedMutation::Patch {
                node_id: node_id.to_string(),
                patch,
            },
            !self.config.dry_run,
        );
        Ok(())
    }

    /// Read-then-write variant of [`Self::patch`]: supplied properties are
    /// shallow-merged onto the current maps instead of replacing them.
    pub async fn merge_patch(&mut self, node_id: &str, patch: NodePatch) -> Result<()> {
        let current = self.require_node(node_id).await?;
        let merged = patch.merged_onto(&current);
        self.write_patch(node_id, current, &merged).await?;
        self.record(
            PlannedMutation::Patch {
                node_id: node_id.to_string(),
                patch: merged,
            },
            !self.config.dry_run,
        );
        Ok(())
    }

    /// Remove `node_id` and its subtree. Removing an absent node succeeds.
    pub async fn remove(&mut self, node_id: &str) -> Result<()> {
        if !is_well_formed(node_id) {
            return Err(TreeError::InvalidInput(format!("malformed node id {node_id:?}")));
        }
        let existed = self.lookup(node_id).await?.is_some();
        if !existed {
            tracing::debug!(target: "uitree.mutation", node_id, "remove: already absent");
        } else if self.rehearsal.is_some() {
            let store_ids = self.rehearsed_store_subtree(node_id).await?;
            if let Some(rehearsal) = &mut self.rehearsal {
                rehearsal.unplan(node_id, store_ids);
            }
        } else {
            self.store.remove_node(node_id).await?;
        }
        let applied = existed && !self.config.dry_run;
        self.record(
            PlannedMutation::Remove {
                node_id: node_id.to_string(),
                existed,
            },
            applied,
        );
        Ok(())
    }

    // ── Routes ──────────────────────────────────────────────────

    /// Create a route. Rehearsed routes get negative placeholder ids.
    pub async fn create_route(&mut self, fields: NewRoute) -> Result<RouteId> {
        let route_id = if self.config.dry_run {
            self.placeholder_routes -= 1;
            self.placeholder_routes
        } else {
            self.store.create_route(&fields).await?
        };
        self.record(
            PlannedMutation::CreateRoute { route_id, fields },
            !self.config.dry_run,
        );
        Ok(route_id)
    }

    pub async fn update_route(&mut self, route_id: RouteId, fields: RouteUpdate) -> Result<()> {
        if !self.config.dry_run {
            self.store.update_route(route_id, &fields).await?;
        }
        self.record(
            PlannedMutation::UpdateRoute { route_id, fields },
            !self.config.dry_run,
        );
        Ok(())
    }

    pub async fn destroy_route(&mut self, route_id: RouteId) -> Result<()> {
        if !self.config.dry_run {
            self.store.destroy_route(route_id).await?;
        }
        self.record(PlannedMutation::DestroyRoute { route_id }, !self.config.dry_run);
        Ok(())
    }

    async fn write_patch(&mut self, node_id: &str, mut current: TreeNode, patch: &NodePatch) -> Result<()> {
        match &mut self.rehearsal {
            Some(rehearsal) => {
                patch.apply_to(&mut current);
                rehearsal.edit(current);
                Ok(())
            }
            None => self.store.patch_node(node_id, patch).await,
        }
    }

    // ── Preconditions ───────────────────────────────────────────

    /// The node as the store holds it, or would hold it after the rehearsed
    /// calls so far.
    async fn lookup(&self, node_id: &str) -> Result<Option<TreeNode>> {
        if let Some(known) = self.rehearsal.as_ref().and_then(|r| r.lookup(node_id)) {
            return Ok(known);
        }
        self.store.get_node(node_id).await
    }

    /// Store ids under a node removed while rehearsing; empty for planned
    /// nodes.
    async fn rehearsed_store_subtree(&self, node_id: &str) -> Result<Vec<NodeId>> {
        let planned = self
            .rehearsal
            .as_ref()
            .is_some_and(|r| r.planned.contains_key(node_id));
        if planned {
            return Ok(Vec::new());
        }
        Ok(self
            .store
            .get_subtree(node_id)
            .await?
            .map(|tree| tree.ids().into_iter().map(str::to_string).collect())
            .unwrap_or_default())
    }

    async fn require_node(&self, node_id: &str) -> Result<TreeNode> {
        if !is_well_formed(node_id) {
            return Err(TreeError::InvalidInput(format!("malformed node id {node_id:?}")));
        }
        self.lookup(node_id)
            .await?
            .ok_or_else(|| TreeError::NodeNotFound(node_id.to_string()))
    }

    /// Ids must be well-formed, unique inside the subtree and unused in the
    /// store. The store is asked once for the whole id set.
    async fn check_subtree(&self, subtree: &TreeNode) -> Result<()> {
        let ids = subtree.ids();
        if let Some(bad) = ids.iter().find(|id| !is_well_formed(id)) {
            return Err(TreeError::InvalidInput(format!("malformed node id {bad:?}")));
        }
        if let Some(dup) = subtree.duplicate_ids().into_iter().next() {
            return Err(TreeError::DuplicateId(dup));
        }
        let in_store: HashSet<NodeId> = self.store.existing_ids(&ids).await?.into_iter().collect();
        let taken = ids.into_iter().find(|id| {
            match self.rehearsal.as_ref().and_then(|r| r.lookup(id)) {
                Some(known) => known.is_some(),
                None => in_store.contains(*id),
            }
        });
        match taken {
            Some(id) => Err(TreeError::DuplicateId(id.to_string())),
            None => Ok(()),
        }
    }
}
