//! Id-indexed node arena.
//!
//! Nodes are stored flat, keyed by id. Parent and child links are plain ids,
//! so there are no ownership cycles and upward traversal is a map lookup.
//! Nested [`TreeNode`] values are only materialised on demand by
//! [`NodeArena::subtree`].

use std::collections::{HashMap, HashSet};

use crate::error::{Result, TreeError};
use crate::ids::NodeId;
use crate::node::TreeNode;
use crate::patch::NodePatch;
use crate::position::InsertPosition;

#[derive(Debug, Clone)]
pub struct NodeRecord {
    /// The node itself, always without children.
    pub node: TreeNode,
    pub parent: Option<NodeId>,
    /// Local key under the parent.
    pub key: String,
    /// Child ids in rendering order.
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    records: HashMap<NodeId, NodeRecord>,
    roots: Vec<NodeId>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// The node without children.
    pub fn get(&self, id: &str) -> Option<&TreeNode> {
        self.records.get(id).map(|r| &r.node)
    }

    pub fn record(&self, id: &str) -> Option<&NodeRecord> {
        self.records.get(id)
    }

    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.records.get(id)?.parent.as_deref()
    }

    pub fn children_of(&self, id: &str) -> Option<&[NodeId]> {
        self.records.get(id).map(|r| r.children.as_slice())
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Ancestor ids, nearest first. Empty for roots and unknown ids.
    pub fn ancestors(&self, id: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.parent_of(id);
        while let Some(parent) = cursor {
            out.push(parent.to_string());
            cursor = self.parent_of(parent);
        }
        out
    }

    /// Rebuild the nested subtree rooted at `id`.
    pub fn subtree(&self, id: &str) -> Option<TreeNode> {
        let record = self.records.get(id)?;
        let mut node = record.node.clone();
        for child_id in &record.children {
            if let (Some(child_record), Some(child)) =
                (self.records.get(child_id), self.subtree(child_id))
            {
                node.children.push((child_record.key.clone(), child));
            }
        }
        Some(node)
    }

    /// Every record, roots in creation order, each tree in document order.
    pub fn document_order(&self) -> Vec<&NodeRecord> {
        let mut out = Vec::with_capacity(self.records.len());
        let mut stack: Vec<&NodeId> = self.roots.iter().rev().collect();
        while let Some(id) = stack.pop() {
            if let Some(record) = self.records.get(id) {
                out.push(record);
                stack.extend(record.children.iter().rev());
            }
        }
        out
    }

    /// Attach `subtree` as a new detached root.
    pub fn insert_root(&mut self, subtree: &TreeNode) -> Result<NodeId> {
        self.check_insertable(subtree)?;
        self.attach(subtree, None, subtree.local_key());
        self.roots.push(subtree.id.clone());
        Ok(subtree.id.clone())
    }

    /// Attach `subtree` relative to `anchor_id`. Returns the subtree root id.
    pub fn insert_adjacent(
        &mut self,
        anchor_id: &str,
        position: InsertPosition,
        subtree: &TreeNode,
    ) -> Result<NodeId> {
        let anchor = self
            .records
            .get(anchor_id)
            .ok_or_else(|| TreeError::AnchorNotFound(anchor_id.to_string()))?;

        let (parent_id, index) = if position.is_child_insertion() {
            let index = match position {
                InsertPosition::BeforeFirstChild => 0,
                _ => anchor.children.len(),
            };
            (anchor_id.to_string(), index)
        } else {
            let parent_id = anchor.parent.clone().ok_or_else(|| {
                TreeError::InvalidPosition(format!(
                    "{position} requires a parent, but {anchor_id} is a root"
                ))
            })?;
            let at = self
                .children_of(&parent_id)
                .and_then(|siblings| siblings.iter().position(|c| c == anchor_id))
                .ok_or_else(|| {
                    TreeError::Internal(anyhow::anyhow!(
                        "{anchor_id} missing from the child list of {parent_id}"
                    ))
                })?;
            let index = match position {
                InsertPosition::BeforeAnchor => at,
                _ => at + 1,
            };
            (parent_id, index)
        };

        self.check_insertable(subtree)?;
        let key = self.free_key(&parent_id, subtree.local_key(), &subtree.id);
        self.attach(subtree, Some(parent_id.clone()), key);
        if let Some(parent) = self.records.get_mut(&parent_id) {
            parent.children.insert(index, subtree.id.clone());
        }
        Ok(subtree.id.clone())
    }

    pub fn patch(&mut self, id: &str, patch: &NodePatch) -> Result<()> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))?;
        patch.apply_to(&mut record.node);
        Ok(())
    }

    /// Remove `id` and every descendant. Returns the removed ids; empty when
    /// `id` was already absent.
    pub fn remove(&mut self, id: &str) -> Vec<NodeId> {
        let Some(parent) = self.records.get(id).map(|r| r.parent.clone()) else {
            return Vec::new();
        };

        let mut removed = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(next) = stack.pop() {
            if let Some(record) = self.records.remove(&next) {
                stack.extend(record.children.into_iter().rev());
                removed.push(next);
            }
        }

        match parent {
            Some(parent_id) => {
                if let Some(parent) = self.records.get_mut(&parent_id) {
                    parent.children.retain(|c| c != id);
                }
            }
            None => self.roots.retain(|r| r != id),
        }
        removed
    }

    fn check_insertable(&self, subtree: &TreeNode) -> Result<()> {
        let mut seen = HashSet::new();
        for id in subtree.ids() {
            if !seen.insert(id) || self.records.contains_key(id) {
                return Err(TreeError::DuplicateId(id.to_string()));
            }
        }
        Ok(())
    }

    /// `wanted` unless a sibling already uses it, then `fallback` (an id,
    /// unique by construction).
    fn free_key(&self, parent_id: &str, wanted: String, fallback: &str) -> String {
        let taken = self
            .children_of(parent_id)
            .unwrap_or_default()
            .iter()
            .filter_map(|c| self.records.get(c))
            .any(|r| r.key == wanted);
        if taken {
            fallback.to_string()
        } else {
            wanted
        }
    }

    fn attach(&mut self, node: &TreeNode, parent: Option<NodeId>, key: String) {
        let record = NodeRecord {
            node: node.shallow(),
            parent,
            key,
            children: node.children.iter().map(|(_, c)| c.id.clone()).collect(),
        };
        self.records.insert(node.id.clone(), record);
        for (child_key, child) in &node.children {
            self.attach(child, Some(node.id.clone()), child_key.clone());
        }
    }
}
