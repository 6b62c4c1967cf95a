//! Closure-table index over the tree (`uiSchemaTreePath`).
//!
//! One entry per (ancestor, descendant) pair, including the `depth = 0`
//! self entry of every node, so lineage and depth queries never walk the tree.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::ids::NodeId;
use crate::node::TreeNode;
use crate::snapshot::Row;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreePathEntry {
    pub ancestor_id: NodeId,
    pub descendant_id: NodeId,
    pub depth: u32,
}

impl TreePathEntry {
    /// Row shape of the `uiSchemaTreePath` table.
    pub fn to_row(&self) -> Row {
        match json!({
            "ancestor": self.ancestor_id,
            "descendant": self.descendant_id,
            "depth": self.depth,
        }) {
            Value::Object(row) => row,
            _ => Row::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TreePathIndex {
    /// descendant → (ancestor → depth), self entry included.
    by_descendant: BTreeMap<NodeId, BTreeMap<NodeId, u32>>,
}

impl TreePathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries (pairs), self entries included.
    pub fn len(&self) -> usize {
        self.by_descendant.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_descendant.is_empty()
    }

    /// Index a newly attached subtree.
    ///
    /// `lineage` lists the ancestors of the subtree root, nearest first
    /// (empty for a new root).
    pub fn insert_subtree(&mut self, lineage: &[NodeId], subtree: &TreeNode) {
        // root-first chain of everything above the node being visited
        let mut chain: Vec<NodeId> = lineage.iter().rev().cloned().collect();
        self.index_node(&mut chain, subtree);
    }

    fn index_node(&mut self, chain: &mut Vec<NodeId>, node: &TreeNode) {
        let entry = self.by_descendant.entry(node.id.clone()).or_default();
        entry.insert(node.id.clone(), 0);
        let above = chain.len();
        for (i, ancestor) in chain.iter().enumerate() {
            entry.insert(ancestor.clone(), (above - i) as u32);
        }
        chain.push(node.id.clone());
        for (_, child) in &node.children {
            self.index_node(chain, child);
        }
        chain.pop();
    }

    /// Drop every entry whose descendant is in `removed`.
    pub fn remove_descendants<'a, I>(&mut self, removed: I) -> usize
    where
        I: IntoIterator<Item = &'a NodeId>,
    {
        let mut dropped = 0;
        for id in removed {
            if let Some(ancestors) = self.by_descendant.remove(id) {
                dropped += ancestors.len();
            }
        }
        dropped
    }

    /// Ancestors of `id`, nearest first, self excluded.
    pub fn ancestors(&self, id: &str) -> Vec<NodeId> {
        let Some(ancestors) = self.by_descendant.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<(&NodeId, u32)> = ancestors
            .iter()
            .filter(|(_, depth)| **depth > 0)
            .map(|(a, d)| (a, *d))
            .collect();
        out.sort_by_key(|(_, d)| *d);
        out.into_iter().map(|(a, _)| a.clone()).collect()
    }

    /// Descendants of `id`, shallowest first, self excluded.
    pub fn descendants(&self, id: &str) -> Vec<NodeId> {
        let mut out: Vec<(&NodeId, u32)> = self
            .by_descendant
            .iter()
            .filter_map(|(desc, ancestors)| match ancestors.get(id) {
                Some(depth) if *depth > 0 => Some((desc, *depth)),
                _ => None,
            })
            .collect();
        out.sort_by_key(|(_, d)| *d);
        out.into_iter().map(|(d, _)| d.clone()).collect()
    }

    pub fn depth_between(&self, ancestor: &str, descendant: &str) -> Option<u32> {
        self.by_descendant.get(descendant)?.get(ancestor).copied()
    }

    /// Distance from `id` to its root.
    pub fn depth_of(&self, id: &str) -> Option<u32> {
        self.by_descendant
            .get(id)
            .map(|ancestors| ancestors.values().copied().max().unwrap_or(0))
    }

    /// Whether any entry mentions `id` on either side.
    pub fn references(&self, id: &str) -> bool {
        self.by_descendant.contains_key(id)
            || self
                .by_descendant
                .values()
                .any(|ancestors| ancestors.contains_key(id))
    }

    pub fn entries(&self) -> Vec<TreePathEntry> {
        self.by_descendant
            .iter()
            .flat_map(|(desc, ancestors)| {
                ancestors.iter().map(move |(anc, depth)| TreePathEntry {
                    ancestor_id: anc.clone(),
                    descendant_id: desc.clone(),
                    depth: *depth,
                })
            })
            .collect()
    }

    pub fn rows(&self) -> Vec<Row> {
        self.entries().iter().map(TreePathEntry::to_row).collect()
    }

    /// Ids that appear as a descendant, i.e. every indexed node.
    pub fn indexed_ids(&self) -> HashSet<&str> {
        self.by_descendant.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tree() -> TreeNode {
        TreeNode::with_id("g", "Grid").child(
            "r",
            TreeNode::with_id("r", "Grid.Row").child("c", TreeNode::with_id("c", "Grid.Col")),
        )
    }

    #[test]
    fn test_root_insert_entries() {
        let mut idx = TreePathIndex::new();
        idx.insert_subtree(&[], &tree());
        // g:1 + r:2 + c:3
        assert_eq!(idx.len(), 6);
        assert_eq!(idx.depth_between("g", "c"), Some(2));
        assert_eq!(idx.depth_between("c", "c"), Some(0));
        assert_eq!(idx.depth_between("c", "g"), None);
    }

    #[test]
    fn test_insert_under_existing_lineage() {
        let mut idx = TreePathIndex::new();
        idx.insert_subtree(&[], &tree());
        let block = TreeNode::with_id("b", "CardItem").child("t", TreeNode::with_id("t", "TableV2"));
        idx.insert_subtree(&["c".into(), "r".into(), "g".into()], &block);

        assert_eq!(idx.ancestors("t"), vec!["b", "c", "r", "g"]);
        assert_eq!(idx.depth_of("t"), Some(4));
        assert_eq!(idx.descendants("r"), vec!["c", "b", "t"]);
    }

    #[test]
    fn test_remove_descendants_leaves_no_reference() {
        let mut idx = TreePathIndex::new();
        idx.insert_subtree(&[], &tree());
        let removed: Vec<NodeId> = vec!["r".into(), "c".into()];
        let dropped = idx.remove_descendants(&removed);
        assert_eq!(dropped, 5);
        assert!(!idx.references("r"));
        assert!(!idx.references("c"));
        assert_eq!(idx.entries().len(), 1);
    }

    #[test]
    fn test_rows_shape() {
        let mut idx = TreePathIndex::new();
        idx.insert_subtree(&[], &TreeNode::with_id("solo", "Page"));
        let rows = idx.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("ancestor"), Some(&json!("solo")));
        assert_eq!(rows[0].get("depth"), Some(&json!(0)));
    }
}
