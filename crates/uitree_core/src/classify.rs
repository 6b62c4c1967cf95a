//! Block classification.
//!
//! A block is the top-level semantic unit of a page (table, form, chart, ...).
//! Blocks are recognised by a closed set of signatures, tested in a fixed
//! priority order. Once a node matches, the walk does not descend into it:
//! a block nested inside another block is part of the outer one.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TreeError};
use crate::ids::NodeId;
use crate::node::TreeNode;
use crate::ports::RemoteTreeStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Table,
    Form,
    Details,
    Calendar,
    Chart,
    Markdown,
    Kanban,
    List,
    Map,
}

impl BlockKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Form => "form",
            Self::Details => "details",
            Self::Calendar => "calendar",
            Self::Chart => "chart",
            Self::Markdown => "markdown",
            Self::Kanban => "kanban",
            Self::List => "list",
            Self::Map => "map",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Signature {
    Decorator(&'static str),
    Component(&'static str),
}

/// Priority order; the first matching row wins.
const SIGNATURES: &[(BlockKind, Signature)] = &[
    (BlockKind::Table, Signature::Decorator("TableBlockProvider")),
    (BlockKind::Form, Signature::Decorator("FormBlockProvider")),
    (BlockKind::Details, Signature::Decorator("DetailsBlockProvider")),
    (BlockKind::Calendar, Signature::Decorator("CalendarBlockProvider")),
    (BlockKind::Chart, Signature::Decorator("ChartBlockProvider")),
    (BlockKind::Chart, Signature::Decorator("ChartV2Block")),
    (BlockKind::Chart, Signature::Decorator("ChartRendererProvider")),
    // markdown blocks carry a generic decorator (BlockItem)
    (BlockKind::Markdown, Signature::Component("Markdown.Void")),
    (BlockKind::Kanban, Signature::Decorator("KanbanBlockProvider")),
    (BlockKind::List, Signature::Decorator("ListBlockProvider")),
    (BlockKind::Map, Signature::Decorator("MapBlockProvider")),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDescriptor {
    pub kind: BlockKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_collection: Option<String>,
    pub subtree_root_id: NodeId,
}

/// Kind of `node` if it is itself a block.
pub fn classify_node(node: &TreeNode) -> Option<BlockKind> {
    SIGNATURES
        .iter()
        .find(|(_, sig)| match sig {
            Signature::Decorator(d) => node.decorator_type.as_deref() == Some(*d),
            Signature::Component(c) => node.component_type == *c,
        })
        .map(|(kind, _)| *kind)
}

/// Top-level blocks under `root` (root included), in document order.
pub fn classify_blocks(root: &TreeNode) -> Vec<BlockDescriptor> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if let Some(kind) = classify_node(node) {
            out.push(BlockDescriptor {
                kind,
                bound_collection: node.bound_collection().map(str::to_string),
                subtree_root_id: node.id.clone(),
            });
            continue;
        }
        for (_, child) in node.children.iter().rev() {
            stack.push(child);
        }
    }
    out
}

/// [`classify_blocks`] over the stored subtree at `root_id`.
pub async fn classify_blocks_in(
    store: &dyn RemoteTreeStore,
    root_id: &str,
) -> Result<Vec<BlockDescriptor>> {
    let root = store
        .get_subtree(root_id)
        .await?
        .ok_or_else(|| TreeError::NodeNotFound(root_id.to_string()))?;
    Ok(classify_blocks(&root))
}

/// Distinct collections bound by the blocks.
pub fn bound_collections(blocks: &[BlockDescriptor]) -> BTreeSet<&str> {
    blocks
        .iter()
        .filter_map(|b| b.bound_collection.as_deref())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{grid_row, markdown_block, table_block, TableBlockOptions};
    use crate::node::props;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_nested_block_is_not_reported() {
        let inner = TreeNode::with_id("inner", "CardItem")
            .decorated("FormBlockProvider", props([("collection", json!("b"))]));
        let outer = TreeNode::with_id("outer", "CardItem")
            .decorated("TableBlockProvider", props([("collection", json!("a"))]))
            .child("g", TreeNode::with_id("g", "Grid").child("i", inner));
        let root = TreeNode::with_id("root", "Grid").child("o", outer);

        assert_eq!(
            classify_blocks(&root),
            vec![BlockDescriptor {
                kind: BlockKind::Table,
                bound_collection: Some("a".into()),
                subtree_root_id: "outer".into(),
            }]
        );
    }

    #[test]
    fn test_document_order_and_missing_binding() {
        let root = TreeNode::with_id("root", "Grid")
            .child("r1", grid_row(vec![markdown_block("hi")]))
            .child(
                "r2",
                grid_row(vec![table_block(&TableBlockOptions::new("patients", "P", ["name"]))]),
            );
        let blocks = classify_blocks(&root);
        let kinds: Vec<BlockKind> = blocks.iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![BlockKind::Markdown, BlockKind::Table]);
        assert_eq!(blocks[0].bound_collection, None);
        assert_eq!(bound_collections(&blocks).into_iter().collect::<Vec<_>>(), vec!["patients"]);
    }

    #[test]
    fn test_no_blocks_is_empty() {
        let root = TreeNode::new("Grid").child("r", TreeNode::new("Grid.Row"));
        assert!(classify_blocks(&root).is_empty());
    }

    #[test]
    fn test_priority_order() {
        // a component signature never outranks an earlier decorator one
        let node = TreeNode::new("Markdown.Void").decorated("TableBlockProvider", Default::default());
        assert_eq!(classify_node(&node), Some(BlockKind::Table));
        let chart = TreeNode::new("CardItem").decorated("ChartV2Block", Default::default());
        assert_eq!(classify_node(&chart), Some(BlockKind::Chart));
        let map = TreeNode::new("CardItem").decorated("MapBlockProvider", Default::default());
        assert_eq!(classify_node(&map).map(BlockKind::as_str), Some("map"));
    }
}
