//! Partial node updates.
//!
//! A [`NodePatch`] names the keys to overwrite. A present key replaces the
//! previous value wholesale: `component_props: Some(x)` drops every property
//! not in `x`. [`NodePatch::merged_onto`] builds the read-then-write variant
//! that keeps untouched properties.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node::{Props, TreeNode, X_COMPONENT_PROPS, X_DECORATOR_PROPS, X_HIDDEN, X_UID};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_props: Option<Props>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decorator_props: Option<Props>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

impl NodePatch {
    pub fn component_props(props: Props) -> Self {
        Self {
            component_props: Some(props),
            ..Self::default()
        }
    }

    pub fn decorator_props(props: Props) -> Self {
        Self {
            decorator_props: Some(props),
            ..Self::default()
        }
    }

    pub fn visible(visible: bool) -> Self {
        Self {
            visible: Some(visible),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.component_props.is_none() && self.decorator_props.is_none() && self.visible.is_none()
    }

    /// Apply with replace semantics. Never touches id, types or children.
    pub fn apply_to(&self, node: &mut TreeNode) {
        if let Some(props) = &self.component_props {
            node.component_props = props.clone();
        }
        if let Some(props) = &self.decorator_props {
            node.decorator_props = props.clone();
        }
        if let Some(visible) = self.visible {
            node.visible = visible;
        }
    }

    /// Replace-semantics patch equivalent to shallow-merging `self` onto the
    /// current state of `node`.
    pub fn merged_onto(&self, node: &TreeNode) -> NodePatch {
        let merge = |current: &Props, update: &Option<Props>| {
            update.as_ref().map(|update| {
                let mut merged = current.clone();
                for (k, v) in update {
                    merged.insert(k.clone(), v.clone());
                }
                merged
            })
        };
        NodePatch {
            component_props: merge(&node.component_props, &self.component_props),
            decorator_props: merge(&node.decorator_props, &self.decorator_props),
            visible: self.visible,
        }
    }

    /// Wire body for the remote `patch` call.
    pub fn to_schema_patch(&self, node_id: &str) -> Value {
        let mut body = Props::new();
        body.insert(X_UID.into(), Value::String(node_id.to_string()));
        if let Some(props) = &self.component_props {
            body.insert(X_COMPONENT_PROPS.into(), Value::Object(props.clone()));
        }
        if let Some(props) = &self.decorator_props {
            body.insert(X_DECORATOR_PROPS.into(), Value::Object(props.clone()));
        }
        if let Some(visible) = self.visible {
            body.insert(X_HIDDEN.into(), Value::Bool(!visible));
        }
        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::props;
    use serde_json::json;

    fn node() -> TreeNode {
        TreeNode::with_id("n1", "CardItem")
            .component_props(props([("title", json!("Old")), ("bordered", json!(true))]))
            .child("inner", TreeNode::with_id("n2", "TableV2"))
    }

    #[test]
    fn test_apply_replaces_whole_map() {
        let mut n = node();
        NodePatch::component_props(props([("title", json!("New"))])).apply_to(&mut n);
        assert_eq!(n.component_props, props([("title", json!("New"))]));
        assert_eq!(n.child_count(), 1);
        assert_eq!(n.component_type, "CardItem");
    }

    #[test]
    fn test_merged_onto_keeps_untouched_keys() {
        let n = node();
        let merged = NodePatch::component_props(props([("title", json!("New"))])).merged_onto(&n);
        assert_eq!(
            merged.component_props,
            Some(props([("title", json!("New")), ("bordered", json!(true))]))
        );
        assert_eq!(merged.decorator_props, None);
    }

    #[test]
    fn test_schema_patch_body() {
        let body = NodePatch::visible(false).to_schema_patch("n1");
        assert_eq!(body, json!({ "x-uid": "n1", "x-hidden": true }));
    }

    #[test]
    fn test_empty() {
        assert!(NodePatch::default().is_empty());
        assert!(!NodePatch::visible(true).is_empty());
    }
}
