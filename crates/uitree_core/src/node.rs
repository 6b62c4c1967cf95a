//! Tree node model.
//!
//! A [`TreeNode`] owns its children outright; the parent link only exists in
//! the arena (see [`crate::arena`]) as a plain id. Property bags are opaque
//! JSON maps and are never interpreted here, except for
//! `decoratorProps.collection`, the node's data binding.
//!
//! Nodes convert to and from the NocoBase JSON-schema shape
//! (`x-uid`, `x-component`, `properties`, ...) with [`TreeNode::to_schema`]
//! and [`TreeNode::from_schema`]. Keys the model does not know about are kept
//! in `extra` and written back unchanged.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TreeError};
use crate::ids::{is_well_formed, new_id, NodeId};

/// Opaque string-keyed property bag.
pub type Props = Map<String, Value>;

pub const X_UID: &str = "x-uid";
pub const X_COMPONENT: &str = "x-component";
pub const X_DECORATOR: &str = "x-decorator";
pub const X_COMPONENT_PROPS: &str = "x-component-props";
pub const X_DECORATOR_PROPS: &str = "x-decorator-props";
pub const X_HIDDEN: &str = "x-hidden";
pub const PROPERTIES: &str = "properties";
pub const NAME: &str = "name";

/// Component types that accept child insertions by default.
pub const DEFAULT_CONTAINER_TYPES: &[&str] = &[
    "container",
    "Page",
    "Grid",
    "Grid.Row",
    "Grid.Col",
    "Tabs",
    "Tabs.TabPane",
    "CardItem",
    "BlockItem",
    "ActionBar",
    "Action",
    "Action.Container",
    "TableV2",
    "TableV2.Column",
    "FormV2",
    "Details",
    "List",
    "List.Item",
    "GridCard",
    "GridCard.Item",
    "Space",
    "Menu",
    "Menu.SubMenu",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: NodeId,
    pub component_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decorator_type: Option<String>,
    #[serde(default)]
    pub component_props: Props,
    #[serde(default)]
    pub decorator_props: Props,
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Schema keys outside the model (`type`, `title`, `x-initializer`, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Props,
    /// Ordered children keyed by their local name; order drives rendering.
    #[serde(default)]
    pub children: Vec<(String, TreeNode)>,
}

fn default_visible() -> bool {
    true
}

impl TreeNode {
    /// New node with a freshly generated id.
    pub fn new(component_type: impl Into<String>) -> Self {
        Self::with_id(new_id(), component_type)
    }

    pub fn with_id(id: impl Into<NodeId>, component_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            component_type: component_type.into(),
            decorator_type: None,
            component_props: Props::new(),
            decorator_props: Props::new(),
            visible: true,
            extra: Props::new(),
            children: Vec::new(),
        }
    }

    pub fn decorated(mut self, decorator_type: impl Into<String>, props: Props) -> Self {
        self.decorator_type = Some(decorator_type.into());
        self.decorator_props = props;
        self
    }

    pub fn component_props(mut self, props: Props) -> Self {
        self.component_props = props;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Append a child under `key`. A key already present is replaced in place,
    /// keeping its position.
    pub fn child(mut self, key: impl Into<String>, child: TreeNode) -> Self {
        self.push_child(key, child);
        self
    }

    pub fn push_child(&mut self, key: impl Into<String>, child: TreeNode) {
        let key = key.into();
        match self.children.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = child,
            None => self.children.push((key, child)),
        }
    }

    pub fn get_child(&self, key: &str) -> Option<&TreeNode> {
        self.children
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, c)| c)
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Local key the node takes when attached without an explicit one:
    /// its schema `name`, else its id.
    pub fn local_key(&self) -> String {
        self.extra
            .get(NAME)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.id.clone())
    }

    /// `decoratorProps.collection`, when present and a string.
    pub fn bound_collection(&self) -> Option<&str> {
        self.decorator_props.get("collection").and_then(Value::as_str)
    }

    pub fn is_container<S: AsRef<str>>(&self, container_types: &[S]) -> bool {
        container_types
            .iter()
            .any(|t| t.as_ref() == self.component_type)
    }

    /// Copy of this node without its children.
    pub fn shallow(&self) -> TreeNode {
        TreeNode {
            children: Vec::new(),
            ..self.clone()
        }
    }

    /// Nodes of the subtree in document (pre-order) order, root first.
    pub fn pre_order(&self) -> Vec<&TreeNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            for (_, child) in node.children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Every id in the subtree, document order.
    pub fn ids(&self) -> Vec<&str> {
        self.pre_order().into_iter().map(|n| n.id.as_str()).collect()
    }

    pub fn node_count(&self) -> usize {
        self.pre_order().len()
    }

    /// Ids that occur more than once inside this subtree.
    pub fn duplicate_ids(&self) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut dups = Vec::new();
        for id in self.ids() {
            if !seen.insert(id) && !dups.iter().any(|d: &NodeId| d == id) {
                dups.push(id.to_string());
            }
        }
        dups
    }

    /// Deep clone giving every node of the subtree a fresh id.
    ///
    /// Children keyed by their old id are re-keyed to the new one so the
    /// key/id correspondence survives the clone.
    pub fn with_fresh_ids(&self) -> TreeNode {
        let mut copy = self.shallow();
        copy.id = new_id();
        if copy.extra.get(NAME).and_then(Value::as_str) == Some(self.id.as_str()) {
            copy.extra.insert(NAME.into(), Value::String(copy.id.clone()));
        }
        for (key, child) in &self.children {
            let fresh = child.with_fresh_ids();
            let key = if *key == child.id {
                fresh.id.clone()
            } else {
                key.clone()
            };
            copy.children.push((key, fresh));
        }
        copy
    }

    /// Schema JSON for this node and its whole subtree.
    pub fn to_schema(&self) -> Value {
        let mut obj = self.shallow_schema();
        if !self.children.is_empty() {
            let props: Map<String, Value> = self
                .children
                .iter()
                .map(|(key, child)| (key.clone(), child.to_schema()))
                .collect();
            obj.insert(PROPERTIES.into(), Value::Object(props));
        }
        Value::Object(obj)
    }

    /// Schema JSON for this node alone (no `properties`).
    pub fn shallow_schema(&self) -> Props {
        let mut obj = self.extra.clone();
        obj.insert(X_UID.into(), Value::String(self.id.clone()));
        if !self.component_type.is_empty() {
            obj.insert(X_COMPONENT.into(), Value::String(self.component_type.clone()));
        }
        if let Some(decorator) = &self.decorator_type {
            obj.insert(X_DECORATOR.into(), Value::String(decorator.clone()));
        }
        if !self.component_props.is_empty() {
            obj.insert(
                X_COMPONENT_PROPS.into(),
                Value::Object(self.component_props.clone()),
            );
        }
        if !self.decorator_props.is_empty() {
            obj.insert(
                X_DECORATOR_PROPS.into(),
                Value::Object(self.decorator_props.clone()),
            );
        }
        if !self.visible {
            obj.insert(X_HIDDEN.into(), Value::Bool(true));
        }
        obj
    }

    /// Parse a schema JSON subtree. Nodes without `x-uid` get a fresh id.
    pub fn from_schema(value: &Value) -> Result<TreeNode> {
        let obj = value
            .as_object()
            .ok_or_else(|| TreeError::InvalidInput("schema node must be a JSON object".into()))?;

        let id = match obj.get(X_UID) {
            None | Some(Value::Null) => new_id(),
            Some(Value::String(s)) if is_well_formed(s) => s.clone(),
            Some(other) => {
                return Err(TreeError::InvalidInput(format!("malformed x-uid: {other}")))
            }
        };

        let mut node = TreeNode::with_id(id, string_field(obj, X_COMPONENT)?.unwrap_or_default());
        node.decorator_type = string_field(obj, X_DECORATOR)?;
        node.component_props = map_field(obj, X_COMPONENT_PROPS)?;
        node.decorator_props = map_field(obj, X_DECORATOR_PROPS)?;
        node.visible = !obj.get(X_HIDDEN).and_then(Value::as_bool).unwrap_or(false);

        match obj.get(PROPERTIES) {
            None | Some(Value::Null) => {}
            Some(Value::Object(props)) => {
                for (key, child) in props {
                    node.children.push((key.clone(), TreeNode::from_schema(child)?));
                }
            }
            Some(_) => {
                return Err(TreeError::InvalidInput(format!(
                    "node {}: properties must be an object",
                    node.id
                )))
            }
        }

        for (key, value) in obj {
            if !is_model_key(key) {
                node.extra.insert(key.clone(), value.clone());
            }
        }
        Ok(node)
    }
}

fn is_model_key(key: &str) -> bool {
    matches!(
        key,
        X_UID | X_COMPONENT | X_DECORATOR | X_COMPONENT_PROPS | X_DECORATOR_PROPS | X_HIDDEN | PROPERTIES
    )
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(TreeError::InvalidInput(format!(
            "{key} must be a string, got {other}"
        ))),
    }
}

fn map_field(obj: &Map<String, Value>, key: &str) -> Result<Props> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(Props::new()),
        Some(Value::Object(m)) => Ok(m.clone()),
        Some(other) => Err(TreeError::InvalidInput(format!(
            "{key} must be an object, got {other}"
        ))),
    }
}

/// Convenience for building property bags in code: `props([("title", "x".into())])`.
pub fn props<I, K>(entries: I) -> Props
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
