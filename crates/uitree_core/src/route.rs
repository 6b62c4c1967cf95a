//! Navigation routes (`desktopRoutes`).
//!
//! Routes form their own tree (self-referential `parentId`) and point into
//! the schema tree through `schemaUid` (content root) and `menuSchemaUid`
//! (menu entry). Those links are not maintained by the store; see
//! [`crate::consistency`].

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, TreeError};
use crate::ids::NodeId;
use crate::snapshot::Row;

pub type RouteId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RouteType {
    Group,
    Page,
    Tabs,
    /// Any route kind outside the three modelled ones (`link`, ...).
    Other(String),
}

impl RouteType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Group => "group",
            Self::Page => "page",
            Self::Tabs => "tabs",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for RouteType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "group" => Self::Group,
            "page" => Self::Page,
            "tabs" => Self::Tabs,
            _ => Self::Other(s),
        }
    }
}

impl From<RouteType> for String {
    fn from(t: RouteType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteNode {
    pub id: RouteId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub route_type: RouteType,
    #[serde(default)]
    pub parent_id: Option<RouteId>,
    /// Content root of the page (or tab).
    #[serde(rename = "schemaUid", default)]
    pub tree_root_id: Option<NodeId>,
    /// Menu entry node.
    #[serde(rename = "menuSchemaUid", default)]
    pub navigation_node_id: Option<NodeId>,
    #[serde(default)]
    pub tab_schema_name: Option<String>,
    #[serde(default)]
    pub hidden: bool,
}

impl RouteNode {
    /// Parse one `desktopRoutes` row. Extra columns are ignored.
    pub fn from_row(row: &Row) -> Result<Self> {
        serde_json::from_value(serde_json::Value::Object(row.clone()))
            .map_err(|e| TreeError::InvalidInput(format!("route row: {e}")))
    }

    pub fn to_row(&self) -> Row {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(row)) => row,
            _ => Row::new(),
        }
    }

    /// Build the stored route from creation fields.
    pub fn from_new(id: RouteId, fields: &NewRoute) -> Self {
        Self {
            id,
            title: fields.title.clone(),
            route_type: fields.route_type.clone(),
            parent_id: fields.parent_id,
            tree_root_id: fields.tree_root_id.clone(),
            navigation_node_id: fields.navigation_node_id.clone(),
            tab_schema_name: fields.tab_schema_name.clone(),
            hidden: fields.hidden,
        }
    }

    pub fn apply(&mut self, update: &RouteUpdate) {
        if let Some(title) = &update.title {
            self.title = Some(title.clone());
        }
        if let Some(parent_id) = update.parent_id {
            self.parent_id = parent_id;
        }
        if let Some(root) = &update.tree_root_id {
            self.tree_root_id = root.clone();
        }
        if let Some(nav) = &update.navigation_node_id {
            self.navigation_node_id = nav.clone();
        }
        if let Some(hidden) = update.hidden {
            self.hidden = hidden;
        }
    }
}

/// Fields of a route to be created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoute {
    #[serde(rename = "type")]
    pub route_type: RouteType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub parent_id: Option<RouteId>,
    #[serde(rename = "schemaUid", default, skip_serializing_if = "Option::is_none")]
    pub tree_root_id: Option<NodeId>,
    #[serde(rename = "menuSchemaUid", default, skip_serializing_if = "Option::is_none")]
    pub navigation_node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_schema_name: Option<String>,
    #[serde(default)]
    pub hidden: bool,
}

impl NewRoute {
    pub fn group(title: impl Into<String>, parent_id: Option<RouteId>) -> Self {
        Self {
            route_type: RouteType::Group,
            title: Some(title.into()),
            parent_id,
            tree_root_id: None,
            navigation_node_id: None,
            tab_schema_name: None,
            hidden: false,
        }
    }

    pub fn page(
        title: impl Into<String>,
        parent_id: Option<RouteId>,
        tree_root_id: impl Into<NodeId>,
        navigation_node_id: impl Into<NodeId>,
    ) -> Self {
        Self {
            route_type: RouteType::Page,
            title: Some(title.into()),
            parent_id,
            tree_root_id: Some(tree_root_id.into()),
            navigation_node_id: Some(navigation_node_id.into()),
            tab_schema_name: None,
            hidden: false,
        }
    }

    /// The hidden tab route binding a page to its content container.
    pub fn tabs(page_route_id: RouteId, container_id: impl Into<NodeId>, tab_name: impl Into<String>) -> Self {
        Self {
            route_type: RouteType::Tabs,
            title: None,
            parent_id: Some(page_route_id),
            tree_root_id: Some(container_id.into()),
            navigation_node_id: None,
            tab_schema_name: Some(tab_name.into()),
            hidden: true,
        }
    }
}

/// Partial route update; `None` leaves a field untouched. The nested
/// options clear a link when set to `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<Option<RouteId>>,
    #[serde(
        rename = "schemaUid",
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub tree_root_id: Option<Option<NodeId>>,
    #[serde(
        rename = "menuSchemaUid",
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub navigation_node_id: Option<Option<NodeId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

/// A present field, `null` included, is `Some`; `default` covers absence.
fn explicit_null<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
