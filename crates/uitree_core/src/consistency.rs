//! Route/tree consistency check.
//!
//! Removing a node never touches the routes pointing at it, and a page build
//! can stop half way. This module finds the resulting breakage; it never
//! repairs anything.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::error::{Result, TreeError};
use crate::ids::NodeId;
use crate::node::TreeNode;
use crate::ports::RemoteTreeStore;
use crate::route::{RouteId, RouteNode, RouteType};

pub const TREE_ROOT_LINK: &str = "schemaUid";
pub const NAVIGATION_LINK: &str = "menuSchemaUid";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ConsistencyIssue {
    /// A page route with no `tabs` child route.
    PageWithoutTabs { route_id: RouteId },
    /// A `tabs` route whose content root is null.
    TabsWithoutTreeRoot { route_id: RouteId },
    /// A `tabs` route whose content root is not a container.
    TabsRootNotContainer {
        route_id: RouteId,
        node_id: NodeId,
        component_type: String,
    },
    /// A route link naming a node that no longer exists.
    OrphanedRoute {
        route_id: RouteId,
        node_id: NodeId,
        link: &'static str,
    },
}

impl ConsistencyIssue {
    pub fn route_id(&self) -> RouteId {
        match self {
            Self::PageWithoutTabs { route_id }
            | Self::TabsWithoutTreeRoot { route_id }
            | Self::TabsRootNotContainer { route_id, .. }
            | Self::OrphanedRoute { route_id, .. } => *route_id,
        }
    }

    /// Dangling references as errors; structural findings have none.
    pub fn to_error(&self) -> Option<TreeError> {
        match self {
            Self::OrphanedRoute {
                route_id,
                node_id,
                link,
            } => Some(TreeError::OrphanedRoute {
                route_id: *route_id,
                node_id: node_id.clone(),
                link: *link,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for ConsistencyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageWithoutTabs { route_id } => write!(f, "page route {route_id} has no tabs route"),
            Self::TabsWithoutTreeRoot { route_id } => {
                write!(f, "tabs route {route_id} has no content root")
            }
            Self::TabsRootNotContainer {
                route_id,
                node_id,
                component_type,
            } => write!(
                f,
                "tabs route {route_id} points at {node_id} ({component_type}), not a container"
            ),
            Self::OrphanedRoute {
                route_id,
                node_id,
                link,
            } => write!(f, "route {route_id}: {link} points at missing node {node_id}"),
        }
    }
}

/// Check `routes` against the nodes they reference.
///
/// `nodes` holds every referenced node that exists; an id absent from it is
/// treated as removed.
pub fn check_routes<S: AsRef<str>>(
    routes: &[RouteNode],
    nodes: &HashMap<NodeId, TreeNode>,
    container_types: &[S],
) -> Vec<ConsistencyIssue> {
    let mut issues = Vec::new();

    for route in routes {
        for (link, target) in [
            (TREE_ROOT_LINK, &route.tree_root_id),
            (NAVIGATION_LINK, &route.navigation_node_id),
        ] {
            if let Some(node_id) = target {
                if !nodes.contains_key(node_id) {
                    issues.push(ConsistencyIssue::OrphanedRoute {
                        route_id: route.id,
                        node_id: node_id.clone(),
                        link,
                    });
                }
            }
        }

        match route.route_type {
            RouteType::Page => {
                let has_tabs = routes
                    .iter()
                    .any(|r| r.parent_id == Some(route.id) && r.route_type == RouteType::Tabs);
                if !has_tabs {
                    issues.push(ConsistencyIssue::PageWithoutTabs { route_id: route.id });
                }
            }
            RouteType::Tabs => match &route.tree_root_id {
                None => issues.push(ConsistencyIssue::TabsWithoutTreeRoot { route_id: route.id }),
                Some(node_id) => {
                    if let Some(node) = nodes.get(node_id) {
                        if !node.is_container(container_types) {
                            issues.push(ConsistencyIssue::TabsRootNotContainer {
                                route_id: route.id,
                                node_id: node_id.clone(),
                                component_type: node.component_type.clone(),
                            });
                        }
                    }
                }
            },
            _ => {}
        }
    }

    for issue in &issues {
        tracing::warn!(target: "uitree.routes", route_id = issue.route_id(), "{issue}");
    }
    issues
}

/// Load every route and the nodes they reference, then [`check_routes`].
pub async fn check_store<S: AsRef<str>>(
    store: &dyn RemoteTreeStore,
    container_types: &[S],
) -> Result<Vec<ConsistencyIssue>> {
    let routes = store.list_routes().await?;

    let mut nodes = HashMap::new();
    for route in &routes {
        for node_id in [&route.tree_root_id, &route.navigation_node_id]
            .into_iter()
            .flatten()
        {
            if nodes.contains_key(node_id) {
                continue;
            }
            if let Some(node) = store.get_node(node_id).await? {
                nodes.insert(node_id.clone(), node);
            }
        }
    }

    let issues = check_routes(&routes, &nodes, container_types);
    tracing::info!(
        target: "uitree.routes",
        routes = routes.len(),
        issues = issues.len(),
        "route consistency checked"
    );
    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTreeStore;
    use crate::mutation::MutationProtocol;
    use crate::composite::PageSpec;
    use crate::node::DEFAULT_CONTAINER_TYPES;
    use crate::route::{NewRoute, RouteUpdate};

    fn nodes(list: &[(&str, &str)]) -> HashMap<NodeId, TreeNode> {
        list.iter()
            .map(|(id, ty)| (id.to_string(), TreeNode::with_id(*id, *ty)))
            .collect()
    }

    #[test]
    fn test_tabs_without_tree_root_is_flagged() {
        let mut tabs = RouteNode::from_new(2, &NewRoute::tabs(1, "grid", "tab"));
        tabs.tree_root_id = None;
        let routes = vec![RouteNode::from_new(1, &NewRoute::page("P", None, "page", "menu")), tabs];
        let issues = check_routes(
            &routes,
            &nodes(&[("page", "Page"), ("menu", "Menu.Item")]),
            DEFAULT_CONTAINER_TYPES,
        );
        assert_eq!(issues, vec![ConsistencyIssue::TabsWithoutTreeRoot { route_id: 2 }]);
    }

    #[test]
    fn test_valid_page_is_clean() {
        let routes = vec![
            RouteNode::from_new(1, &NewRoute::page("P", None, "page", "menu")),
            RouteNode::from_new(2, &NewRoute::tabs(1, "grid", "tab")),
        ];
        let issues = check_routes(
            &routes,
            &nodes(&[("page", "Page"), ("menu", "Menu.Item"), ("grid", "Grid")]),
            DEFAULT_CONTAINER_TYPES,
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn test_structural_findings() {
        let routes = vec![
            RouteNode::from_new(1, &NewRoute::page("Lonely", None, "page", "menu")),
            RouteNode::from_new(2, &NewRoute::page("P", None, "page", "menu")),
            RouteNode::from_new(3, &NewRoute::tabs(2, "field", "tab")),
        ];
        let issues = check_routes(
            &routes,
            &nodes(&[("page", "Page"), ("menu", "Menu.Item"), ("field", "CollectionField")]),
            DEFAULT_CONTAINER_TYPES,
        );
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0], ConsistencyIssue::PageWithoutTabs { route_id: 1 });
        assert!(matches!(
            &issues[1],
            ConsistencyIssue::TabsRootNotContainer { route_id: 3, .. }
        ));
        assert!(issues.iter().all(|i| i.to_error().is_none()));
    }

    #[tokio::test]
    async fn test_removed_content_orphans_routes() {
        let store = InMemoryTreeStore::new();
        let mut proto = MutationProtocol::new(&store);
        let build = proto.create_page(&PageSpec::new("P", None)).await.unwrap();
        assert!(check_store(&store, DEFAULT_CONTAINER_TYPES).await.unwrap().is_empty());

        proto.remove(&build.page_root_id).await.unwrap();
        let issues = check_store(&store, DEFAULT_CONTAINER_TYPES).await.unwrap();

        // the page root and the grid under it are both gone
        assert_eq!(issues.len(), 2);
        let err = issues[0].to_error().unwrap();
        assert_eq!(err.kind_code(), "orphaned_route");
        assert!(issues.iter().all(|i| matches!(i, ConsistencyIssue::OrphanedRoute { .. })));
    }

    #[tokio::test]
    async fn test_cleared_tabs_root_detected_through_store() {
        let store = InMemoryTreeStore::new();
        let mut proto = MutationProtocol::new(&store);
        let build = proto.create_page(&PageSpec::new("P", None)).await.unwrap();
        proto
            .update_route(
                build.tabs_route_id,
                RouteUpdate {
                    tree_root_id: Some(None),
                    ..RouteUpdate::default()
                },
            )
            .await
            .unwrap();
        let issues = check_store(&store, DEFAULT_CONTAINER_TYPES).await.unwrap();
        assert_eq!(
            issues,
            vec![ConsistencyIssue::TabsWithoutTreeRoot {
                route_id: build.tabs_route_id
            }]
        );
    }
}
