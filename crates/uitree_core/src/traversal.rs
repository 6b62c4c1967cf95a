//! Subtree search.
//!
//! All walks are pre-order depth-first from the given root (the root itself
//! included), so the first match is the one earliest in document order.

use crate::error::{Result, TreeError};
use crate::ids::NodeId;
use crate::node::TreeNode;
use crate::ports::RemoteTreeStore;
use crate::route::{RouteId, RouteNode};

pub fn find_first<'a, P>(root: &'a TreeNode, predicate: P) -> Option<&'a TreeNode>
where
    P: Fn(&TreeNode) -> bool,
{
    root.pre_order().into_iter().find(|n| predicate(n))
}

pub fn find_all<'a, P>(root: &'a TreeNode, predicate: P) -> Vec<&'a TreeNode>
where
    P: Fn(&TreeNode) -> bool,
{
    root.pre_order().into_iter().filter(|n| predicate(n)).collect()
}

pub fn is_component_type(component_type: &str) -> impl Fn(&TreeNode) -> bool + '_ {
    move |n| n.component_type == component_type
}

pub fn has_decorator(decorator_type: &str) -> impl Fn(&TreeNode) -> bool + '_ {
    move |n| n.decorator_type.as_deref() == Some(decorator_type)
}

pub fn is_bound_to(collection: &str) -> impl Fn(&TreeNode) -> bool + '_ {
    move |n| n.bound_collection() == Some(collection)
}

async fn fetch_subtree(store: &dyn RemoteTreeStore, root_id: &str) -> Result<TreeNode> {
    store
        .get_subtree(root_id)
        .await?
        .ok_or_else(|| TreeError::NodeNotFound(root_id.to_string()))
}

/// [`find_first`] over the stored subtree at `root_id`.
pub async fn find_first_in<P>(
    store: &dyn RemoteTreeStore,
    root_id: &str,
    predicate: P,
) -> Result<Option<NodeId>>
where
    P: Fn(&TreeNode) -> bool,
{
    let root = fetch_subtree(store, root_id).await?;
    Ok(find_first(&root, predicate).map(|n| n.id.clone()))
}

/// [`find_all`] over the stored subtree at `root_id`.
pub async fn find_all_in<P>(
    store: &dyn RemoteTreeStore,
    root_id: &str,
    predicate: P,
) -> Result<Vec<NodeId>>
where
    P: Fn(&TreeNode) -> bool,
{
    let root = fetch_subtree(store, root_id).await?;
    Ok(find_all(&root, predicate)
        .into_iter()
        .map(|n| n.id.clone())
        .collect())
}

/// Id of the first direct child of `page_root_id` that is a `Grid`.
pub async fn find_grid_id(store: &dyn RemoteTreeStore, page_root_id: &str) -> Result<Option<NodeId>> {
    let page = fetch_subtree(store, page_root_id).await?;
    Ok(page
        .children
        .iter()
        .find(|(_, c)| c.component_type == "Grid")
        .map(|(_, c)| c.id.clone()))
}

/// First route directly under `parent_id` (top level when `None`) whose
/// title is exactly `title`.
pub fn find_route_by_title<'a>(
    routes: &'a [RouteNode],
    parent_id: Option<RouteId>,
    title: &str,
) -> Option<&'a RouteNode> {
    routes
        .iter()
        .find(|r| r.parent_id == parent_id && r.title.as_deref() == Some(title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTreeStore;
    use crate::node::props;
    use crate::route::{NewRoute, RouteType};
    use serde_json::json;

    fn tree() -> TreeNode {
        TreeNode::with_id("grid", "Grid")
            .child(
                "r1",
                TreeNode::with_id("r1", "Grid.Row").child(
                    "c1",
                    TreeNode::with_id("c1", "Grid.Col").child(
                        "t1",
                        TreeNode::with_id("t1", "CardItem")
                            .decorated("TableBlockProvider", props([("collection", json!("a"))])),
                    ),
                ),
            )
            .child(
                "r2",
                TreeNode::with_id("r2", "Grid.Row").child(
                    "t2",
                    TreeNode::with_id("t2", "CardItem")
                        .decorated("TableBlockProvider", props([("collection", json!("b"))])),
                ),
            )
    }

    #[test]
    fn test_find_first_uses_document_order() {
        let t = tree();
        let hit = find_first(&t, is_component_type("CardItem")).unwrap();
        assert_eq!(hit.id, "t1");
        assert_eq!(find_first(&t, is_component_type("Grid")).unwrap().id, "grid");
        assert!(find_first(&t, is_component_type("Form")).is_none());
    }

    #[test]
    fn test_find_all_preserves_order() {
        let t = tree();
        let ids: Vec<&str> = find_all(&t, is_component_type("Grid.Row"))
            .into_iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(ids, vec!["r1", "r2"]);
        assert_eq!(find_all(&t, has_decorator("TableBlockProvider")).len(), 2);
        assert_eq!(find_all(&t, is_bound_to("b"))[0].id, "t2");
    }

    #[tokio::test]
    async fn test_store_backed_queries() {
        let store = InMemoryTreeStore::new();
        let page = TreeNode::with_id("page", "Page").child("g", tree());
        store.insert_root(&page).await.unwrap();

        assert_eq!(
            find_first_in(&store, "page", is_bound_to("a")).await.unwrap(),
            Some("t1".to_string())
        );
        assert_eq!(
            find_all_in(&store, "r2", |_| true).await.unwrap(),
            vec!["r2".to_string(), "t2".to_string()]
        );
        assert_eq!(find_grid_id(&store, "page").await.unwrap(), Some("grid".into()));
        assert!(matches!(
            find_first_in(&store, "ghost", |_| true).await,
            Err(TreeError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_find_route_by_title() {
        let routes = vec![
            RouteNode::from_new(1, &NewRoute::group("Clinic", None)),
            RouteNode::from_new(2, &NewRoute::page("Agenda", Some(1), "p", "m")),
            RouteNode::from_new(3, &NewRoute::page("Agenda", None, "p2", "m2")),
        ];
        let hit = find_route_by_title(&routes, Some(1), "Agenda").unwrap();
        assert_eq!(hit.id, 2);
        assert_eq!(hit.route_type, RouteType::Page);
        assert_eq!(find_route_by_title(&routes, None, "Agenda").unwrap().id, 3);
        assert!(find_route_by_title(&routes, Some(1), "Missing").is_none());
    }
}
