//! Multi-step builds (navigable page, menu group) and their compensation.
//!
//! A page is four independent calls: content root, menu entry, page route,
//! hidden tabs route. Nothing is rolled back automatically. A
//! [`BuildTracker`] records the high-water mark and every artefact created,
//! so a failed build yields the exact compensating calls to issue.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::builders::{menu_item, page_schema};
use crate::error::{Result, TreeError};
use crate::ids::NodeId;
use crate::mutation::MutationProtocol;
use crate::route::{NewRoute, RouteId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStep {
    CreateContentRoot,
    CreateNavigationEntry,
    CreatePageRoute,
    CreateTabsRoute,
}

impl BuildStep {
    pub const PAGE: [BuildStep; 4] = [
        BuildStep::CreateContentRoot,
        BuildStep::CreateNavigationEntry,
        BuildStep::CreatePageRoute,
        BuildStep::CreateTabsRoute,
    ];
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateContentRoot => "create content root",
            Self::CreateNavigationEntry => "create navigation entry",
            Self::CreatePageRoute => "create page route",
            Self::CreateTabsRoute => "create tabs route",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CreatedArtifact {
    Node(NodeId),
    Route(RouteId),
}

/// A compensating call undoing one artefact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "id", rename_all = "snake_case")]
pub enum Compensation {
    DestroyRoute(RouteId),
    RemoveNode(NodeId),
}

#[derive(Debug, Error)]
#[error("composite build failed at step {step} ({completed} step(s) completed): {source}")]
pub struct CompositeBuildError {
    pub step: BuildStep,
    /// High-water mark: steps that completed before the failure.
    pub completed: usize,
    pub created: Vec<CreatedArtifact>,
    #[source]
    pub source: TreeError,
}

impl CompositeBuildError {
    /// Compensating calls, newest artefact first.
    pub fn compensation_plan(&self) -> Vec<Compensation> {
        compensation_plan(&self.created)
    }
}

/// Undo calls for `created`, newest first, so routes go before the nodes
/// they point at.
pub fn compensation_plan(created: &[CreatedArtifact]) -> Vec<Compensation> {
    created
        .iter()
        .rev()
        .map(|artifact| match artifact {
            CreatedArtifact::Node(id) => Compensation::RemoveNode(id.clone()),
            CreatedArtifact::Route(id) => Compensation::DestroyRoute(*id),
        })
        .collect()
}

/// Ordered steps plus what has been done so far.
#[derive(Debug, Clone)]
pub struct BuildTracker {
    steps: Vec<BuildStep>,
    completed: usize,
    created: Vec<CreatedArtifact>,
}

impl BuildTracker {
    pub fn new(steps: &[BuildStep]) -> Self {
        Self {
            steps: steps.to_vec(),
            completed: 0,
            created: Vec::new(),
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn created(&self) -> &[CreatedArtifact] {
        &self.created
    }

    pub fn current_step(&self) -> Option<BuildStep> {
        self.steps.get(self.completed).copied()
    }

    /// Mark the current step done with the artefact it produced.
    pub fn complete(&mut self, artifact: CreatedArtifact) {
        self.created.push(artifact);
        self.completed += 1;
    }

    pub fn fail(self, source: TreeError) -> CompositeBuildError {
        let step = self
            .current_step()
            .or_else(|| self.steps.last().copied())
            .unwrap_or(BuildStep::CreateContentRoot);
        CompositeBuildError {
            step,
            completed: self.completed,
            created: self.created,
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageSpec {
    pub title: String,
    pub parent_route_id: Option<RouteId>,
}

impl PageSpec {
    pub fn new(title: impl Into<String>, parent_route_id: Option<RouteId>) -> Self {
        Self {
            title: title.into(),
            parent_route_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageBuild {
    pub page_route_id: RouteId,
    pub tabs_route_id: RouteId,
    pub page_root_id: NodeId,
    /// The content container (Grid) blocks are inserted into.
    pub grid_id: NodeId,
    pub menu_id: NodeId,
}

impl PageBuild {
    pub fn artifacts(&self) -> Vec<CreatedArtifact> {
        vec![
            CreatedArtifact::Node(self.page_root_id.clone()),
            CreatedArtifact::Node(self.menu_id.clone()),
            CreatedArtifact::Route(self.page_route_id),
            CreatedArtifact::Route(self.tabs_route_id),
        ]
    }
}

impl MutationProtocol<'_> {
    /// Create a navigable page with an empty grid. Strictly sequential; each
    /// step needs ids returned by the previous ones.
    pub async fn create_page(
        &mut self,
        spec: &PageSpec,
    ) -> std::result::Result<PageBuild, CompositeBuildError> {
        let mut tracker = BuildTracker::new(&BuildStep::PAGE);

        let (page, grid_key) = page_schema();
        let grid_id = match page.get_child(&grid_key) {
            Some(grid) => grid.id.clone(),
            None => {
                return Err(tracker.fail(TreeError::Internal(anyhow::anyhow!(
                    "page schema without grid"
                ))))
            }
        };

        let page_root_id = match self.insert_root(&page).await {
            Ok(id) => id,
            Err(e) => return Err(tracker.fail(e)),
        };
        tracker.complete(CreatedArtifact::Node(page_root_id.clone()));

        let menu_id = match self.insert_root(&menu_item(&spec.title)).await {
            Ok(id) => id,
            Err(e) => return Err(tracker.fail(e)),
        };
        tracker.complete(CreatedArtifact::Node(menu_id.clone()));

        let page_route = NewRoute::page(
            spec.title.clone(),
            spec.parent_route_id,
            page_root_id.clone(),
            menu_id.clone(),
        );
        let page_route_id = match self.create_route(page_route).await {
            Ok(id) => id,
            Err(e) => return Err(tracker.fail(e)),
        };
        tracker.complete(CreatedArtifact::Route(page_route_id));

        let tabs_route = NewRoute::tabs(page_route_id, grid_id.clone(), grid_key);
        let tabs_route_id = match self.create_route(tabs_route).await {
            Ok(id) => id,
            Err(e) => return Err(tracker.fail(e)),
        };
        tracker.complete(CreatedArtifact::Route(tabs_route_id));

        tracing::info!(
            target: "uitree.mutation",
            title = %spec.title,
            page_route_id,
            grid_id = %grid_id,
            dry_run = self.is_dry_run(),
            "page created"
        );

        Ok(PageBuild {
            page_route_id,
            tabs_route_id,
            page_root_id,
            grid_id,
            menu_id,
        })
    }

    /// Create a menu group (folder) route.
    pub async fn create_group(
        &mut self,
        title: &str,
        parent_route_id: Option<RouteId>,
    ) -> Result<RouteId> {
        self.create_route(NewRoute::group(title, parent_route_id))
            .await
    }

    /// Issue every compensation in order. Best-effort: a failing call does
    /// not stop the rest; its error is returned alongside.
    pub async fn compensate(
        &mut self,
        plan: &[Compensation],
    ) -> Vec<(Compensation, Result<()>)> {
        let mut outcomes = Vec::with_capacity(plan.len());
        for step in plan {
            let result = match step {
                Compensation::DestroyRoute(id) => self.destroy_route(*id).await,
                Compensation::RemoveNode(id) => self.remove(id).await,
            };
            if let Err(e) = &result {
                tracing::warn!(
                    target: "uitree.mutation",
                    compensation = ?step,
                    error = %e,
                    "compensation failed"
                );
            }
            outcomes.push((step.clone(), result));
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FailurePoint, InMemoryTreeStore};
    use crate::ports::RemoteTreeStore;

    #[tokio::test]
    async fn test_create_page_links_everything() {
        let store = InMemoryTreeStore::new();
        let mut proto = MutationProtocol::new(&store);
        let build = proto.create_page(&PageSpec::new("Agenda", None)).await.unwrap();

        let page = store.get_subtree(&build.page_root_id).await.unwrap().unwrap();
        assert_eq!(page.component_type, "Page");
        assert_eq!(page.children[0].1.id, build.grid_id);

        let tabs = store.route(build.tabs_route_id).await.unwrap();
        assert_eq!(tabs.parent_id, Some(build.page_route_id));
        assert_eq!(tabs.tree_root_id.as_deref(), Some(build.grid_id.as_str()));
        assert!(tabs.hidden);

        let route = store.route(build.page_route_id).await.unwrap();
        assert_eq!(route.navigation_node_id.as_deref(), Some(build.menu_id.as_str()));
    }

    #[tokio::test]
    async fn test_failure_reports_high_water_mark() {
        let store = InMemoryTreeStore::new();
        store
            .inject_failure(FailurePoint::CreateRoute { after: 1 })
            .await;
        let mut proto = MutationProtocol::new(&store);
        let err = proto
            .create_page(&PageSpec::new("Broken", None))
            .await
            .unwrap_err();

        assert_eq!(err.step, BuildStep::CreateTabsRoute);
        assert_eq!(err.completed, 3);
        assert_eq!(err.created.len(), 3);

        let plan = err.compensation_plan();
        assert!(matches!(plan[0], Compensation::DestroyRoute(_)));
        assert!(matches!(plan[1], Compensation::RemoveNode(_)));
        assert!(matches!(plan[2], Compensation::RemoveNode(_)));

        store.clear_failures().await;
        let outcomes = proto.compensate(&plan).await;
        assert!(outcomes.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(store.node_count().await, 0);
        assert!(store.list_routes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_on_first_step_creates_nothing() {
        let store = InMemoryTreeStore::new();
        store
            .inject_failure(FailurePoint::InsertRoot { after: 0 })
            .await;
        let mut proto = MutationProtocol::new(&store);
        let err = proto.create_page(&PageSpec::new("X", None)).await.unwrap_err();
        assert_eq!(err.step, BuildStep::CreateContentRoot);
        assert_eq!(err.completed, 0);
        assert!(err.compensation_plan().is_empty());
        assert!(err.to_string().contains("create content root"));
    }

    #[tokio::test]
    async fn test_dry_run_page_rehearses_all_steps() {
        let store = InMemoryTreeStore::new();
        let mut proto = MutationProtocol::dry_run(&store);
        let build = proto.create_page(&PageSpec::new("Rehearsal", None)).await.unwrap();
        assert!(build.page_route_id < 0 && build.tabs_route_id < 0);
        assert_eq!(proto.journal().len(), 4);
        assert_eq!(store.mutation_count().await, 0);
    }

    #[test]
    fn test_compensation_plan_order() {
        let plan = compensation_plan(&[
            CreatedArtifact::Node("a".into()),
            CreatedArtifact::Route(1),
        ]);
        assert_eq!(
            plan,
            vec![Compensation::DestroyRoute(1), Compensation::RemoveNode("a".into())]
        );
    }
}
