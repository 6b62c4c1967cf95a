use pretty_assertions::assert_eq;

use uitree::composite::PageSpec;
use uitree::diff::{describe_row, diff};
use uitree::memory::FailurePoint;
use uitree::snapshot::{
    capture, ui_tables, ROLE_ROUTES_TABLE, ROUTES_TABLE, SCHEMAS_TABLE, TEMPLATES_TABLE, TREE_PATH_TABLE,
};
use uitree::{InMemoryTreeStore, MutationProtocol, NodePatch};

async fn seeded_store() -> InMemoryTreeStore {
    let store = InMemoryTreeStore::new();
    store.seed_table(TEMPLATES_TABLE, Vec::new()).await;
    store.seed_table(ROLE_ROUTES_TABLE, Vec::new()).await;
    store
}

#[tokio::test]
async fn page_build_shows_up_per_table() {
    let store = seeded_store().await;
    let tables = ui_tables();
    let before = capture(&store, &tables).await;
    assert!(!before.is_degraded());

    let mut proto = MutationProtocol::new(&store);
    let page = proto.create_page(&PageSpec::new("Agenda", None)).await.unwrap();
    let after = capture(&store, &tables).await;

    let report = diff(&before, &after, &tables);
    let routes = report.table(ROUTES_TABLE).unwrap();
    assert_eq!(routes.added.len(), 2);
    assert_eq!(routes.summary(), "desktopRoutes (0 -> 2): +2 ~0 -0");

    // page, grid, menu item
    let schemas = report.table(SCHEMAS_TABLE).unwrap();
    assert_eq!(schemas.added.len(), 3);

    // page:1 grid:2 menu:1
    let paths = report.table(TREE_PATH_TABLE).unwrap();
    assert_eq!(paths.added.len(), 4);
    assert!(paths
        .added
        .iter()
        .any(|row| describe_row(TREE_PATH_TABLE, row)
            == format!("path {} -> {} (depth 1)", page.page_root_id, page.grid_id)));

    assert!(report.table(TEMPLATES_TABLE).unwrap().is_empty());
    assert!(!report.is_empty());
}

#[tokio::test]
async fn patch_is_reported_as_modified_fields() {
    let store = seeded_store().await;
    let tables = ui_tables();
    let mut proto = MutationProtocol::new(&store);
    let page = proto.create_page(&PageSpec::new("Agenda", None)).await.unwrap();

    let before = capture(&store, &tables).await;
    proto.patch(&page.grid_id, NodePatch::visible(false)).await.unwrap();
    let after = capture(&store, &tables).await;

    let report = diff(&before, &after, &tables);
    let schemas = report.table(SCHEMAS_TABLE).unwrap();
    assert!(schemas.added.is_empty() && schemas.removed.is_empty());
    assert_eq!(schemas.modified.len(), 1);
    let changed: Vec<&str> = schemas.modified[0].changed_fields.iter().map(String::as_str).collect();
    assert_eq!(changed, vec!["x-hidden"]);
    assert!(report.table(ROUTES_TABLE).unwrap().is_empty());
}

#[tokio::test]
async fn failing_table_degrades_capture() {
    let store = seeded_store().await;
    store
        .inject_failure(FailurePoint::ListRows(ROUTES_TABLE.into()))
        .await;
    let snapshot = capture(&store, &ui_tables()).await;

    assert!(snapshot.is_degraded());
    assert_eq!(snapshot.warnings.len(), 1);
    assert_eq!(snapshot.warnings[0].table, ROUTES_TABLE);
    assert_eq!(snapshot.row_count(ROUTES_TABLE), 0);
    assert_eq!(snapshot.tables.len(), ui_tables().len());
}

#[tokio::test]
async fn unchanged_store_diffs_empty() {
    let store = seeded_store().await;
    let mut proto = MutationProtocol::new(&store);
    proto.create_page(&PageSpec::new("Home", None)).await.unwrap();
    let tables = ui_tables();
    let a = capture(&store, &tables).await;
    let b = capture(&store, &tables).await;
    assert!(diff(&a, &b, &tables).is_empty());
}
