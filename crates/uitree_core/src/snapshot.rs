//! Table snapshots.
//!
//! A snapshot is the full, unpaginated row set of a list of named tables at
//! one point in time. Capture is best-effort: a table that cannot be fetched
//! is recorded as empty with a warning instead of failing the snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ports::RemoteTreeStore;

/// One table row, an opaque string-keyed map.
pub type Row = Map<String, Value>;

pub const ROUTES_TABLE: &str = "desktopRoutes";
pub const SCHEMAS_TABLE: &str = "uiSchemas";
pub const TREE_PATH_TABLE: &str = "uiSchemaTreePath";
pub const TEMPLATES_TABLE: &str = "uiSchemaTemplates";
pub const ROLE_ROUTES_TABLE: &str = "rolesDesktopRoutes";

/// Primary key of a table: one field or an ordered tuple of fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    Single(String),
    Composite(Vec<String>),
}

impl PrimaryKey {
    pub fn single(field: impl Into<String>) -> Self {
        Self::Single(field.into())
    }

    pub fn composite<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Composite(fields.into_iter().map(Into::into).collect())
    }
}

impl Default for PrimaryKey {
    fn default() -> Self {
        Self::Single("id".into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub primary_key: PrimaryKey,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, primary_key: PrimaryKey) -> Self {
        Self {
            name: name.into(),
            primary_key,
        }
    }
}

/// The tables that together describe the UI: routes, schema nodes, the
/// closure index, templates and role bindings.
pub fn ui_tables() -> Vec<TableSpec> {
    vec![
        TableSpec::new(ROUTES_TABLE, PrimaryKey::single("id")),
        TableSpec::new(SCHEMAS_TABLE, PrimaryKey::single("x-uid")),
        TableSpec::new(
            TREE_PATH_TABLE,
            PrimaryKey::composite(["ancestor", "descendant"]),
        ),
        TableSpec::new(TEMPLATES_TABLE, PrimaryKey::single("key")),
        TableSpec::new(
            ROLE_ROUTES_TABLE,
            PrimaryKey::composite(["desktopRouteId", "roleName"]),
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureWarning {
    pub table: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    pub tables: BTreeMap<String, Vec<Row>>,
    #[serde(default)]
    pub warnings: Vec<CaptureWarning>,
}

impl Snapshot {
    pub fn new(captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            tables: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_table(mut self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        self.tables.insert(name.into(), rows);
        self
    }

    /// Rows of `name`; a table missing from the snapshot reads as empty.
    pub fn table(&self, name: &str) -> &[Row] {
        self.tables.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn row_count(&self, name: &str) -> usize {
        self.table(name).len()
    }

    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Fetch every listed table. Never fails as a whole.
pub async fn capture(store: &dyn RemoteTreeStore, tables: &[TableSpec]) -> Snapshot {
    let mut snapshot = Snapshot::new(Utc::now());

    for spec in tables {
        match store.list_rows(&spec.name).await {
            Ok(rows) => {
                tracing::debug!(
                    target: "uitree.snapshot",
                    table = %spec.name,
                    rows = rows.len(),
                    "table captured"
                );
                snapshot.tables.insert(spec.name.clone(), rows);
            }
            Err(e) => {
                tracing::warn!(
                    target: "uitree.snapshot",
                    table = %spec.name,
                    error = %e,
                    "table capture failed, recording as empty"
                );
                snapshot.warnings.push(CaptureWarning {
                    table: spec.name.clone(),
                    message: e.to_string(),
                });
                snapshot.tables.insert(spec.name.clone(), Vec::new());
            }
        }
    }

    tracing::info!(
        target: "uitree.snapshot",
        tables = snapshot.tables.len(),
        warnings = snapshot.warnings.len(),
        "snapshot captured"
    );
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_table_reads_empty() {
        let snap = Snapshot::new(Utc::now());
        assert!(snap.table("uiSchemas").is_empty());
        assert_eq!(snap.row_count("uiSchemas"), 0);
    }

    #[test]
    fn test_primary_key_serde_untagged() {
        let single: PrimaryKey = serde_json::from_value(json!("x-uid")).unwrap();
        assert_eq!(single, PrimaryKey::single("x-uid"));
        let composite: PrimaryKey = serde_json::from_value(json!(["ancestor", "descendant"])).unwrap();
        assert_eq!(composite, PrimaryKey::composite(["ancestor", "descendant"]));
    }

    #[test]
    fn test_ui_tables_keys() {
        let tables = ui_tables();
        assert_eq!(tables.len(), 5);
        let tree_path = tables.iter().find(|t| t.name == TREE_PATH_TABLE).unwrap();
        assert_eq!(
            tree_path.primary_key,
            PrimaryKey::composite(["ancestor", "descendant"])
        );
    }

    #[test]
    fn test_snapshot_serde_round_trip() {
        let row = match json!({ "id": 1 }) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        let snap = Snapshot::new(Utc::now()).with_table("desktopRoutes", vec![row]);
        let back: Snapshot = serde_json::from_value(serde_json::to_value(&snap).unwrap()).unwrap();
        assert_eq!(back, snap);
    }
}
