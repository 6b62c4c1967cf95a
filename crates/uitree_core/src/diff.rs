//! Keyed diff between two snapshots.
//!
//! Each table is compared on its own: rows are matched by primary key, never
//! by position, and no correlation is attempted across tables. Row equality
//! is structural (`serde_json::Value` equality, key order ignored).

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::snapshot::{
    PrimaryKey, Row, Snapshot, TableSpec, ROLE_ROUTES_TABLE, ROUTES_TABLE, SCHEMAS_TABLE,
    TEMPLATES_TABLE, TREE_PATH_TABLE,
};

/// Primary-key value of a row; composite parts in key order.
///
/// Each part is the JSON text of the field, so `1` and `"1"` stay distinct.
/// A missing or null part is `null`, which no string or number renders to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowKey(pub Vec<String>);

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("::"))
    }
}

impl PrimaryKey {
    /// Key of `row`.
    ///
    /// A single-field key that is missing or null falls back to the whole
    /// serialized row, so keyless rows still compare by content.
    pub fn key_of(&self, row: &Row) -> RowKey {
        match self {
            PrimaryKey::Single(field) => match row.get(field) {
                Some(v) if !v.is_null() => RowKey(vec![v.to_string()]),
                _ => RowKey(vec![Value::Object(row.clone()).to_string()]),
            },
            PrimaryKey::Composite(fields) => RowKey(
                fields
                    .iter()
                    .map(|f| row.get(f).unwrap_or(&Value::Null).to_string())
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifiedRow {
    pub key: RowKey,
    pub before: Row,
    pub after: Row,
    /// Top-level fields whose values differ, a field absent on one side
    /// included.
    pub changed_fields: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDiff {
    pub table: String,
    pub before_count: usize,
    pub after_count: usize,
    pub added: Vec<Row>,
    pub modified: Vec<ModifiedRow>,
    pub removed: Vec<Row>,
}

impl TableDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    pub fn delta(&self) -> i64 {
        self.after_count as i64 - self.before_count as i64
    }

    pub fn summary(&self) -> String {
        format!(
            "{} ({} -> {}): +{} ~{} -{}",
            self.table,
            self.before_count,
            self.after_count,
            self.added.len(),
            self.modified.len(),
            self.removed.len()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffReport {
    pub before_at: DateTime<Utc>,
    pub after_at: DateTime<Utc>,
    pub tables: Vec<TableDiff>,
}

impl DiffReport {
    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(TableDiff::is_empty)
    }

    pub fn table(&self, name: &str) -> Option<&TableDiff> {
        self.tables.iter().find(|t| t.table == name)
    }
}

/// Diff every table present in either snapshot.
///
/// Keys come from `specs`; a table without a spec is keyed by `id`. A table
/// missing from one snapshot compares as empty.
pub fn diff(before: &Snapshot, after: &Snapshot, specs: &[TableSpec]) -> DiffReport {
    let names: BTreeSet<&String> = before.tables.keys().chain(after.tables.keys()).collect();

    let tables = names
        .into_iter()
        .map(|name| {
            let default_key = PrimaryKey::default();
            let key = specs
                .iter()
                .find(|s| &s.name == name)
                .map(|s| &s.primary_key)
                .unwrap_or(&default_key);
            diff_table(name, key, before.table(name), after.table(name))
        })
        .collect();

    DiffReport {
        before_at: before.captured_at,
        after_at: after.captured_at,
        tables,
    }
}

/// Keyed comparison of one table. Rows sharing a key within one side
/// collapse to the last one seen.
pub fn diff_table(name: &str, key: &PrimaryKey, before: &[Row], after: &[Row]) -> TableDiff {
    let (before_order, before_index) = index_rows(key, before);
    let (after_order, after_index) = index_rows(key, after);

    let mut added = Vec::new();
    let mut modified = Vec::new();
    for k in &after_order {
        let after_row = after_index[k];
        match before_index.get(k) {
            None => added.push(after_row.clone()),
            Some(before_row) if *before_row != after_row => modified.push(ModifiedRow {
                key: k.clone(),
                before: (*before_row).clone(),
                after: after_row.clone(),
                changed_fields: changed_fields(before_row, after_row),
            }),
            Some(_) => {}
        }
    }

    let removed = before_order
        .iter()
        .filter(|k| !after_index.contains_key(*k))
        .map(|k| before_index[k].clone())
        .collect();

    TableDiff {
        table: name.to_string(),
        before_count: before.len(),
        after_count: after.len(),
        added,
        modified,
        removed,
    }
}

/// Keys in first-seen order, plus key → row.
fn index_rows<'a>(key: &PrimaryKey, rows: &'a [Row]) -> (Vec<RowKey>, HashMap<RowKey, &'a Row>) {
    let mut order = Vec::new();
    let mut index = HashMap::new();
    for row in rows {
        let k = key.key_of(row);
        if index.insert(k.clone(), row).is_none() {
            order.push(k);
        }
    }
    (order, index)
}

/// Top-level fields whose values differ between `a` and `b`.
pub fn changed_fields(a: &Row, b: &Row) -> BTreeSet<String> {
    a.keys()
        .chain(b.keys())
        .filter(|k| a.get(*k) != b.get(*k))
        .cloned()
        .collect()
}

/// One-line description of a row for reports and logs.
pub fn describe_row(table: &str, row: &Row) -> String {
    let s = |k: &str| match row.get(k) {
        Some(Value::String(v)) => v.clone(),
        Some(Value::Null) | None => "-".to_string(),
        Some(other) => other.to_string(),
    };
    match table {
        ROUTES_TABLE => format!("route #{} \"{}\" ({})", s("id"), s("title"), s("type")),
        SCHEMAS_TABLE => format!("schema {} ({})", s("x-uid"), s("x-component")),
        TREE_PATH_TABLE => format!(
            "path {} -> {} (depth {})",
            s("ancestor"),
            s("descendant"),
            s("depth")
        ),
        TEMPLATES_TABLE => format!("template \"{}\" ({})", s("name"), s("componentName")),
        ROLE_ROUTES_TABLE => format!("binding role:{} -> route:{}", s("roleName"), s("desktopRouteId")),
        _ => {
            let text = Value::Object(row.clone()).to_string();
            text.chars().take(80).collect()
        }
    }
}
