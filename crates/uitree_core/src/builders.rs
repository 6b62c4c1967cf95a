//! Ready-made subtrees for the common blocks.
//!
//! Every builder generates fresh ids, so the output can be submitted as-is.
//! Shapes follow what the NocoBase client itself writes for these blocks.

use serde_json::{json, Value};

use crate::ids::new_id;
use crate::node::{props, Props, TreeNode, NAME};

const VOID: &str = "void";

fn void(component_type: &str) -> TreeNode {
    TreeNode::new(component_type).extra("type", VOID)
}

/// `Grid.Row` with one `Grid.Col` per block, in order.
pub fn grid_row(blocks: Vec<TreeNode>) -> TreeNode {
    let mut row = void("Grid.Row");
    for block in blocks {
        let col = void("Grid.Col").child(new_id(), block);
        row.push_child(new_id(), col);
    }
    row
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableBlockOptions {
    pub collection: String,
    pub title: String,
    /// Field names shown as columns.
    pub columns: Vec<String>,
    /// Merged over the default request params (`pageSize: 20`).
    pub params: Props,
}

impl TableBlockOptions {
    pub fn new<I, S>(collection: impl Into<String>, title: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            collection: collection.into(),
            title: title.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            params: Props::new(),
        }
    }
}

/// `CardItem` decorated with `TableBlockProvider`: an `ActionBar` followed
/// by a `TableV2` holding one column per field and a trailing actions column.
pub fn table_block(opts: &TableBlockOptions) -> TreeNode {
    let mut params = props([("pageSize", json!(20))]);
    params.extend(opts.params.clone());

    let actions = void("ActionBar")
        .extra("x-initializer", "table:configureActions")
        .component_props(props([("style", json!({ "marginBottom": "var(--nb-spacing)" }))]));

    let mut table = TreeNode::new("TableV2")
        .extra("type", "array")
        .extra("x-initializer", "table:configureColumns")
        .component_props(props([
            ("rowKey", json!("id")),
            ("rowSelection", json!({ "type": "checkbox" })),
        ]));
    for field in &opts.columns {
        let cell = TreeNode::new("CollectionField")
            .extra("x-read-pretty", true)
            .extra(
                "x-collection-field",
                format!("{}.{}", opts.collection, field),
            );
        let column = void("TableV2.Column")
            .decorated("TableV2.Column.Decorator", Props::new())
            .child(field.clone(), cell);
        table.push_child(new_id(), column);
    }
    let row_actions = void("TableV2.Column")
        .decorated("TableV2.Column.ActionBar", Props::new())
        .extra("x-initializer", "table:configureItemActions")
        .component_props(props([("width", json!(120)), ("fixed", json!("right"))]));
    table.push_child("actions", row_actions);

    void("CardItem")
        .decorated(
            "TableBlockProvider",
            props([
                ("collection", json!(opts.collection)),
                ("dataSource", json!("main")),
                ("action", json!("list")),
                ("params", Value::Object(params)),
                ("showIndex", json!(true)),
                ("dragSort", json!(false)),
            ]),
        )
        .component_props(props([("title", json!(opts.title))]))
        .extra("x-acl-action", format!("{}:list", opts.collection))
        .extra("x-toolbar", "BlockSchemaToolbar")
        .extra("x-settings", "blockSettings:table")
        .child("actions", actions)
        .child(new_id(), table)
}

/// Static markdown block.
pub fn markdown_block(content: &str) -> TreeNode {
    void("Markdown.Void")
        .decorated("BlockItem", Props::new())
        .component_props(props([("content", json!(content))]))
        .extra("x-editable", false)
        .extra("x-settings", "blockSettings:markdown")
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartBlockOptions {
    pub title: String,
    pub collection: String,
    /// `Bar`, `Pie`, `Line`, ...
    pub chart_type: String,
    pub measures: Vec<Value>,
    pub dimensions: Vec<Value>,
}

/// Chart card with a single `ChartRenderer`.
pub fn chart_block(opts: &ChartBlockOptions) -> TreeNode {
    let renderer = void("ChartRenderer")
        .decorated(
            "ChartRendererProvider",
            props([
                ("collection", json!(opts.collection)),
                ("dataSource", json!("main")),
                (
                    "query",
                    json!({ "measures": opts.measures, "dimensions": opts.dimensions }),
                ),
                ("config", json!({ "chartType": opts.chart_type })),
            ]),
        );

    void("CardItem")
        .decorated("ChartV2Block", Props::new())
        .component_props(props([("title", json!(opts.title))]))
        .extra("x-toolbar", "BlockSchemaToolbar")
        .extra("x-settings", "blockSettings:chartV2")
        .child("chart", renderer)
}

/// `Page` holding an empty `Grid`. Returns the page and the grid's local
/// key (used as the tab name of the page's tabs route).
pub fn page_schema() -> (TreeNode, String) {
    let grid_key = new_id();
    let grid = void("Grid")
        .extra("x-initializer", "page:addBlock")
        .extra("x-async", true);
    let page = void("Page").child(grid_key.clone(), grid);
    (page, grid_key)
}

/// Menu entry node for a page route.
pub fn menu_item(title: &str) -> TreeNode {
    void("Menu.Item")
        .extra("title", title)
        .extra(NAME, new_id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::DEFAULT_CONTAINER_TYPES;

    #[test]
    fn test_table_block_shape() {
        let block = table_block(&TableBlockOptions::new("patients", "Patients", ["name", "age"]));
        assert_eq!(block.decorator_type.as_deref(), Some("TableBlockProvider"));
        assert_eq!(block.bound_collection(), Some("patients"));
        assert_eq!(block.children[0].1.component_type, "ActionBar");

        let table = &block.children[1].1;
        assert_eq!(table.component_type, "TableV2");
        // two field columns plus the actions column
        assert_eq!(table.child_count(), 3);
        assert_eq!(
            block.decorator_props["params"],
            json!({ "pageSize": 20 })
        );
        assert!(block.duplicate_ids().is_empty());
    }

    #[test]
    fn test_table_params_override_defaults() {
        let mut opts = TableBlockOptions::new("c", "C", ["x"]);
        opts.params = props([("pageSize", json!(50)), ("sort", json!(["-id"]))]);
        let block = table_block(&opts);
        assert_eq!(
            block.decorator_props["params"],
            json!({ "pageSize": 50, "sort": ["-id"] })
        );
    }

    #[test]
    fn test_grid_row_wraps_each_block_in_a_col() {
        let row = grid_row(vec![markdown_block("a"), markdown_block("b")]);
        assert_eq!(row.child_count(), 2);
        for (_, col) in &row.children {
            assert_eq!(col.component_type, "Grid.Col");
            assert_eq!(col.children[0].1.component_type, "Markdown.Void");
        }
        assert!(row.is_container(DEFAULT_CONTAINER_TYPES));
    }

    #[test]
    fn test_page_schema_grid_key() {
        let (page, key) = page_schema();
        assert_eq!(page.component_type, "Page");
        assert_eq!(page.get_child(&key).map(|g| g.component_type.as_str()), Some("Grid"));
    }

    #[test]
    fn test_builders_generate_fresh_ids() {
        let a = chart_block(&ChartBlockOptions {
            title: "T".into(),
            collection: "c".into(),
            chart_type: "Bar".into(),
            measures: vec![],
            dimensions: vec![],
        });
        let b = menu_item("Home");
        assert_ne!(a.id, b.id);
        assert_ne!(a.children[0].1.id, a.id);
    }
}
