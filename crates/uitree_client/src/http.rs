//! `RemoteTreeStore` over the NocoBase REST API.
//!
//! Every response is wrapped as `{"data": ...}`; failures carry
//! `{"errors": [{"message": ...}]}`. A 404 is read as "absent" where the port
//! allows it, anything else non-2xx becomes `TransportFailure`.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};

use uitree_core::error::{Result, TreeError};
use uitree_core::ids::NodeId;
use uitree_core::node::{TreeNode, X_UID};
use uitree_core::patch::NodePatch;
use uitree_core::ports::RemoteTreeStore;
use uitree_core::position::InsertPosition;
use uitree_core::route::{NewRoute, RouteId, RouteUpdate};
use uitree_core::snapshot::{Row, ROUTES_TABLE, SCHEMAS_TABLE};

use crate::config::ClientConfig;

/// Ids per existence query; keeps the query string well under URL limits.
const EXISTENCE_BATCH: usize = 100;

pub struct HttpTreeStore {
    http: Client,
    base_url: String,
}

impl HttpTreeStore {
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .context("API key is not a valid header value")?,
        );
        headers.insert(
            "X-Role",
            HeaderValue::from_str(&config.role).context("role is not a valid header value")?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::new(&ClientConfig::from_env()?)
    }

    fn url(&self, action: &str) -> String {
        endpoint_url(&self.base_url, action)
    }

    /// Send and unwrap `data`. `Ok(None)` on 404.
    async fn send(&self, request: RequestBuilder, action: &str) -> Result<Option<Value>> {
        let response = request
            .send()
            .await
            .with_context(|| format!("{action}: request failed"))
            .map_err(TreeError::transport)?;

        let status = response.status();
        tracing::debug!(target: "uitree.http", action, status = status.as_u16(), "response");

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .with_context(|| format!("{action}: reading body failed"))
            .map_err(TreeError::transport)?;
        if !status.is_success() {
            return Err(TreeError::TransportFailure(format!(
                "{action}: HTTP {status}: {}",
                error_message(&body)
            )));
        }
        if body.trim().is_empty() {
            return Ok(Some(Value::Null));
        }
        let parsed: Value = serde_json::from_str(&body)
            .with_context(|| format!("{action}: response is not JSON"))
            .map_err(TreeError::transport)?;
        Ok(Some(unwrap_data(parsed)))
    }

    async fn get(&self, action: &str, query: &[(&str, &str)]) -> Result<Option<Value>> {
        self.send(self.http.get(self.url(action)).query(query), action)
            .await
    }

    async fn post(&self, action: &str, query: &[(&str, &str)], body: &Value) -> Result<Option<Value>> {
        self.send(self.http.post(self.url(action)).query(query).json(body), action)
            .await
    }

    async fn json_schema(&self, id: &str) -> Result<Option<TreeNode>> {
        let data = self
            .get(&format!("uiSchemas:getJsonSchema/{id}"), &[])
            .await?;
        match data {
            Some(data) => schema_from_data(&data),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RemoteTreeStore for HttpTreeStore {
    async fn get_node(&self, id: &str) -> Result<Option<TreeNode>> {
        Ok(self.json_schema(id).await?.map(|n| n.shallow()))
    }

    async fn get_subtree(&self, id: &str) -> Result<Option<TreeNode>> {
        self.json_schema(id).await
    }

    async fn existing_ids(&self, ids: &[&str]) -> Result<Vec<NodeId>> {
        let mut found = Vec::new();
        for batch in ids.chunks(EXISTENCE_BATCH) {
            let filter = uid_filter(batch);
            let action = format!("{SCHEMAS_TABLE}:list");
            let data = self
                .get(&action, &[("filter", filter.as_str()), ("paginate", "false")])
                .await?
                .ok_or_else(|| TreeError::TransportFailure(format!("{action}: not found")))?;
            found.extend(
                rows_from_data(SCHEMAS_TABLE, data)?
                    .iter()
                    .filter_map(|row| row.get(X_UID)?.as_str())
                    .map(str::to_string),
            );
        }
        tracing::debug!(target: "uitree.http", asked = ids.len(), found = found.len(), "existing ids");
        Ok(found)
    }

    async fn insert_root(&self, subtree: &TreeNode) -> Result<NodeId> {
        let data = self
            .post("uiSchemas:insert", &[], &subtree.to_schema())
            .await?;
        Ok(inserted_root_id(data.as_ref(), subtree))
    }

    async fn insert_adjacent(
        &self,
        anchor_id: &str,
        position: InsertPosition,
        subtree: &TreeNode,
    ) -> Result<NodeId> {
        let body = json!({ "schema": subtree.to_schema() });
        let data = self
            .post(
                &format!("uiSchemas:insertAdjacent/{anchor_id}"),
                &[("position", position.as_wire())],
                &body,
            )
            .await?
            .ok_or_else(|| TreeError::AnchorNotFound(anchor_id.to_string()))?;
        Ok(inserted_root_id(Some(&data), subtree))
    }

    async fn patch_node(&self, id: &str, patch: &NodePatch) -> Result<()> {
        self.post("uiSchemas:patch", &[], &patch.to_schema_patch(id))
            .await?
            .map(|_| ())
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))
    }

    async fn remove_node(&self, id: &str) -> Result<()> {
        self.post(&format!("uiSchemas:remove/{id}"), &[], &json!({}))
            .await?;
        Ok(())
    }

    async fn list_rows(&self, table: &str) -> Result<Vec<Row>> {
        let data = self
            .get(&format!("{table}:list"), &[("paginate", "false")])
            .await?
            .ok_or_else(|| TreeError::TransportFailure(format!("unknown table: {table}")))?;
        rows_from_data(table, data)
    }

    async fn create_route(&self, fields: &NewRoute) -> Result<RouteId> {
        let body = serde_json::to_value(fields).context("encoding route").map_err(TreeError::transport)?;
        let data = self
            .post(&format!("{ROUTES_TABLE}:create"), &[], &body)
            .await?
            .unwrap_or(Value::Null);
        route_id_from_data(&data)
    }

    async fn update_route(&self, id: RouteId, fields: &RouteUpdate) -> Result<()> {
        let body = serde_json::to_value(fields).context("encoding route").map_err(TreeError::transport)?;
        let key = id.to_string();
        self.post(&format!("{ROUTES_TABLE}:update"), &[("filterByTk", key.as_str())], &body)
            .await?
            .map(|_| ())
            .ok_or(TreeError::RouteNotFound(id))
    }

    async fn destroy_route(&self, id: RouteId) -> Result<()> {
        let key = id.to_string();
        self.post(&format!("{ROUTES_TABLE}:destroy"), &[("filterByTk", key.as_str())], &json!({}))
            .await?;
        Ok(())
    }
}

/// `{base}/{action}` with exactly one slash between.
pub fn endpoint_url(base_url: &str, action: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        action.trim_start_matches('/')
    )
}

/// The `data` member of a response envelope, or the body itself when it has
/// none.
pub fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut obj) if obj.contains_key("data") => obj.remove("data").unwrap_or(Value::Null),
        other => other,
    }
}

/// `errors[0].message` of an error body, else the body text truncated.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("errors")?
                .get(0)?
                .get("message")?
                .as_str()
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

/// `uiSchemas:list` filter matching any of `ids`.
pub fn uid_filter(ids: &[&str]) -> String {
    json!({ X_UID: { "$in": ids } }).to_string()
}

/// A schema response; an empty object or one without `x-uid` means absent.
pub fn schema_from_data(data: &Value) -> Result<Option<TreeNode>> {
    match data {
        Value::Object(obj) if obj.contains_key(X_UID) => TreeNode::from_schema(data).map(Some),
        Value::Object(_) | Value::Null => Ok(None),
        other => Err(TreeError::TransportFailure(format!(
            "unexpected schema payload: {other}"
        ))),
    }
}

fn inserted_root_id(data: Option<&Value>, subtree: &TreeNode) -> NodeId {
    data.and_then(|d| d.get(X_UID))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| subtree.id.clone())
}

pub fn rows_from_data(table: &str, data: Value) -> Result<Vec<Row>> {
    match data {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(TreeError::TransportFailure(format!(
                    "{table}: row is not an object: {other}"
                ))),
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(TreeError::TransportFailure(format!(
            "{table}: expected a row list, got {other}"
        ))),
    }
}

pub fn route_id_from_data(data: &Value) -> Result<RouteId> {
    data.get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| TreeError::TransportFailure(format!("route create returned no id: {data}")))
}
