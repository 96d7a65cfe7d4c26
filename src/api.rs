//! HTTP backing store
//!
//! Reads the hosted MindMesh tables through their PostgREST interface
//! (`/rest/v1/<table>?select=..&col=in.(..)`) with reqwest.

use serde::de::DeserializeOwned;

use crate::error::LoadError;
use crate::graph::loader::{BackingStore, ResolvedScope, Scope};
use crate::graph::types::{EdgeRecord, NodeRecord, ProgramMeta, ProgramStructure};
use async_trait::async_trait;

const NODES_TABLE: &str = "mindmesh_nodes_global";
const EDGES_TABLE: &str = "mindmesh_edges_global";
const ITEMS_TABLE: &str = "mindmesh_items";
const USER_EDGES_TABLE: &str = "mindmesh_edges";
const DEGREES_TABLE: &str = "unsw_degrees_final";

const NODE_COLUMNS: &str = "key,label,uoc,faculty,school,level";
const EDGE_COLUMNS: &str = "from_key,to_key,edge_type,confidence,logic_type,group_id";
const DEGREE_COLUMNS: &str =
    "degree_code,program_name,faculty,uac_code,cricos_code,duration,source_url";

/// PostgREST client for the hosted tables
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

pub type HttpBackingStore = ApiClient;

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// GET `table` with PostgREST query parameters
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, LoadError> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let mut request = self.http.get(&url).query(params);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(LoadError::Backend(format!(
                "HTTP {} from {}",
                response.status(),
                table
            )));
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| LoadError::Decode(e.to_string()))
    }
}

/// PostgREST list literal: `("A","B")`
fn in_list(keys: &[String]) -> String {
    let quoted: Vec<String> = keys
        .iter()
        .map(|k| format!("\"{}\"", k.replace('"', "")))
        .collect();
    format!("({})", quoted.join(","))
}

#[async_trait]
impl BackingStore for ApiClient {
    async fn resolve_scope(&self, scope: &Scope) -> Result<ResolvedScope, LoadError> {
        match scope {
            Scope::NamedProgram { courses, .. } if !courses.is_empty() => {
                Ok(ResolvedScope::keys(courses.clone()))
            }
            Scope::NamedProgram { code, .. } => {
                // No list from the host: read it from the program structure
                let rows: Vec<ProgramStructure> = self
                    .select(
                        DEGREES_TABLE,
                        &[
                            ("select", "sections".to_string()),
                            ("degree_code", format!("eq.{code}")),
                            ("limit", "1".to_string()),
                        ],
                    )
                    .await?;
                let keys = rows.first().map(ProgramStructure::course_codes).unwrap_or_default();
                tracing::debug!(code = %code, courses = keys.len(), "resolved program structure");
                Ok(ResolvedScope::keys(keys))
            }
            Scope::UserItemSet { user_id, mesh_id } => {
                let owner = [
                    ("user_id", format!("eq.{user_id}")),
                    ("mesh_id", format!("eq.{mesh_id}")),
                ];

                let mut item_params = vec![("select", "item_type,item_key,title,metadata".to_string())];
                item_params.extend(owner.iter().cloned());
                let items: Vec<NodeRecord> = self.select(ITEMS_TABLE, &item_params).await?;

                let mut edge_params = vec![("select", "from_key,to_key,edge_type,confidence".to_string())];
                edge_params.extend(owner.iter().cloned());
                let edges: Vec<EdgeRecord> = self.select(USER_EDGES_TABLE, &edge_params).await?;

                Ok(ResolvedScope {
                    keys: items.iter().map(|i| i.key.clone()).collect(),
                    records: items,
                    edges: Some(edges),
                })
            }
        }
    }

    async fn fetch_nodes_by_keys(&self, keys: &[String]) -> Result<Vec<NodeRecord>, LoadError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.select(
            NODES_TABLE,
            &[
                ("select", NODE_COLUMNS.to_string()),
                ("key", format!("in.{}", in_list(keys))),
            ],
        )
        .await
    }

    async fn fetch_edges_both_endpoints_in(
        &self,
        keys: &[String],
    ) -> Result<Vec<EdgeRecord>, LoadError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let list = in_list(keys);
        self.select(
            EDGES_TABLE,
            &[
                ("select", EDGE_COLUMNS.to_string()),
                ("from_key", format!("in.{list}")),
                ("to_key", format!("in.{list}")),
            ],
        )
        .await
    }

    async fn fetch_edges_touching(&self, keys: &[String]) -> Result<Vec<EdgeRecord>, LoadError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let list = in_list(keys);
        self.select(
            EDGES_TABLE,
            &[
                ("select", EDGE_COLUMNS.to_string()),
                ("or", format!("(from_key.in.{list},to_key.in.{list})")),
            ],
        )
        .await
    }

    async fn fetch_program_meta(&self, code: &str) -> Result<Option<ProgramMeta>, LoadError> {
        let rows: Vec<ProgramMeta> = self
            .select(
                DEGREES_TABLE,
                &[
                    ("select", DEGREE_COLUMNS.to_string()),
                    ("degree_code", format!("eq.{code}")),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }
}
