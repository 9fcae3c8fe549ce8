use benchling_core::notebook::{EntryLookup, is_valid_entry_id};
use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::BenchlingMcp;
use crate::helpers;

/// Parameters for fetching notebook entries.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GetNotebookEntriesParams {
    /// Benchling notebook entry ids, e.g. `etr_1a2b3c4d`.
    #[serde(alias = "entry_ids")]
    pub ids: Vec<String>,
}

#[tool_router(router = tool_router_notebook, vis = "pub")]
impl BenchlingMcp {
    #[tool(
        description = "Retrieves the full JSON of one or more Benchling notebook entries by entry id (ids start with `etr_`). Each id is reported as found, not_found, or failed. If you don't have entry ids, find them with get_tables and run_query."
    )]
    async fn get_notebook_entry_by_id(
        &self,
        Parameters(params): Parameters<GetNotebookEntriesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        if params.ids.is_empty() {
            return Err(helpers::invalid_params("ids must contain at least one entry id"));
        }
        if let Some(bad) = params.ids.iter().find(|id| !is_valid_entry_id(id)) {
            return Err(helpers::invalid_params(format!(
                "invalid entry id `{bad}`; ids contain only letters, digits, `_` and `-`"
            )));
        }

        info!(count = params.ids.len(), "retrieving notebook entries");
        let lookups = self.notebook.lookup_entries(&params.ids).await;
        let found = lookups.iter().filter(|lookup| lookup.is_found()).count();
        let text = helpers::json_text(&lookups)?;

        if found == 0 {
            warn!(requested = lookups.len(), "no notebook entries retrieved");
            return Ok(CallToolResult::error(vec![Content::text(format!(
                "Error retrieving notebook entries: none of the requested entries could be retrieved\n{text}"
            ))]));
        }
        if found < lookups.len() {
            let missing: Vec<&str> = lookups
                .iter()
                .filter_map(|lookup| match lookup {
                    EntryLookup::Found { .. } => None,
                    EntryLookup::NotFound { id } | EntryLookup::Failed { id, .. } => Some(id.as_str()),
                })
                .collect();
            info!(?missing, "some notebook entries were not retrieved");
        }
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::Router;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use rmcp::model::ErrorCode;
    use serde_json::{Value, json};

    use super::*;
    use crate::test_support::{FakeWarehouse, server, server_with, text};

    async fn entry(Path(id): Path<String>) -> Response {
        if id == "etr_1" {
            axum::Json(json!({"entry": {"id": "etr_1", "name": "Plasmid prep"}})).into_response()
        } else {
            StatusCode::NOT_FOUND.into_response()
        }
    }

    async fn spawn_benchling() -> SocketAddr {
        let router = Router::new().route("/api/v2/entries/:id", get(entry));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake benchling");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve fake benchling");
        });
        addr
    }

    fn params(ids: &[&str]) -> Parameters<GetNotebookEntriesParams> {
        Parameters(GetNotebookEntriesParams {
            ids: ids.iter().map(ToString::to_string).collect(),
        })
    }

    #[tokio::test]
    async fn partial_success_is_not_an_error() {
        let addr = spawn_benchling().await;
        let server = server_with(
            Arc::new(FakeWarehouse::default()),
            &format!("http://{addr}/api/v2"),
        );
        let result = server
            .get_notebook_entry_by_id(params(&["etr_1", "etr_2"]))
            .await
            .expect("tool result");

        assert_ne!(result.is_error, Some(true));
        let lookups: Value = serde_json::from_str(&text(&result)).expect("json");
        assert_eq!(
            lookups,
            json!([
                {"status": "found", "id": "etr_1", "entry": {"id": "etr_1", "name": "Plasmid prep"}},
                {"status": "not_found", "id": "etr_2"}
            ])
        );
    }

    #[tokio::test]
    async fn all_missing_is_flagged() {
        let addr = spawn_benchling().await;
        let server = server_with(
            Arc::new(FakeWarehouse::default()),
            &format!("http://{addr}/api/v2"),
        );
        let result = server
            .get_notebook_entry_by_id(params(&["etr_8", "etr_9"]))
            .await
            .expect("tool result");
        assert_eq!(result.is_error, Some(true));
        assert!(text(&result).starts_with("Error retrieving notebook entries"));
    }

    #[tokio::test]
    async fn empty_and_malformed_ids_are_rejected() {
        let server = server();
        let err = server.get_notebook_entry_by_id(params(&[])).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);

        let err = server
            .get_notebook_entry_by_id(params(&["etr_1", "../admin"]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert!(err.message.contains("../admin"));
    }

    #[test]
    fn entry_ids_alias_is_accepted() {
        let params: GetNotebookEntriesParams =
            serde_json::from_value(json!({"entry_ids": ["etr_1"]})).expect("alias");
        assert_eq!(params.ids, vec!["etr_1"]);
    }
}
