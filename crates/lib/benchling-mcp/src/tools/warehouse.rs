use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::BenchlingMcp;
use crate::helpers;

/// Parameters for listing warehouse tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GetTablesParams {
    /// Index of the first table to list. Use the end index of the previous page plus one
    /// to continue a truncated listing.
    #[serde(default)]
    pub start_index: Option<usize>,
}

/// Parameters for running a warehouse query.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RunQueryParams {
    /// PostgreSQL statement to execute.
    #[serde(alias = "query")]
    pub sql: String,
}

#[tool_router(router = tool_router_warehouse, vis = "pub")]
impl BenchlingMcp {
    #[tool(
        description = "Lists all tables in the Benchling Warehouse with their columns, types, sample values, and relationships. Use this to understand the schema before constructing a query. The response is paged; pass start_index to continue. All id columns are varchar unless otherwise specified."
    )]
    async fn get_tables(
        &self,
        Parameters(params): Parameters<GetTablesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let start_index = params.start_index.unwrap_or(0);
        let overview = match self.warehouse_overview().await {
            Ok(overview) => overview,
            Err(err) => {
                error!(error = %err, "failed to load warehouse overview");
                return Ok(helpers::tool_failure("Database error", &err));
            }
        };
        let page = overview
            .render_page(start_index, self.settings.response_budget())
            .map_err(|err| helpers::invalid_params(err.to_string()))?;
        info!(start_index, total = overview.len(), "returning warehouse tables");
        Ok(CallToolResult::success(vec![Content::text(page)]))
    }

    #[tool(
        description = "Runs a read-only PostgreSQL query on the Benchling Warehouse and returns the rows as JSON. Use the exact table and column names from get_tables: keep the \"$raw\" table suffix and any \"$\" in column names. Notebook entries live in the entry table; who performed an action is usually in the principal table."
    )]
    async fn run_query(
        &self,
        Parameters(params): Parameters<RunQueryParams>,
    ) -> Result<CallToolResult, ErrorData> {
        if params.sql.trim().is_empty() {
            return Err(helpers::invalid_params("sql cannot be empty"));
        }
        info!("executing warehouse query");
        match self.warehouse.run_query(&params.sql).await {
            Ok(rows) => {
                info!(rows = rows.len(), "query returned rows");
                helpers::json_success(&rows)
            }
            Err(err) => {
                error!(error = %err, "warehouse query failed");
                Ok(helpers::tool_failure("Database error", &err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use rmcp::model::ErrorCode;
    use serde_json::json;

    use super::*;
    use crate::test_support::{FakeWarehouse, server, server_with, text};

    #[tokio::test]
    async fn lists_exactly_the_warehouse_tables() {
        let result = server()
            .get_tables(Parameters(GetTablesParams::default()))
            .await
            .expect("get_tables");
        let page = text(&result);
        assert_ne!(result.is_error, Some(true));
        assert!(page.starts_with("The available tables (indices 0 to 1 out of 2) are:"));
        assert_eq!(page.matches("<table>").count(), 2);
        assert!(page.contains("acme.a\n"));
        assert!(page.contains("acme.b\n"));
    }

    #[tokio::test]
    async fn overview_is_read_once() {
        let warehouse = Arc::new(FakeWarehouse::default());
        let server = server_with(warehouse.clone(), "http://127.0.0.1:9/api/v2");
        for _ in 0..3 {
            server
                .get_tables(Parameters(GetTablesParams::default()))
                .await
                .expect("get_tables");
        }
        assert_eq!(warehouse.overview_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn start_index_past_end_is_invalid() {
        let err = server()
            .get_tables(Parameters(GetTablesParams {
                start_index: Some(5),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn select_one_returns_one_row() {
        let result = server()
            .run_query(Parameters(RunQueryParams {
                sql: "SELECT 1".to_string(),
            }))
            .await
            .expect("run_query");
        let rows: serde_json::Value = serde_json::from_str(&text(&result)).expect("json rows");
        assert_eq!(rows, json!([{"?column?": 1}]));
    }

    #[tokio::test]
    async fn driver_errors_become_tool_errors() {
        let result = server()
            .run_query(Parameters(RunQueryParams {
                sql: "SELEC 1".to_string(),
            }))
            .await
            .expect("tool result");
        assert_eq!(result.is_error, Some(true));
        assert!(text(&result).starts_with("Database error: "));
        assert!(text(&result).contains("SELEC"));
    }

    #[tokio::test]
    async fn blank_sql_is_invalid() {
        let err = server()
            .run_query(Parameters(RunQueryParams {
                sql: "  ".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[test]
    fn query_alias_is_accepted() {
        let params: RunQueryParams =
            serde_json::from_value(json!({"query": "SELECT 1"})).expect("alias");
        assert_eq!(params.sql, "SELECT 1");
    }
}
