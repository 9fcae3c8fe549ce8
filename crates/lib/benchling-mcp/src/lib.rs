//! MCP server implementation for benchling-mcp.
//!
//! This crate wires the warehouse, notebook and literature clients into rmcp
//! tool handlers and exposes the stdio runner used by the daemon.

mod helpers;
mod tools;
pub mod server;

use std::sync::Arc;

use benchling_core::Settings;
use benchling_core::notebook::BenchlingClient;
use benchling_core::warehouse::{Warehouse, WarehouseError, WarehouseOverview};
use rmcp::{
    ErrorData,
    RoleServer,
    ServerHandler,
    handler::server::tool::{ToolCallContext, ToolRouter},
};
use rmcp::model::{
    CallToolRequestParams,
    CallToolResult,
    ListToolsResult,
    PaginatedRequestParams,
    ServerCapabilities,
    ServerInfo,
};
use rmcp::service::RequestContext;
use tokio::sync::OnceCell;
use tracing::debug;

#[cfg(feature = "literature")]
use benchling_core::literature::PubMedClient;

pub use tools::LITERATURE_TOOLS;
pub use tools::notebook::GetNotebookEntriesParams;
pub use tools::warehouse::{GetTablesParams, RunQueryParams};
#[cfg(feature = "literature")]
pub use tools::literature::{DateRangeParams, GetPubmedFulltextParams, ListPubmedPapersParams, SortOrder};

/// Flag that enables the literature tools.
pub const LITERATURE_FLAG: &str = "--enable-literature-search";

const SERVER_INSTRUCTIONS: &str = r"benchling-mcp answers questions about a Benchling tenant through read-only tools.

Workflow:
1. Call `get_tables` to learn the warehouse schema. Large schemas are paged; pass the next
   `start_index` to continue listing.
2. Call `run_query` with PostgreSQL built from the exact table and column names returned by
   `get_tables` (keep the `$raw` table suffix and any `$` in column names).
3. Call `get_notebook_entry_by_id` with entry ids (they start with `etr_`) to read notebook
   contents. Find entry ids first by querying the `entry$raw` table.

Notes:
- Connections are read-only; statements that write are rejected.
- Who performed an action usually lives in the `principal$raw` table.
- When literature search is enabled, `list_pubmed_papers` finds PubMed papers and
  `get_pubmed_fulltext` retrieves the best available text for one of them.";

/// MCP server wrapper around the Benchling clients and tool routers.
#[derive(Clone)]
pub struct BenchlingMcp {
    tool_router: ToolRouter<Self>,
    settings: Arc<Settings>,
    warehouse: Arc<dyn Warehouse>,
    overview: Arc<OnceCell<Arc<WarehouseOverview>>>,
    notebook: Arc<BenchlingClient>,
    #[cfg(feature = "literature")]
    literature: Option<Arc<PubMedClient>>,
}

impl BenchlingMcp {
    /// Creates a server exposing the warehouse and notebook tools.
    #[must_use]
    pub fn new(
        settings: Arc<Settings>,
        warehouse: Arc<dyn Warehouse>,
        notebook: BenchlingClient,
    ) -> Self {
        Self {
            tool_router: Self::tool_router_warehouse() + Self::tool_router_notebook(),
            settings,
            warehouse,
            overview: Arc::new(OnceCell::new()),
            notebook: Arc::new(notebook),
            #[cfg(feature = "literature")]
            literature: None,
        }
    }

    /// Adds the literature tools backed by `client`.
    #[cfg(feature = "literature")]
    #[must_use]
    pub fn with_literature(mut self, client: PubMedClient) -> Self {
        self.literature = Some(Arc::new(client));
        self.tool_router = Self::tool_router_warehouse()
            + Self::tool_router_notebook()
            + Self::tool_router_literature();
        self
    }

    /// Names of the registered tools, sorted.
    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the catalog overview, reading it from the warehouse on first use.
    pub(crate) async fn warehouse_overview(&self) -> Result<Arc<WarehouseOverview>, WarehouseError> {
        self.overview
            .get_or_try_init(|| async { self.warehouse.overview().await.map(Arc::new) })
            .await
            .cloned()
    }

    /// Rejects calls to tools that are unknown or not enabled in this session.
    fn ensure_routable(&self, name: &str) -> Result<(), ErrorData> {
        if self.tool_router.has_route(name) {
            return Ok(());
        }
        if LITERATURE_TOOLS.contains(&name) {
            return Err(helpers::invalid_request(format!(
                "{name} is disabled; restart the server with {LITERATURE_FLAG} \
                 (or ENABLE_LITERATURE_SEARCH=true) to use the literature tools"
            )));
        }
        Err(helpers::invalid_params(format!("tool not found: {name}")))
    }
}

impl ServerHandler for BenchlingMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(self.tool_router.list_all()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        self.ensure_routable(&request.name)?;
        debug!(tool = %request.name, "dispatching tool call");
        let tcc = ToolCallContext::new(self, request, context);
        self.tool_router.call(tcc).await
    }
}
