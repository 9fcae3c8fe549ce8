//! Daemon entry point for the Benchling MCP server.
//!
//! Loads `.env`, resolves configuration, connects to the warehouse, and serves
//! the MCP protocol over stdio.

mod config;
mod logging;

use std::sync::Arc;

use anyhow::Context;
use benchling_core::notebook::BenchlingClient;
use benchling_core::settings::mask_connection_string;
use benchling_core::warehouse::PgWarehouse;
use benchling_mcp::BenchlingMcp;
use benchling_mcp::server::serve_stdio;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv_error = config::load_dotenv();

    let settings = Arc::new(config::from_args()?);
    logging::init(settings.log)?;
    if let Some(err) = dotenv_error {
        warn!(error = %err, "ignoring unreadable .env file");
    }
    info!(
        organization_id = %settings.warehouse.organization_id,
        warehouse = %mask_connection_string(&settings.warehouse.connection),
        api_base_url = %settings.api.base_url,
        literature = settings.literature.enabled,
        "starting benchling-mcpd"
    );

    let warehouse = PgWarehouse::connect(&settings.warehouse)
        .await
        .context("failed to connect to the Benchling warehouse")?;
    let notebook =
        BenchlingClient::new(&settings.api).context("failed to build the Benchling API client")?;

    let server = BenchlingMcp::new(settings.clone(), Arc::new(warehouse), notebook);
    #[cfg(feature = "literature")]
    let server = if settings.literature.enabled {
        let client = benchling_core::literature::PubMedClient::new(&settings.literature)
            .context("failed to build the PubMed client")?;
        server.with_literature(client)
    } else {
        server
    };

    info!(tools = ?server.tool_names(), "serving MCP over stdio");
    serve_stdio(server)
        .await
        .map_err(|err| anyhow::anyhow!(err).context("MCP server stopped with an error"))
}
