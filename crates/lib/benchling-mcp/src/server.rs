//! MCP server runners for benchling-mcp.

use rmcp::serve_server;
use rmcp::transport::io::stdio;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

use crate::BenchlingMcp;

/// Serves the MCP server over an arbitrary byte stream pair until the peer disconnects.
///
/// # Errors
/// Returns any transport or server error.
pub async fn serve_io<R, W>(
    server: BenchlingMcp,
    reader: R,
    writer: W,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let running = serve_server(server, (reader, writer)).await?;
    let reason = running.waiting().await?;
    info!(?reason, "MCP session closed");
    Ok(())
}

/// Serves the MCP server over stdio.
///
/// # Errors
/// Returns any transport or server error.
pub async fn serve_stdio(server: BenchlingMcp) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (stdin, stdout) = stdio();
    serve_io(server, stdin, stdout).await
}
