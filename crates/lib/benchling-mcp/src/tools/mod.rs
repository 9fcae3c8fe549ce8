//! MCP tool modules.
//!
//! Tools are grouped by upstream: warehouse schema and SQL, notebook entries
//! from the REST API, and (behind the `literature` feature) PubMed search.

pub mod notebook;
pub mod warehouse;
#[cfg(feature = "literature")]
pub mod literature;

/// Tools that exist only when literature search is enabled.
pub const LITERATURE_TOOLS: [&str; 2] = ["list_pubmed_papers", "get_pubmed_fulltext"];
