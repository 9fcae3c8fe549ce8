//! Core types and services for benchling-mcp.
//!
//! This crate owns the immutable runtime settings, read-only access to the
//! Benchling Warehouse (including the LLM-oriented catalog overview), the
//! Benchling REST client for notebook entries, and, behind the `literature`
//! feature, the PubMed/PMC client.

pub mod notebook;
pub mod settings;
pub mod warehouse;

#[cfg(feature = "literature")]
pub mod literature;

pub use settings::Settings;
