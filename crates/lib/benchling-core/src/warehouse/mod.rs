//! Read-only access to the Benchling Warehouse.

pub mod describe;
pub mod overview;
mod postgres;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::{Map, Value};

pub use describe::{Relationship, TableColumn, TableInfo, describe_table};
pub use overview::{CatalogSnapshot, PageError, WarehouseOverview, assemble_overview};
pub use postgres::PgWarehouse;

/// One result row, keyed by column name.
pub type Row = Map<String, Value>;

pub type WarehouseFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, WarehouseError>> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    #[error("{0}")]
    Database(#[from] sqlx::Error),
    #[error("query exceeded the {}s timeout", .0.as_secs())]
    Timeout(Duration),
}

/// Query surface of the warehouse used by the tool handlers.
pub trait Warehouse: Send + Sync {
    /// Reads the catalog and assembles the table overview.
    fn overview(&self) -> WarehouseFuture<'_, WarehouseOverview>;

    /// Executes caller-supplied SQL inside a read-only session.
    fn run_query<'a>(&'a self, sql: &'a str) -> WarehouseFuture<'a, Vec<Row>>;
}
