//! Catalog overview of the organization's warehouse schema.
//!
//! The raw catalog rows are gathered by the warehouse implementation into a
//! [`CatalogSnapshot`]; [`assemble_overview`] joins them into per-table
//! descriptions without touching the database.

use std::collections::HashMap;

use serde::Serialize;

use super::describe::{Relationship, TableColumn, TableInfo, describe_table, truncate_sample};

/// Internal columns that are never meant to be queried.
pub const EXCLUDED_COLUMNS: [&str; 4] = ["_pkey", "_sync_key", "acl_resource_id", "source_id"];

const RAW_SUFFIX: &str = "$raw";

/// Row of `schema$raw`.
#[derive(Debug, Clone)]
pub struct SchemaRow {
    pub id: String,
    pub system_name: String,
    pub schema_type: Option<String>,
}

/// Row of `schema_field$raw`.
#[derive(Debug, Clone)]
pub struct SchemaFieldRow {
    pub schema_id: String,
    pub system_name: String,
    pub name: Option<String>,
    pub is_multi: bool,
    pub tooltip: Option<String>,
}

/// One recently created entity used to sample identifier and name columns.
#[derive(Debug, Clone)]
pub struct EntitySampleRow {
    pub schema_id: String,
    pub id: String,
    pub name: Option<String>,
    pub file_registry_id: Option<String>,
}

/// Row of `field_definition$raw` with a link target.
#[derive(Debug, Clone)]
pub struct RelationshipRow {
    pub schema_id: String,
    pub system_name: String,
    pub target_schema_id: String,
}

/// Raw catalog state collected from `information_schema` and Benchling metadata tables.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub org_prefix: String,
    /// Base table names in listing order.
    pub tables: Vec<String>,
    /// `(table_name, column_name, data_type)` in ordinal order.
    pub columns: Vec<(String, String, String)>,
    pub schemas: Vec<SchemaRow>,
    pub schema_fields: Vec<SchemaFieldRow>,
    pub samples: Vec<EntitySampleRow>,
    pub relationships: Vec<RelationshipRow>,
}

/// Every visible warehouse table, in listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarehouseOverview {
    pub tables: Vec<TableInfo>,
}

/// Failure to page through the overview.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    #[error("start_index {start_index} is out of range; there are {total} tables")]
    StartOutOfRange { start_index: usize, total: usize },
}

impl WarehouseOverview {
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Renders as many table descriptions as fit in `budget` characters,
    /// starting at `start_index`.
    ///
    /// A single table larger than the whole budget is cut to fit so that
    /// paging always advances.
    ///
    /// # Errors
    /// Returns [`PageError::StartOutOfRange`] when `start_index` is past the last table.
    pub fn render_page(&self, start_index: usize, budget: usize) -> Result<String, PageError> {
        let total = self.tables.len();
        if total == 0 && start_index == 0 {
            return Ok("No tables are available in the warehouse.".to_string());
        }
        if start_index >= total {
            return Err(PageError::StartOutOfRange { start_index, total });
        }

        let mut selected = Vec::new();
        let mut used = 0usize;
        for table in &self.tables[start_index..] {
            let description = describe_table(table);
            // two newlines separate consecutive tables
            let cost = description.chars().count() + 2;
            if used + cost > budget {
                if selected.is_empty() {
                    selected.push(truncate_sample(&description, budget.saturating_sub(2)));
                }
                break;
            }
            used += cost;
            selected.push(description);
        }

        let end_index = start_index + selected.len() - 1;
        Ok(format!(
            "The available tables (indices {start_index} to {end_index} out of {total}) are:\n\n<tables>\n{}\n</tables>\n",
            selected.join("\n\n")
        ))
    }
}

/// Joins catalog rows into per-table descriptions.
#[must_use]
pub fn assemble_overview(snapshot: &CatalogSnapshot) -> WarehouseOverview {
    let schemas_by_id: HashMap<&str, &SchemaRow> = snapshot
        .schemas
        .iter()
        .map(|schema| (schema.id.as_str(), schema))
        .collect();

    let mut fields: HashMap<&str, HashMap<&str, &SchemaFieldRow>> = HashMap::new();
    for field in &snapshot.schema_fields {
        fields
            .entry(field.schema_id.as_str())
            .or_default()
            .insert(field.system_name.as_str(), field);
    }

    let samples = collect_samples(&snapshot.samples);

    let mut relationships: HashMap<&str, Vec<&RelationshipRow>> = HashMap::new();
    for row in &snapshot.relationships {
        relationships.entry(row.schema_id.as_str()).or_default().push(row);
    }

    let mut columns: HashMap<&str, Vec<(&str, &str)>> = HashMap::new();
    for (table_name, column_name, data_type) in &snapshot.columns {
        columns
            .entry(table_name.as_str())
            .or_default()
            .push((column_name.as_str(), data_type.as_str()));
    }

    let tables = snapshot
        .tables
        .iter()
        .map(|table_name| {
            let system_name = table_name.replace(RAW_SUFFIX, "");
            let schema = snapshot
                .schemas
                .iter()
                .find(|schema| schema.system_name == system_name);
            let schema_id = schema.map(|schema| schema.id.as_str());
            let schema_fields = schema_id.and_then(|id| fields.get(id));
            let schema_samples = schema_id.and_then(|id| samples.get(id));

            let table_columns = columns
                .get(table_name.as_str())
                .into_iter()
                .flatten()
                .filter(|(name, _)| !EXCLUDED_COLUMNS.contains(name))
                .map(|&(name, data_type)| {
                    let field = schema_fields.and_then(|fields| fields.get(name));
                    TableColumn {
                        name: name.to_string(),
                        data_type: data_type.to_string(),
                        is_multi: field.is_some_and(|field| field.is_multi),
                        display_name: field.and_then(|field| field.name.clone()),
                        tooltip: field.and_then(|field| field.tooltip.clone()),
                        samples: schema_samples
                            .and_then(|samples| samples.get(name))
                            .cloned()
                            .unwrap_or_default(),
                    }
                })
                .collect();

            let table_relationships = schema_id
                .and_then(|id| relationships.get(id))
                .into_iter()
                .flatten()
                .filter_map(|row| {
                    // the target schema may not be visible to this organization
                    let target = schemas_by_id.get(row.target_schema_id.as_str())?;
                    Some(Relationship {
                        from_table_name: table_name.clone(),
                        from_column_name: row.system_name.clone(),
                        target_table_name: format!("{}{RAW_SUFFIX}", target.system_name),
                        target_column_name: "id".to_string(),
                    })
                })
                .collect();

            TableInfo {
                org_prefix: snapshot.org_prefix.clone(),
                table_name: table_name.clone(),
                schema_name: schema.and_then(|schema| schema.schema_type.clone()),
                columns: table_columns,
                relationships: table_relationships,
            }
        })
        .collect();

    WarehouseOverview { tables }
}

fn collect_samples(rows: &[EntitySampleRow]) -> HashMap<&str, HashMap<&'static str, Vec<String>>> {
    let mut samples: HashMap<&str, HashMap<&'static str, Vec<String>>> = HashMap::new();
    for row in rows {
        let by_column = samples.entry(row.schema_id.as_str()).or_default();
        by_column.entry("id").or_default().push(row.id.clone());
        if let Some(name) = &row.name {
            by_column.entry("name$").or_default().push(name.clone());
        }
        if let Some(registry_id) = &row.file_registry_id {
            by_column
                .entry("file_registry_id$")
                .or_default()
                .push(registry_id.clone());
        }
    }
    samples
}
