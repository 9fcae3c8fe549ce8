//! Compact, LLM-oriented descriptions of warehouse tables.

use serde::Serialize;

const TRUNCATION_MARKER: &str = "[…]";
const AVERAGE_CHARS_PER_SAMPLE: usize = 20;

/// A column of a warehouse table, enriched with Benchling schema metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableColumn {
    pub name: String,
    pub data_type: String,
    pub is_multi: bool,
    pub display_name: Option<String>,
    pub tooltip: Option<String>,
    pub samples: Vec<String>,
}

impl TableColumn {
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_multi: false,
            display_name: None,
            tooltip: None,
            samples: Vec::new(),
        }
    }
}

/// A link from a column of one table to the `id` column of another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    pub from_table_name: String,
    pub from_column_name: String,
    pub target_table_name: String,
    pub target_column_name: String,
}

/// A warehouse table as presented to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub org_prefix: String,
    pub table_name: String,
    /// Benchling schema type, e.g. "run_schema" or "custom_entity".
    pub schema_name: Option<String>,
    pub columns: Vec<TableColumn>,
    pub relationships: Vec<Relationship>,
}

/// Renders a table with its columns, types, samples and outward relationships.
#[must_use]
pub fn describe_table(table: &TableInfo) -> String {
    let mut description = format!("{}.{}", table.org_prefix, table.table_name);
    if let Some(schema_name) = &table.schema_name {
        description.push_str(&format!(" (type: {schema_name})"));
    }

    description.push_str("\n\n<columns>\n");
    let columns: Vec<String> = table.columns.iter().map(format_column).collect();
    description.push_str(&columns.join("\n"));
    description.push_str("\n</columns>");

    let outward: Vec<&Relationship> = table
        .relationships
        .iter()
        .filter(|relationship| relationship.from_table_name == table.table_name)
        .collect();
    if !outward.is_empty() {
        description.push_str("\n\n<outward relationships>\n");
        for relationship in outward {
            description.push_str(&format!(
                "{} column has a relationship with the {} column from {}.{}\n",
                relationship.from_column_name,
                relationship.target_column_name,
                table.org_prefix,
                relationship.target_table_name,
            ));
        }
        description.push_str("\n</outward relationships>");
    }

    format!("<table>\n{}\n</table>", description.trim())
}

fn format_column(column: &TableColumn) -> String {
    let mut description = format!("{} ({})", column.name, short_data_type(&column.data_type));

    if let Some(display_name) = column.display_name.as_deref()
        && is_novel_display_name(&column.name, display_name)
    {
        description.push_str(&format!(" [also known as {display_name}]"));
    }

    if let Some(tooltip) = column.tooltip.as_deref()
        && !tooltip.is_empty()
    {
        description.push_str(&format!(" [description: {tooltip}]"));
    }

    let samples = select_samples(column);
    if !samples.is_empty() {
        description.push_str(" e.g. ");
        description.push_str(&samples.join(" | "));
    }

    description
}

fn short_data_type(data_type: &str) -> &str {
    if data_type.starts_with("character varying") {
        "varchar"
    } else if data_type.starts_with("timestamp without time zone") {
        "timestamp"
    } else {
        data_type
    }
}

fn is_novel_display_name(column_name: &str, display_name: &str) -> bool {
    let normalized = display_name.to_lowercase().replace([' ', '-'], "_");
    normalized != column_name
}

/// Columns named `id` or ending in `_id`, `_id$`, `_uuid`, `_uuid$` hold identifiers.
fn is_id_column(name: &str) -> bool {
    let lowered = name.to_lowercase();
    let stem = lowered.strip_suffix('$').unwrap_or(&lowered);
    lowered == "id" || stem.ends_with("_id") || stem.ends_with("_uuid")
}

fn select_samples(column: &TableColumn) -> Vec<String> {
    let samples = &column.samples;
    if samples.is_empty() {
        return Vec::new();
    }

    if column.is_multi || column.data_type.starts_with("json") {
        return truncate_all(shortest(samples, 4), 500);
    }
    if column.data_type.starts_with("timestamp") || column.data_type == "date" {
        return samples.iter().take(1).cloned().collect();
    }
    if column.data_type == "character varying" {
        if is_id_column(&column.name) {
            return samples.iter().take(2).cloned().collect();
        }
        let total_chars: usize = samples.iter().map(|sample| sample.chars().count()).sum();
        if total_chars > AVERAGE_CHARS_PER_SAMPLE * samples.len() {
            return truncate_all(shortest(samples, 2), 150);
        }
        return truncate_all(samples.iter().take(5).map(String::as_str).collect(), 50);
    }
    Vec::new()
}

fn shortest(samples: &[String], count: usize) -> Vec<&str> {
    let mut sorted: Vec<&str> = samples.iter().map(String::as_str).collect();
    sorted.sort_by_key(|sample| sample.chars().count());
    sorted.truncate(count);
    sorted
}

fn truncate_all(samples: Vec<&str>, limit: usize) -> Vec<String> {
    samples
        .into_iter()
        .map(|sample| truncate_sample(sample, limit))
        .collect()
}

/// Truncates to `limit` characters, marking the cut.
pub(crate) fn truncate_sample(sample: &str, limit: usize) -> String {
    match sample.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &sample[..cut]),
        None => sample.to_string(),
    }
}
