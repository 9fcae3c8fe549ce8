use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use sqlx::postgres::types::{Oid, PgInterval};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgTypeInfo, PgTypeKind};
use sqlx::types::{BigDecimal, Uuid};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use tracing::{debug, info, warn};

use super::overview::{
    CatalogSnapshot, EntitySampleRow, RelationshipRow, SchemaFieldRow, SchemaRow,
    WarehouseOverview, assemble_overview,
};
use super::{Row, Warehouse, WarehouseError, WarehouseFuture};
use crate::settings::{WarehouseSettings, mask_connection_string};

const TABLES_SQL: &str = "SELECT table_name::text FROM information_schema.tables \
     WHERE table_schema = $1 AND table_type <> 'VIEW' ORDER BY table_name";
const COLUMNS_SQL: &str = "SELECT table_name::text, column_name::text, data_type::text \
     FROM information_schema.columns WHERE table_schema = $1 \
     ORDER BY table_name, ordinal_position";

/// Lets the server-side `statement_timeout` fire first so the connection stays usable.
const CLIENT_DEADLINE_GRACE: Duration = Duration::from_secs(1);

/// Warehouse backed by a pooled PostgreSQL connection.
#[derive(Debug, Clone)]
pub struct PgWarehouse {
    pool: PgPool,
    organization_id: String,
    query_timeout: Duration,
}

impl PgWarehouse {
    /// Opens the pool and verifies connectivity with `SELECT 1`.
    ///
    /// Every pooled connection starts with read-only transactions, the
    /// organization schema as `search_path`, and a server-side statement timeout.
    ///
    /// # Errors
    /// Returns an error if the connection string is invalid or the warehouse is unreachable.
    pub async fn connect(settings: &WarehouseSettings) -> Result<Self, WarehouseError> {
        let options: PgConnectOptions = settings.connection.parse()?;
        let options = options.options(session_options(
            &settings.organization_id,
            settings.query_timeout,
        ));

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect_with(options)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;
        info!(
            warehouse = %mask_connection_string(&settings.connection),
            organization = %settings.organization_id,
            "connected to warehouse"
        );

        Ok(Self {
            pool,
            organization_id: settings.organization_id.clone(),
            query_timeout: settings.query_timeout,
        })
    }

    /// Runs caller SQL in a read-only transaction that is always rolled back,
    /// so session-level `SET`s never outlive the call.
    async fn run_isolated(&self, sql: &str) -> Result<Vec<PgRow>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY").execute(&mut *tx).await?;
        let rows = sqlx::query(sql).persistent(false).fetch_all(&mut *tx).await?;
        tx.rollback().await?;
        Ok(rows)
    }

    async fn read_catalog(&self) -> Result<CatalogSnapshot, WarehouseError> {
        let org = self.organization_id.as_str();
        let quoted = quote_identifier(org);

        let tables: Vec<(String,)> = sqlx::query_as(TABLES_SQL)
            .bind(org)
            .fetch_all(&self.pool)
            .await?;
        let columns: Vec<(String, String, String)> = sqlx::query_as(COLUMNS_SQL)
            .bind(org)
            .fetch_all(&self.pool)
            .await?;

        let schemas = self
            .metadata::<(String, String, Option<String>)>(
                "schema$raw",
                &format!(
                    "SELECT id::text, system_name::text, schema_type::text FROM {quoted}.\"schema$raw\""
                ),
            )
            .await
            .into_iter()
            .map(|(id, system_name, schema_type)| SchemaRow {
                id,
                system_name,
                schema_type,
            })
            .collect();

        let schema_fields = self
            .metadata::<(String, String, Option<String>, bool, Option<String>)>(
                "schema_field$raw",
                &format!(
                    "SELECT schema_id::text, system_name::text, name::text, \
                     coalesce(is_multi, false)::bool, tooltip::text \
                     FROM {quoted}.\"schema_field$raw\" WHERE schema_id IS NOT NULL"
                ),
            )
            .await
            .into_iter()
            .map(|(schema_id, system_name, name, is_multi, tooltip)| SchemaFieldRow {
                schema_id,
                system_name,
                name,
                is_multi,
                tooltip,
            })
            .collect();

        let samples = self
            .metadata::<(String, String, Option<String>, Option<String>)>(
                "entity$raw",
                &format!(
                    "WITH ranked AS ( \
                       SELECT id, name, file_registry_id, schema_id, \
                         ROW_NUMBER() OVER (PARTITION BY schema_id ORDER BY created_at DESC) AS rn \
                       FROM {quoted}.\"entity$raw\" \
                       WHERE schema_id IS NOT NULL AND file_registry_id IS NOT NULL) \
                     SELECT schema_id::text, id::text, name::text, file_registry_id::text \
                     FROM ranked WHERE rn <= 3"
                ),
            )
            .await
            .into_iter()
            .map(|(schema_id, id, name, file_registry_id)| EntitySampleRow {
                schema_id,
                id,
                name,
                file_registry_id,
            })
            .collect();

        let relationships = self
            .metadata::<(String, String, String)>(
                "field_definition$raw",
                &format!(
                    "SELECT schema_id::text, system_name::text, target_schema_id::text \
                     FROM {quoted}.\"field_definition$raw\" \
                     WHERE schema_id IS NOT NULL AND target_schema_id IS NOT NULL"
                ),
            )
            .await
            .into_iter()
            .map(|(schema_id, system_name, target_schema_id)| RelationshipRow {
                schema_id,
                system_name,
                target_schema_id,
            })
            .collect();

        Ok(CatalogSnapshot {
            org_prefix: self.organization_id.clone(),
            tables: tables.into_iter().map(|(name,)| name).collect(),
            columns,
            schemas,
            schema_fields,
            samples,
            relationships,
        })
    }

    /// Reads an optional Benchling metadata table; a failure yields no rows.
    async fn metadata<T>(&self, table: &str, sql: &str) -> Vec<T>
    where
        T: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
    {
        match sqlx::query_as::<_, T>(sql).fetch_all(&self.pool).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(table, error = %err, "warehouse metadata unavailable; continuing without it");
                Vec::new()
            }
        }
    }
}

impl Warehouse for PgWarehouse {
    fn overview(&self) -> WarehouseFuture<'_, WarehouseOverview> {
        Box::pin(async move {
            let snapshot = self.read_catalog().await?;
            let overview = assemble_overview(&snapshot);
            info!(tables = overview.len(), "loaded warehouse overview");
            Ok(overview)
        })
    }

    fn run_query<'a>(&'a self, sql: &'a str) -> WarehouseFuture<'a, Vec<Row>> {
        Box::pin(async move {
            let deadline = self.query_timeout + CLIENT_DEADLINE_GRACE;
            let rows = tokio::time::timeout(deadline, self.run_isolated(sql))
                .await
                .map_err(|_| WarehouseError::Timeout(self.query_timeout))??;
            debug!(rows = rows.len(), "query finished");
            Ok(rows.iter().map(row_to_json).collect())
        })
    }
}

/// Startup parameters applied to every pooled connection.
fn session_options(organization_id: &str, statement_timeout: Duration) -> [(&'static str, String); 3] {
    [
        ("default_transaction_read_only", "on".to_string()),
        (
            "search_path",
            escape_option_value(&quote_identifier(organization_id)),
        ),
        ("statement_timeout", statement_timeout.as_millis().to_string()),
    ]
}

/// Backslash-escapes whitespace for the libpq `options` startup parameter.
fn escape_option_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == '\\' || ch.is_whitespace() {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn row_to_json(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .map(|column| {
            let value = decode_column(row, column.ordinal(), column.type_info());
            (column.name().to_string(), value)
        })
        .collect()
}

fn decode_column(row: &PgRow, index: usize, type_info: &PgTypeInfo) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    let type_name = type_info.name();
    let decoded: Result<Value, sqlx::Error> = match type_name {
        "BOOL" => row.try_get::<bool, _>(index).map(Value::from),
        "INT2" => row.try_get::<i16, _>(index).map(Value::from),
        "INT4" => row.try_get::<i32, _>(index).map(Value::from),
        "INT8" => row.try_get::<i64, _>(index).map(Value::from),
        "FLOAT4" => row.try_get::<f32, _>(index).map(|v| Value::from(f64::from(v))),
        "FLOAT8" => row.try_get::<f64, _>(index).map(Value::from),
        "OID" => row.try_get::<Oid, _>(index).map(|oid| Value::from(oid.0)),
        "NUMERIC" => row
            .try_get::<BigDecimal, _>(index)
            .map(|v| Value::String(v.to_string())),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(index)
            .map(|v| Value::String(v.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(index)
            .map(|v| Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "DATE" => row
            .try_get::<NaiveDate, _>(index)
            .map(|v| Value::String(v.to_string())),
        "TIME" => row
            .try_get::<NaiveTime, _>(index)
            .map(|v| Value::String(v.to_string())),
        "INTERVAL" => row
            .try_get::<PgInterval, _>(index)
            .map(|v| Value::String(format_interval(&v))),
        "UUID" => row
            .try_get::<Uuid, _>(index)
            .map(|v| Value::String(v.to_string())),
        "BYTEA" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|v| Value::String(hex_bytes(&v))),
        "BOOL[]" => row.try_get::<Vec<bool>, _>(index).map(Value::from),
        "INT2[]" => row.try_get::<Vec<i16>, _>(index).map(Value::from),
        "INT4[]" => row.try_get::<Vec<i32>, _>(index).map(Value::from),
        "INT8[]" => row.try_get::<Vec<i64>, _>(index).map(Value::from),
        "FLOAT8[]" => row.try_get::<Vec<f64>, _>(index).map(Value::from),
        "NUMERIC[]" => row
            .try_get::<Vec<BigDecimal>, _>(index)
            .map(|v| strings(v.iter().map(ToString::to_string))),
        "UUID[]" => row
            .try_get::<Vec<Uuid>, _>(index)
            .map(|v| strings(v.iter().map(ToString::to_string))),
        "TIMESTAMPTZ[]" => row
            .try_get::<Vec<DateTime<Utc>>, _>(index)
            .map(|v| strings(v.iter().map(DateTime::to_rfc3339))),
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => {
            row.try_get::<Vec<String>, _>(index).map(Value::from)
        }
        // Enum labels travel as their text in the binary protocol.
        _ if matches!(type_info.kind(), PgTypeKind::Enum(_)) => row
            .try_get_unchecked::<String, _>(index)
            .map(Value::String),
        _ => row.try_get::<String, _>(index).map(Value::String),
    };

    decoded.unwrap_or_else(|err| {
        debug!(column = index, type_name, error = %err, "column type has no JSON mapping");
        Value::String(format!("<unsupported type {type_name}>"))
    })
}

fn strings(values: impl Iterator<Item = String>) -> Value {
    Value::Array(values.map(Value::String).collect())
}

/// `bytea` in PostgreSQL's hex output format.
fn hex_bytes(bytes: &[u8]) -> String {
    bytes.iter().fold(String::from("\\x"), |mut hex, byte| {
        let _ = write!(hex, "{byte:02x}");
        hex
    })
}

/// Formats an interval the way PostgreSQL prints it, e.g. `1 mon 2 days 03:04:05.5`.
fn format_interval(interval: &PgInterval) -> String {
    let unit = |count: i32, singular: &str| {
        if count.abs() == 1 {
            format!("{count} {singular}")
        } else {
            format!("{count} {singular}s")
        }
    };

    let mut parts = Vec::new();
    if interval.months != 0 {
        parts.push(unit(interval.months, "mon"));
    }
    if interval.days != 0 {
        parts.push(unit(interval.days, "day"));
    }
    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let micros = interval.microseconds.unsigned_abs();
        let secs = micros / 1_000_000;
        let fraction = micros % 1_000_000;
        let mut time = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3_600,
            secs / 60 % 60,
            secs % 60
        );
        if fraction != 0 {
            let digits = format!("{fraction:06}");
            time.push('.');
            time.push_str(digits.trim_end_matches('0'));
        }
        parts.push(time);
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_options_are_read_only_and_scoped() {
        assert_eq!(
            session_options("acme", Duration::from_secs(30)),
            [
                ("default_transaction_read_only", "on".to_string()),
                ("search_path", "\"acme\"".to_string()),
                ("statement_timeout", "30000".to_string()),
            ]
        );
    }

    #[test]
    fn option_values_escape_whitespace() {
        assert_eq!(escape_option_value("\"my org\""), "\"my\\ org\"");
        assert_eq!(escape_option_value("a\\b"), "a\\\\b");
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_identifier("acme"), "\"acme\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn bytea_renders_as_hex() {
        assert_eq!(hex_bytes(&[0x01, 0xab, 0xff]), "\\x01abff");
        assert_eq!(hex_bytes(&[]), "\\x");
    }

    #[test]
    fn intervals_render_like_postgres() {
        let interval = |months, days, microseconds| PgInterval {
            months,
            days,
            microseconds,
        };
        assert_eq!(format_interval(&interval(0, 1, 0)), "1 day");
        assert_eq!(format_interval(&interval(0, 1, 7_200_000_000)), "1 day 02:00:00");
        assert_eq!(format_interval(&interval(14, 3, 0)), "14 mons 3 days");
        assert_eq!(format_interval(&interval(0, 0, 1_500_000)), "00:00:01.5");
        assert_eq!(format_interval(&interval(0, 0, -90_000_000)), "-00:01:30");
        assert_eq!(format_interval(&interval(0, 0, 0)), "00:00:00");
    }
}
