use std::convert::Infallible;
use std::time::Duration;

use benchling_core::Settings;
use benchling_core::settings::{
    ApiSettings, DEFAULT_EUTILS_BASE_URL, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_MAX_RESPONSE_CHARS,
    DEFAULT_PMC_OAI_URL, DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_WAREHOUSE_MAX_CONNECTIONS,
    LiteratureSettings, LogLevel, LogSettings, WarehouseSettings, normalize_api_base_url,
};
use clap::{ArgAction, Parser, ValueEnum, builder::BoolishValueParser};
use url::Url;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const MIN_RESPONSE_CHARS: usize = 1_000;

const WAREHOUSE_CONNECTION: &str = "BENCHLING_WAREHOUSE_CONNECTION";
const ORGANIZATION_ID: &str = "BENCHLING_ORGANIZATION_ID";
const API_KEY: &str = "BENCHLING_API_KEY";
const API_BASE_URL: &str = "BENCHLING_API_BASE_URL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
enum CliLogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl From<CliLogLevel> for LogLevel {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Debug => Self::Debug,
            CliLogLevel::Info => Self::Info,
            CliLogLevel::Warning => Self::Warning,
            CliLogLevel::Error => Self::Error,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "benchling-mcpd",
    version,
    about = "Benchling MCP server: warehouse SQL, notebook entries, and optional PubMed search over stdio."
)]
struct CliArgs {
    /// PostgreSQL URL of the Benchling Warehouse; must set sslmode=verify-ca or verify-full.
    #[arg(short = 'w', long, env = WAREHOUSE_CONNECTION)]
    warehouse_connection: Option<String>,

    /// Benchling organization id; also the warehouse schema name.
    #[arg(short = 'o', long, env = ORGANIZATION_ID)]
    organization_id: Option<String>,

    #[arg(long, env = API_KEY)]
    benchling_api_key: Option<String>,

    /// Tenant URL, e.g. https://acme.benchling.com (`/api/v2` is appended when missing).
    #[arg(long, env = API_BASE_URL)]
    benchling_base_url: Option<String>,

    /// Registers the PubMed tools. Accepts an optional true/1/t/y/yes value.
    #[arg(
        long,
        env = "ENABLE_LITERATURE_SEARCH",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = parse_truthy
    )]
    enable_literature_search: bool,

    #[arg(long, env = "NCBI_API_KEY")]
    ncbi_api_key: Option<String>,

    #[arg(
        long,
        env = "BENCHLING_LOG_LEVEL",
        value_enum,
        ignore_case = true,
        default_value = "INFO"
    )]
    log_level: CliLogLevel,

    #[arg(
        long,
        env = "BENCHLING_LOG_JSON",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    log_json: bool,

    #[arg(
        long,
        env = "BENCHLING_QUERY_TIMEOUT_SECS",
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS
    )]
    query_timeout_secs: u64,

    #[arg(
        long,
        env = "BENCHLING_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_HTTP_TIMEOUT_SECS
    )]
    http_timeout_secs: u64,

    #[arg(
        long,
        env = "BENCHLING_WAREHOUSE_MAX_CONNECTIONS",
        default_value_t = DEFAULT_WAREHOUSE_MAX_CONNECTIONS
    )]
    warehouse_max_connections: u32,

    #[arg(
        long,
        env = "BENCHLING_MAX_RESPONSE_CHARS",
        default_value_t = DEFAULT_MAX_RESPONSE_CHARS
    )]
    max_response_chars: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error(
        "literature search was requested but this build does not include the `literature` feature"
    )]
    LiteratureUnavailable,
}

/// Resolves command-line flags and environment variables into [`Settings`].
///
/// # Errors
/// Returns a [`ConfigError`] naming the first missing or invalid setting.
pub fn from_args() -> Result<Settings, ConfigError> {
    Settings::try_from(CliArgs::parse())
}

/// Loads `.env` from the working directory or its parents without overriding
/// variables that are already set. A missing file is not an error.
pub fn load_dotenv() -> Option<dotenvy::Error> {
    dotenv_failure(dotenvy::dotenv())
}

fn dotenv_failure<T>(result: Result<T, dotenvy::Error>) -> Option<dotenvy::Error> {
    result.err().filter(|err| !err.not_found())
}

/// Interprets a literature toggle value; anything not recognised as true disables it.
#[allow(clippy::unnecessary_wraps)]
fn parse_truthy(value: &str) -> Result<bool, Infallible> {
    Ok(matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "t" | "y" | "yes"
    ))
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.into(),
    }
}

fn validate_connection(raw: String) -> Result<String, ConfigError> {
    let url = Url::parse(&raw).map_err(|err| invalid(WAREHOUSE_CONNECTION, err.to_string()))?;
    if !matches!(url.scheme(), "postgres" | "postgresql") {
        return Err(invalid(
            WAREHOUSE_CONNECTION,
            format!("expected a postgres:// or postgresql:// URL, got `{}`", url.scheme()),
        ));
    }
    let sslmode = url
        .query_pairs()
        .find(|(key, _)| key == "sslmode")
        .map(|(_, value)| value.into_owned());
    match sslmode.as_deref() {
        Some("verify-ca" | "verify-full") => Ok(raw),
        Some(other) => Err(invalid(
            WAREHOUSE_CONNECTION,
            format!("sslmode must be verify-ca or verify-full, got `{other}`"),
        )),
        None => Err(invalid(
            WAREHOUSE_CONNECTION,
            "sslmode=verify-ca or sslmode=verify-full is required",
        )),
    }
}

fn positive_secs(secs: u64, name: &'static str) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(invalid(name, "must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

impl TryFrom<CliArgs> for Settings {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let connection = validate_connection(required(args.warehouse_connection, WAREHOUSE_CONNECTION)?)?;
        let organization_id = required(args.organization_id, ORGANIZATION_ID)?;
        let api_key = required(args.benchling_api_key, API_KEY)?;
        let base_url = normalize_api_base_url(&required(args.benchling_base_url, API_BASE_URL)?)
            .map_err(|reason| invalid(API_BASE_URL, reason))?;

        let query_timeout = positive_secs(args.query_timeout_secs, "BENCHLING_QUERY_TIMEOUT_SECS")?;
        let http_timeout = positive_secs(args.http_timeout_secs, "BENCHLING_HTTP_TIMEOUT_SECS")?;
        if args.warehouse_max_connections == 0 {
            return Err(invalid(
                "BENCHLING_WAREHOUSE_MAX_CONNECTIONS",
                "must be greater than zero",
            ));
        }
        if args.max_response_chars <= MIN_RESPONSE_CHARS {
            return Err(invalid(
                "BENCHLING_MAX_RESPONSE_CHARS",
                format!("must exceed {MIN_RESPONSE_CHARS}"),
            ));
        }
        if args.enable_literature_search && !cfg!(feature = "literature") {
            return Err(ConfigError::LiteratureUnavailable);
        }

        Ok(Self {
            warehouse: WarehouseSettings {
                connection,
                organization_id,
                query_timeout,
                connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
                max_connections: args.warehouse_max_connections,
            },
            api: ApiSettings {
                api_key,
                base_url,
                http_timeout,
            },
            literature: LiteratureSettings {
                enabled: args.enable_literature_search,
                eutils_base_url: DEFAULT_EUTILS_BASE_URL.to_string(),
                pmc_oai_url: DEFAULT_PMC_OAI_URL.to_string(),
                ncbi_api_key: args.ncbi_api_key.filter(|key| !key.trim().is_empty()),
                http_timeout,
            },
            log: LogSettings {
                level: args.log_level.into(),
                json: args.log_json,
            },
            max_response_chars: args.max_response_chars,
        })
    }
}
