use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::product::CatalogItem;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub conversation: ConversationConfig,
    pub catalog: CatalogConfig,
    pub ledger: LedgerConfig,
    pub appsheet: AppSheetConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationConfig {
    pub greeting_keywords: Vec<String>,
    pub start_keywords: Vec<String>,
    pub cancel_keywords: Vec<String>,
    pub finish_keywords: Vec<String>,
    pub order_id_prefix: String,
    pub order_id_width: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogConfig {
    pub backend: CatalogBackend,
    pub timeout_secs: u64,
    pub table: String,
    pub name_column: String,
    pub price_column: String,
    pub items: Vec<CatalogItem>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    pub timeout_secs: u64,
    pub header_table: String,
    pub line_table: String,
}

#[derive(Clone, Debug)]
pub struct AppSheetConfig {
    pub base_url: String,
    pub app_id: String,
    pub api_key: SecretString,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogBackend {
    #[serde(rename = "appsheet", alias = "app_sheet")]
    AppSheet,
    Memory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBackend {
    #[serde(rename = "appsheet", alias = "app_sheet")]
    AppSheet,
    Sqlite,
    Memory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub catalog_backend: Option<CatalogBackend>,
    pub ledger_backend: Option<LedgerBackend>,
    pub appsheet_app_id: Option<String>,
    pub appsheet_api_key: Option<String>,
    pub appsheet_base_url: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            greeting_keywords: keywords(&["hola", "buenas"]),
            start_keywords: keywords(&["pedido"]),
            cancel_keywords: keywords(&["cancelar", "salir"]),
            finish_keywords: keywords(&["fin"]),
            order_id_prefix: "PED".to_string(),
            order_id_width: 5,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            conversation: ConversationConfig::default(),
            catalog: CatalogConfig {
                backend: CatalogBackend::AppSheet,
                timeout_secs: 10,
                table: "Productos".to_string(),
                name_column: "nombreProducto".to_string(),
                price_column: "valor".to_string(),
                items: Vec::new(),
            },
            ledger: LedgerConfig {
                backend: LedgerBackend::AppSheet,
                timeout_secs: 15,
                header_table: "enc_pedido".to_string(),
                line_table: "pedido".to_string(),
            },
            appsheet: AppSheetConfig {
                base_url: "https://api.appsheet.com/api/v2".to_string(),
                app_id: String::new(),
                api_key: String::new().into(),
            },
            database: DatabaseConfig {
                url: "sqlite://orderbot.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn keywords(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for CatalogBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "appsheet" | "app_sheet" => Ok(Self::AppSheet),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Validation(format!(
                "unsupported catalog backend `{other}` (expected appsheet|memory)"
            ))),
        }
    }
}

impl std::str::FromStr for LedgerBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "appsheet" | "app_sheet" => Ok(Self::AppSheet),
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Validation(format!(
                "unsupported ledger backend `{other}` (expected appsheet|sqlite|memory)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl CatalogBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppSheet => "appsheet",
            Self::Memory => "memory",
        }
    }
}

impl LedgerBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppSheet => "appsheet",
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("orderbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(conversation) = patch.conversation {
            if let Some(greeting_keywords) = conversation.greeting_keywords {
                self.conversation.greeting_keywords = greeting_keywords;
            }
            if let Some(start_keywords) = conversation.start_keywords {
                self.conversation.start_keywords = start_keywords;
            }
            if let Some(cancel_keywords) = conversation.cancel_keywords {
                self.conversation.cancel_keywords = cancel_keywords;
            }
            if let Some(finish_keywords) = conversation.finish_keywords {
                self.conversation.finish_keywords = finish_keywords;
            }
            if let Some(order_id_prefix) = conversation.order_id_prefix {
                self.conversation.order_id_prefix = order_id_prefix;
            }
            if let Some(order_id_width) = conversation.order_id_width {
                self.conversation.order_id_width = order_id_width;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(backend) = catalog.backend {
                self.catalog.backend = backend;
            }
            if let Some(timeout_secs) = catalog.timeout_secs {
                self.catalog.timeout_secs = timeout_secs;
            }
            if let Some(table) = catalog.table {
                self.catalog.table = table;
            }
            if let Some(name_column) = catalog.name_column {
                self.catalog.name_column = name_column;
            }
            if let Some(price_column) = catalog.price_column {
                self.catalog.price_column = price_column;
            }
            if let Some(items) = catalog.items {
                self.catalog.items =
                    items.into_iter().map(|item| CatalogItem::new(item.name, item.price)).collect();
            }
        }

        if let Some(ledger) = patch.ledger {
            if let Some(backend) = ledger.backend {
                self.ledger.backend = backend;
            }
            if let Some(timeout_secs) = ledger.timeout_secs {
                self.ledger.timeout_secs = timeout_secs;
            }
            if let Some(header_table) = ledger.header_table {
                self.ledger.header_table = header_table;
            }
            if let Some(line_table) = ledger.line_table {
                self.ledger.line_table = line_table;
            }
        }

        if let Some(appsheet) = patch.appsheet {
            if let Some(base_url) = appsheet.base_url {
                self.appsheet.base_url = base_url;
            }
            if let Some(app_id) = appsheet.app_id {
                self.appsheet.app_id = app_id;
            }
            if let Some(api_key) = appsheet.api_key {
                self.appsheet.api_key = secret_value(api_key);
            }
        }

        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ORDERBOT_ORDER_ID_PREFIX") {
            self.conversation.order_id_prefix = value;
        }

        if let Some(value) = read_env("ORDERBOT_CATALOG_BACKEND") {
            self.catalog.backend = value.parse()?;
        }
        if let Some(value) = read_env("ORDERBOT_CATALOG_TIMEOUT_SECS") {
            self.catalog.timeout_secs = parse_u64("ORDERBOT_CATALOG_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ORDERBOT_LEDGER_BACKEND") {
            self.ledger.backend = value.parse()?;
        }
        if let Some(value) = read_env("ORDERBOT_LEDGER_TIMEOUT_SECS") {
            self.ledger.timeout_secs = parse_u64("ORDERBOT_LEDGER_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ORDERBOT_APPSHEET_BASE_URL") {
            self.appsheet.base_url = value;
        }
        let app_id = read_env("ORDERBOT_APPSHEET_APP_ID").or_else(|| read_env("APPSHEET_APP_ID"));
        if let Some(value) = app_id {
            self.appsheet.app_id = value;
        }
        let api_key =
            read_env("ORDERBOT_APPSHEET_API_KEY").or_else(|| read_env("APPSHEET_API_KEY"));
        if let Some(value) = api_key {
            self.appsheet.api_key = secret_value(value);
        }

        if let Some(value) = read_env("ORDERBOT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("ORDERBOT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("ORDERBOT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("ORDERBOT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("ORDERBOT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ORDERBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ORDERBOT_SERVER_PORT") {
            self.server.port = parse_u16("ORDERBOT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("ORDERBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("ORDERBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("ORDERBOT_LOGGING_LEVEL").or_else(|| read_env("ORDERBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ORDERBOT_LOGGING_FORMAT").or_else(|| read_env("ORDERBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(catalog_backend) = overrides.catalog_backend {
            self.catalog.backend = catalog_backend;
        }
        if let Some(ledger_backend) = overrides.ledger_backend {
            self.ledger.backend = ledger_backend;
        }
        if let Some(app_id) = overrides.appsheet_app_id {
            self.appsheet.app_id = app_id;
        }
        if let Some(api_key) = overrides.appsheet_api_key {
            self.appsheet.api_key = secret_value(api_key);
        }
        if let Some(base_url) = overrides.appsheet_base_url {
            self.appsheet.base_url = base_url;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_conversation(&self.conversation)?;
        validate_catalog(&self.catalog)?;
        validate_ledger(&self.ledger)?;
        if self.catalog.backend == CatalogBackend::AppSheet
            || self.ledger.backend == LedgerBackend::AppSheet
        {
            validate_appsheet(&self.appsheet)?;
        }
        if self.ledger.backend == LedgerBackend::Sqlite {
            validate_database(&self.database)?;
        }
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("orderbot.toml"), PathBuf::from("config/orderbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_conversation(conversation: &ConversationConfig) -> Result<(), ConfigError> {
    let lists = [
        ("conversation.greeting_keywords", &conversation.greeting_keywords),
        ("conversation.start_keywords", &conversation.start_keywords),
        ("conversation.cancel_keywords", &conversation.cancel_keywords),
        ("conversation.finish_keywords", &conversation.finish_keywords),
    ];
    for (name, list) in lists {
        if list.iter().all(|keyword| keyword.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "{name} must contain at least one non-empty keyword"
            )));
        }
    }

    // Finish and cancel share the SearchingProduct stage, so they must never collide.
    let collision = conversation.cancel_keywords.iter().find(|cancel| {
        conversation.finish_keywords.iter().any(|finish| finish.trim().eq_ignore_ascii_case(cancel.trim()))
    });
    if let Some(keyword) = collision {
        return Err(ConfigError::Validation(format!(
            "keyword `{keyword}` cannot be both a cancel and a finish keyword"
        )));
    }

    if conversation.order_id_prefix.trim().is_empty() {
        return Err(ConfigError::Validation(
            "conversation.order_id_prefix must not be empty".to_string(),
        ));
    }
    if conversation.order_id_width == 0 || conversation.order_id_width > 12 {
        return Err(ConfigError::Validation(
            "conversation.order_id_width must be in range 1..=12".to_string(),
        ));
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if catalog.timeout_secs == 0 || catalog.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "catalog.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    match catalog.backend {
        CatalogBackend::AppSheet => {
            let columns = [
                ("catalog.table", &catalog.table),
                ("catalog.name_column", &catalog.name_column),
                ("catalog.price_column", &catalog.price_column),
            ];
            for (name, value) in columns {
                if value.trim().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "{name} is required for the appsheet catalog backend"
                    )));
                }
            }
        }
        CatalogBackend::Memory => {
            if catalog.items.is_empty() {
                return Err(ConfigError::Validation(
                    "catalog.items must list at least one product for the memory backend"
                        .to_string(),
                ));
            }
            if let Some(item) = catalog.items.iter().find(|item| item.price < Decimal::ZERO) {
                return Err(ConfigError::Validation(format!(
                    "catalog item `{}` has a negative price",
                    item.product_name
                )));
            }
        }
    }

    Ok(())
}

fn validate_ledger(ledger: &LedgerConfig) -> Result<(), ConfigError> {
    if ledger.timeout_secs == 0 || ledger.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "ledger.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if ledger.backend == LedgerBackend::AppSheet
        && (ledger.header_table.trim().is_empty() || ledger.line_table.trim().is_empty())
    {
        return Err(ConfigError::Validation(
            "ledger.header_table and ledger.line_table are required for the appsheet ledger"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_appsheet(appsheet: &AppSheetConfig) -> Result<(), ConfigError> {
    if !appsheet.base_url.starts_with("http://") && !appsheet.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "appsheet.base_url must start with http:// or https://".to_string(),
        ));
    }
    if appsheet.app_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "appsheet.app_id is required. Find it in AppSheet > Manage > Integrations > App Id"
                .to_string(),
        ));
    }
    if appsheet.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "appsheet.api_key is required. Create one in AppSheet > Manage > Integrations > Application Access Keys"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    conversation: Option<ConversationPatch>,
    catalog: Option<CatalogPatch>,
    ledger: Option<LedgerPatch>,
    appsheet: Option<AppSheetPatch>,
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationPatch {
    greeting_keywords: Option<Vec<String>>,
    start_keywords: Option<Vec<String>>,
    cancel_keywords: Option<Vec<String>>,
    finish_keywords: Option<Vec<String>>,
    order_id_prefix: Option<String>,
    order_id_width: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    backend: Option<CatalogBackend>,
    timeout_secs: Option<u64>,
    table: Option<String>,
    name_column: Option<String>,
    price_column: Option<String>,
    items: Option<Vec<CatalogItemPatch>>,
}

#[derive(Debug, Deserialize)]
struct CatalogItemPatch {
    name: String,
    price: Decimal,
}

#[derive(Debug, Default, Deserialize)]
struct LedgerPatch {
    backend: Option<LedgerBackend>,
    timeout_secs: Option<u64>,
    header_table: Option<String>,
    line_table: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AppSheetPatch {
    base_url: Option<String>,
    app_id: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
