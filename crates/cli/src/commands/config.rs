use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use orderbot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> String {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => render(&config, detect_config_path().as_deref()),
        Err(error) => format!("config validation failed: {error}"),
    }
}

/// One line per effective setting with the layer it came from. Secrets are
/// redacted.
pub fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_owned()];
    for field in fields(config) {
        let source = field_source(&field, config_file_doc.as_ref(), config_file_path);
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }
    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let conversation = &config.conversation;
    vec![
        Field {
            key: "conversation.order_id_prefix",
            env_keys: &["ORDERBOT_ORDER_ID_PREFIX"],
            value: conversation.order_id_prefix.clone(),
        },
        Field {
            key: "conversation.order_id_width",
            env_keys: &[],
            value: conversation.order_id_width.to_string(),
        },
        Field {
            key: "conversation.start_keywords",
            env_keys: &[],
            value: conversation.start_keywords.join(", "),
        },
        Field {
            key: "conversation.cancel_keywords",
            env_keys: &[],
            value: conversation.cancel_keywords.join(", "),
        },
        Field {
            key: "conversation.finish_keywords",
            env_keys: &[],
            value: conversation.finish_keywords.join(", "),
        },
        Field {
            key: "catalog.backend",
            env_keys: &["ORDERBOT_CATALOG_BACKEND"],
            value: config.catalog.backend.as_str().to_owned(),
        },
        Field {
            key: "catalog.timeout_secs",
            env_keys: &["ORDERBOT_CATALOG_TIMEOUT_SECS"],
            value: config.catalog.timeout_secs.to_string(),
        },
        Field { key: "catalog.table", env_keys: &[], value: config.catalog.table.clone() },
        Field {
            key: "catalog.items",
            env_keys: &[],
            value: format!("{} entries", config.catalog.items.len()),
        },
        Field {
            key: "ledger.backend",
            env_keys: &["ORDERBOT_LEDGER_BACKEND"],
            value: config.ledger.backend.as_str().to_owned(),
        },
        Field {
            key: "ledger.timeout_secs",
            env_keys: &["ORDERBOT_LEDGER_TIMEOUT_SECS"],
            value: config.ledger.timeout_secs.to_string(),
        },
        Field {
            key: "ledger.header_table",
            env_keys: &[],
            value: config.ledger.header_table.clone(),
        },
        Field { key: "ledger.line_table", env_keys: &[], value: config.ledger.line_table.clone() },
        Field {
            key: "appsheet.base_url",
            env_keys: &["ORDERBOT_APPSHEET_BASE_URL"],
            value: config.appsheet.base_url.clone(),
        },
        Field {
            key: "appsheet.app_id",
            env_keys: &["ORDERBOT_APPSHEET_APP_ID", "APPSHEET_APP_ID"],
            value: unset_if_empty(&config.appsheet.app_id),
        },
        Field {
            key: "appsheet.api_key",
            env_keys: &["ORDERBOT_APPSHEET_API_KEY", "APPSHEET_API_KEY"],
            value: redact_secret(config.appsheet.api_key.expose_secret()),
        },
        Field {
            key: "database.url",
            env_keys: &["ORDERBOT_DATABASE_URL"],
            value: config.database.url.clone(),
        },
        Field {
            key: "database.max_connections",
            env_keys: &["ORDERBOT_DATABASE_MAX_CONNECTIONS"],
            value: config.database.max_connections.to_string(),
        },
        Field {
            key: "server.bind_address",
            env_keys: &["ORDERBOT_SERVER_BIND_ADDRESS"],
            value: config.server.bind_address.clone(),
        },
        Field {
            key: "server.port",
            env_keys: &["ORDERBOT_SERVER_PORT"],
            value: config.server.port.to_string(),
        },
        Field {
            key: "logging.level",
            env_keys: &["ORDERBOT_LOGGING_LEVEL", "ORDERBOT_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key: "logging.format",
            env_keys: &["ORDERBOT_LOGGING_FORMAT", "ORDERBOT_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format).to_lowercase(),
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("orderbot.toml"), PathBuf::from("config/orderbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_owned());
            return format!("file ({file_path})");
        }
    }

    "default".to_owned()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn unset_if_empty(value: &str) -> String {
    if value.trim().is_empty() {
        "<unset>".to_owned()
    } else {
        value.to_owned()
    }
}

/// Keeps an AppSheet-style `V2-` prefix visible, nothing else.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<unset>".to_owned();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_owned()
}
