use std::time::Duration;

use orderbot_core::config::AppSheetConfig;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;

const ACCESS_KEY_HEADER: &str = "ApplicationAccessKey";
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum AppSheetError {
    #[error("invalid appsheet base url `{0}`")]
    InvalidBaseUrl(String),
    #[error("appsheet http client could not be built: {0}")]
    Build(String),
    #[error("appsheet request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("appsheet returned HTTP {status} for table `{table}`: {body}")]
    Status { table: String, status: u16, body: String },
    #[error("appsheet response for table `{table}` could not be decoded: {reason}")]
    Decode { table: String, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableAction {
    Find,
    Add,
}

impl TableAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Find => "Find",
            Self::Add => "Add",
        }
    }
}

/// Thin client for `POST {base_url}/apps/{app_id}/tables/{table}/Action`.
#[derive(Clone)]
pub struct AppSheetClient {
    http: Client,
    base_url: Url,
    app_id: String,
    api_key: SecretString,
}

impl AppSheetClient {
    pub fn new(config: &AppSheetConfig, request_timeout: Duration) -> Result<Self, AppSheetError> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|_| AppSheetError::InvalidBaseUrl(config.base_url.clone()))?;
        if base_url.cannot_be_a_base() {
            return Err(AppSheetError::InvalidBaseUrl(config.base_url.clone()));
        }

        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|error| AppSheetError::Build(error.to_string()))?;

        Ok(Self {
            http,
            base_url,
            app_id: config.app_id.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn action_url(&self, table: &str) -> Result<Url, AppSheetError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppSheetError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["apps", self.app_id.as_str(), "tables", table, "Action"]);
        Ok(url)
    }

    /// Reads every row of `table`.
    pub async fn find(&self, table: &str) -> Result<Vec<Value>, AppSheetError> {
        let body = self.invoke(table, TableAction::Find, Vec::new()).await?;
        extract_rows(body).ok_or_else(|| AppSheetError::Decode {
            table: table.to_owned(),
            reason: "expected a row array, `Rows` or `data`".to_owned(),
        })
    }

    pub async fn add(&self, table: &str, rows: Vec<Value>) -> Result<(), AppSheetError> {
        self.invoke(table, TableAction::Add, rows).await.map(|_| ())
    }

    async fn invoke(
        &self,
        table: &str,
        action: TableAction,
        rows: Vec<Value>,
    ) -> Result<Value, AppSheetError> {
        let url = self.action_url(table)?;
        let row_count = rows.len();
        let payload = json!({
            "Action": action.as_str(),
            "Properties": {},
            "Rows": rows,
        });

        let response = self
            .http
            .post(url)
            .header(ACCESS_KEY_HEADER, self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::warn!(
                event_name = "appsheet.request_failed",
                table,
                action = action.as_str(),
                status = status.as_u16(),
                "appsheet action rejected"
            );
            return Err(AppSheetError::Status {
                table: table.to_owned(),
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        tracing::debug!(
            event_name = "appsheet.request_completed",
            table,
            action = action.as_str(),
            rows = row_count,
            "appsheet action completed"
        );

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|error| AppSheetError::Decode {
            table: table.to_owned(),
            reason: error.to_string(),
        })
    }
}

/// Find responses come back as a bare array, or wrapped in `Rows` / `data`.
fn extract_rows(body: Value) -> Option<Vec<Value>> {
    match body {
        Value::Array(rows) => Some(rows),
        Value::Object(mut object) => match object.remove("Rows").or_else(|| object.remove("data")) {
            Some(Value::Array(rows)) => Some(rows),
            _ => None,
        },
        Value::Null => Some(Vec::new()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use orderbot_core::config::AppSheetConfig;
    use serde_json::json;

    use super::{extract_rows, AppSheetClient, AppSheetError};

    fn config(base_url: &str) -> AppSheetConfig {
        AppSheetConfig {
            base_url: base_url.to_owned(),
            app_id: "app-123".to_owned(),
            api_key: "V2-key".to_owned().into(),
        }
    }

    #[test]
    fn action_url_escapes_table_names() {
        let client = AppSheetClient::new(&config("https://api.appsheet.com/api/v2/"), Duration::from_secs(5))
            .expect("client");
        let url = client.action_url("Pedido Detalle").expect("url");
        assert_eq!(
            url.as_str(),
            "https://api.appsheet.com/api/v2/apps/app-123/tables/Pedido%20Detalle/Action"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = AppSheetClient::new(&config("not a url"), Duration::from_secs(5));
        assert!(matches!(result, Err(AppSheetError::InvalidBaseUrl(_))));
    }

    #[test]
    fn rows_are_extracted_from_every_envelope() {
        let row = json!({"nombreProducto": "Jabon Azul"});
        assert_eq!(extract_rows(json!([row.clone()])).map(|rows| rows.len()), Some(1));
        assert_eq!(extract_rows(json!({"Rows": [row.clone()]})).map(|rows| rows.len()), Some(1));
        assert_eq!(extract_rows(json!({"data": [row]})).map(|rows| rows.len()), Some(1));
        assert_eq!(extract_rows(json!({"error": "nope"})), None);
    }
}
