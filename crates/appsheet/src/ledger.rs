use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use orderbot_core::config::LedgerConfig;
use orderbot_core::domain::order::{Order, OrderId};
use orderbot_core::ledger::{CommitReceipt, LedgerError, OrderLedger};
use serde_json::Value;

use crate::client::AppSheetClient;
use crate::rows::{HeaderRow, LineRow};

/// Writes an order as one `Add` on the header table followed by one `Add` on
/// the line table. Accepted headers are remembered so a retry after a failed
/// line write only resends the lines.
pub struct AppSheetOrderLedger {
    client: Arc<AppSheetClient>,
    header_table: String,
    line_table: String,
    written_headers: Mutex<HashSet<String>>,
}

impl AppSheetOrderLedger {
    pub fn new(
        client: Arc<AppSheetClient>,
        header_table: impl Into<String>,
        line_table: impl Into<String>,
    ) -> Self {
        Self {
            client,
            header_table: header_table.into(),
            line_table: line_table.into(),
            written_headers: Mutex::new(HashSet::new()),
        }
    }

    pub fn from_config(client: Arc<AppSheetClient>, config: &LedgerConfig) -> Self {
        Self::new(client, &config.header_table, &config.line_table)
    }

    fn header_written(&self, order_id: &str) -> bool {
        match self.written_headers.lock() {
            Ok(headers) => headers.contains(order_id),
            Err(poisoned) => poisoned.into_inner().contains(order_id),
        }
    }

    fn remember_header(&self, order_id: &str) {
        match self.written_headers.lock() {
            Ok(mut headers) => headers.insert(order_id.to_owned()),
            Err(poisoned) => poisoned.into_inner().insert(order_id.to_owned()),
        };
    }
}

#[async_trait]
impl OrderLedger for AppSheetOrderLedger {
    fn backend(&self) -> &'static str {
        "appsheet"
    }

    async fn commit(&self, order: &Order) -> Result<CommitReceipt, LedgerError> {
        let order_id = order.id.as_str();
        let mut header_written = false;

        if !self.header_written(order_id) {
            let header = to_value(HeaderRow::from(&order.header()))?;
            self.client.add(&self.header_table, vec![header]).await.map_err(|error| {
                LedgerError::HeaderRejected { order_id: order.id.clone(), reason: error.to_string() }
            })?;
            self.remember_header(order_id);
            header_written = true;
        } else {
            tracing::info!(
                event_name = "ledger.appsheet.header_reused",
                order_id,
                "header already stored, resending lines only"
            );
        }

        let lines = order
            .line_records()
            .iter()
            .map(|record| to_value(LineRow::from(record)))
            .collect::<Result<Vec<_>, _>>()?;
        let line_count = lines.len();
        self.client.add(&self.line_table, lines).await.map_err(|error| {
            LedgerError::LinesRejected { order_id: order.id.clone(), reason: error.to_string() }
        })?;

        tracing::info!(
            event_name = "ledger.appsheet.committed",
            order_id,
            header_written,
            lines_written = line_count,
            "order stored in appsheet"
        );

        Ok(CommitReceipt { order_id: order.id.clone(), header_written, lines_written: line_count })
    }

    async fn highest_sequence(&self) -> Result<Option<u64>, LedgerError> {
        let rows = self
            .client
            .find(&self.header_table)
            .await
            .map_err(|error| LedgerError::Unavailable(error.to_string()))?;

        Ok(rows
            .iter()
            .filter_map(|row| row.get("pedidoid").and_then(Value::as_str))
            .filter_map(|id| OrderId(id.to_owned()).sequence())
            .max())
    }
}

fn to_value<T: serde::Serialize>(row: T) -> Result<Value, LedgerError> {
    serde_json::to_value(row)
        .map_err(|error| LedgerError::Unavailable(format!("could not encode order row: {error}")))
}
