use std::sync::Arc;

use async_trait::async_trait;
use orderbot_core::catalog::{filter_matches, CatalogClient, CatalogError};
use orderbot_core::config::CatalogConfig;
use orderbot_core::domain::product::CatalogItem;

use crate::client::AppSheetClient;
use crate::rows::catalog_item_from_row;

/// Product lookup over the AppSheet products table. The whole table is read
/// and matched locally by name substring, keeping table order.
pub struct AppSheetCatalog {
    client: Arc<AppSheetClient>,
    table: String,
    name_column: String,
    price_column: String,
}

impl AppSheetCatalog {
    pub fn new(
        client: Arc<AppSheetClient>,
        table: impl Into<String>,
        name_column: impl Into<String>,
        price_column: impl Into<String>,
    ) -> Self {
        Self {
            client,
            table: table.into(),
            name_column: name_column.into(),
            price_column: price_column.into(),
        }
    }

    pub fn from_config(client: Arc<AppSheetClient>, config: &CatalogConfig) -> Self {
        Self::new(client, &config.table, &config.name_column, &config.price_column)
    }

    /// Every usable product row, in table order.
    pub async fn load_all(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        let rows = self
            .client
            .find(&self.table)
            .await
            .map_err(|error| CatalogError::Unavailable(error.to_string()))?;

        let total = rows.len();
        let items = rows
            .iter()
            .filter_map(|row| catalog_item_from_row(row, &self.name_column, &self.price_column))
            .collect::<Vec<_>>();

        if items.len() < total {
            tracing::debug!(
                event_name = "catalog.rows_skipped",
                table = %self.table,
                skipped = total - items.len(),
                "catalog rows without a usable name or price were skipped"
            );
        }
        Ok(items)
    }
}

#[async_trait]
impl CatalogClient for AppSheetCatalog {
    fn backend(&self) -> &'static str {
        "appsheet"
    }

    async fn search(&self, term: &str) -> Result<Vec<CatalogItem>, CatalogError> {
        let items = self.load_all().await?;
        Ok(filter_matches(items, term))
    }
}
