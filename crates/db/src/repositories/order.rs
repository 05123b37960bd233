use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use orderbot_core::domain::order::{Order, OrderHeaderRecord, OrderId, OrderLineRecord};
use orderbot_core::ledger::{CommitReceipt, LedgerError, OrderLedger};

use super::RepositoryError;
use crate::DbPool;

/// SQLite order ledger. Header and lines are written in one transaction and
/// keyed by order id, so replaying a commit never duplicates rows.
pub struct SqlOrderLedger {
    pool: DbPool,
}

impl SqlOrderLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_header(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<OrderHeaderRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT order_id, total, placed_at, customer_name, address, phone
             FROM order_header
             WHERE order_id = ?",
        )
        .bind(order_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(header_from_row).transpose()
    }

    pub async fn find_lines(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<OrderLineRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT order_id, placed_at, product_name, quantity, unit_price, line_total
             FROM order_line
             WHERE order_id = ?
             ORDER BY line_number ASC",
        )
        .bind(order_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(line_from_row).collect()
    }

    pub async fn count_orders(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM order_header")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn write(&self, order: &Order) -> Result<CommitReceipt, RepositoryError> {
        let header = order.header();
        let mut tx = self.pool.begin().await?;

        let header_rows = sqlx::query(
            "INSERT OR IGNORE INTO order_header (
                order_id,
                sequence,
                total,
                placed_at,
                customer_name,
                address,
                phone
            ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(header.order_id.as_str())
        .bind(header.order_id.sequence().and_then(|value| i64::try_from(value).ok()))
        .bind(header.total.to_string())
        .bind(header.placed_at.to_rfc3339())
        .bind(&header.customer_name)
        .bind(&header.address)
        .bind(&header.phone)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let mut lines_written = 0;
        for (index, line) in order.line_records().iter().enumerate() {
            let line_number = i64::try_from(index + 1)
                .map_err(|_| RepositoryError::Decode("too many order lines".to_owned()))?;
            lines_written += sqlx::query(
                "INSERT OR IGNORE INTO order_line (
                    order_id,
                    line_number,
                    placed_at,
                    product_name,
                    quantity,
                    unit_price,
                    line_total
                ) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(line.order_id.as_str())
            .bind(line_number)
            .bind(line.placed_at.to_rfc3339())
            .bind(&line.product_name)
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.to_string())
            .bind(line.line_total.to_string())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;

        Ok(CommitReceipt {
            order_id: order.id.clone(),
            header_written: header_rows > 0,
            lines_written: usize::try_from(lines_written).unwrap_or(usize::MAX),
        })
    }
}

#[async_trait::async_trait]
impl OrderLedger for SqlOrderLedger {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn commit(&self, order: &Order) -> Result<CommitReceipt, LedgerError> {
        let receipt = self.write(order).await?;
        tracing::info!(
            event_name = "ledger.sqlite.committed",
            order_id = %order.id,
            header_written = receipt.header_written,
            lines_written = receipt.lines_written,
            "order stored in sqlite ledger"
        );
        Ok(receipt)
    }

    async fn highest_sequence(&self) -> Result<Option<u64>, LedgerError> {
        let highest: Option<i64> = sqlx::query_scalar("SELECT MAX(sequence) FROM order_header")
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(highest.and_then(|value| u64::try_from(value).ok()))
    }
}

fn header_from_row(row: SqliteRow) -> Result<OrderHeaderRecord, RepositoryError> {
    Ok(OrderHeaderRecord {
        order_id: OrderId(row.try_get("order_id")?),
        total: parse_decimal("total", row.try_get("total")?)?,
        placed_at: parse_timestamp("placed_at", row.try_get("placed_at")?)?,
        customer_name: row.try_get("customer_name")?,
        address: row.try_get("address")?,
        phone: row.try_get("phone")?,
    })
}

fn line_from_row(row: SqliteRow) -> Result<OrderLineRecord, RepositoryError> {
    Ok(OrderLineRecord {
        order_id: OrderId(row.try_get("order_id")?),
        placed_at: parse_timestamp("placed_at", row.try_get("placed_at")?)?,
        product_name: row.try_get("product_name")?,
        quantity: parse_u32("quantity", row.try_get("quantity")?)?,
        unit_price: parse_decimal("unit_price", row.try_get("unit_price")?)?,
        line_total: parse_decimal("line_total", row.try_get("line_total")?)?,
    })
}

fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

fn parse_decimal(column: &str, value: String) -> Result<Decimal, RepositoryError> {
    value.parse::<Decimal>().map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}` (`{value}`): {error}"))
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|parsed| parsed.with_timezone(&Utc)).map_err(|error| {
        RepositoryError::Decode(format!("invalid timestamp in `{column}` (`{value}`): {error}"))
    })
}
