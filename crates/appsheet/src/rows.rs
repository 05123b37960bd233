use std::str::FromStr;

use orderbot_core::domain::order::{OrderHeaderRecord, OrderLineRecord};
use orderbot_core::domain::product::CatalogItem;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

/// Column names of the order header table (`enc_pedido`).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HeaderRow {
    pub pedidoid: String,
    pub enc_total: Decimal,
    pub fecha: String,
    pub cliente: String,
    pub direccion: String,
    pub celular: String,
}

impl From<&OrderHeaderRecord> for HeaderRow {
    fn from(record: &OrderHeaderRecord) -> Self {
        Self {
            pedidoid: record.order_id.0.clone(),
            enc_total: record.total,
            fecha: record.placed_at.to_rfc3339(),
            cliente: record.customer_name.clone(),
            direccion: record.address.clone(),
            celular: record.phone.clone(),
        }
    }
}

/// Column names of the order line table (`pedido`).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LineRow {
    pub pedidoid: String,
    pub fecha: String,
    #[serde(rename = "nombreProducto")]
    pub nombre_producto: String,
    #[serde(rename = "cantidadProducto")]
    pub cantidad_producto: u32,
    pub valor_unit: Decimal,
    pub valor: Decimal,
}

impl From<&OrderLineRecord> for LineRow {
    fn from(record: &OrderLineRecord) -> Self {
        Self {
            pedidoid: record.order_id.0.clone(),
            fecha: record.placed_at.to_rfc3339(),
            nombre_producto: record.product_name.clone(),
            cantidad_producto: record.quantity,
            valor_unit: record.unit_price,
            valor: record.line_total,
        }
    }
}

/// Reads one catalog row. Rows without a name or with a missing, unparseable
/// or negative price yield `None`.
pub fn catalog_item_from_row(row: &Value, name_column: &str, price_column: &str) -> Option<CatalogItem> {
    let name = row.get(name_column)?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }
    let price = parse_price(row.get(price_column)?)?;
    if price.is_sign_negative() {
        return None;
    }
    Some(CatalogItem::new(name, price))
}

fn parse_price(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => Decimal::from_str(&number.to_string())
            .ok()
            .or_else(|| number.as_f64().and_then(|float| Decimal::try_from(float).ok())),
        Value::String(text) => {
            let cleaned = text.trim().trim_start_matches('$').trim();
            if cleaned.is_empty() {
                return None;
            }
            Decimal::from_str(cleaned).ok()
        }
        _ => None,
    }
}
