use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::cart::{Cart, LineItem};
use crate::domain::customer::Customer;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn format(prefix: &str, width: usize, sequence: u64) -> Self {
        Self(format!("{prefix}-{sequence:0width$}"))
    }

    /// Numeric suffix after the last `-`, if any.
    pub fn sequence(&self) -> Option<u64> {
        let (_, digits) = self.0.rsplit_once('-')?;
        digits.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Process-wide order id counter shared by every conversation.
#[derive(Debug)]
pub struct OrderIdAllocator {
    next: AtomicU64,
    prefix: String,
    width: usize,
}

impl OrderIdAllocator {
    pub fn new(prefix: impl Into<String>, width: usize) -> Self {
        Self::starting_at(prefix, width, 1)
    }

    pub fn starting_at(prefix: impl Into<String>, width: usize, next: u64) -> Self {
        Self { next: AtomicU64::new(next.max(1)), prefix: prefix.into(), width }
    }

    pub fn allocate(&self) -> OrderId {
        let sequence = self.next.fetch_add(1, Ordering::SeqCst);
        OrderId::format(&self.prefix, self.width, sequence)
    }

    /// Ensures the next allocation is strictly greater than `highest`.
    pub fn advance_past(&self, highest: u64) {
        self.next.fetch_max(highest.saturating_add(1), Ordering::SeqCst);
    }

    pub fn peek_next(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

impl Default for OrderIdAllocator {
    fn default() -> Self {
        Self::new("PED", 5)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer: Customer,
    pub lines: Vec<LineItem>,
    pub total: Decimal,
    pub placed_at: DateTime<Utc>,
}

impl Order {
    pub fn from_cart(
        id: OrderId,
        customer: Customer,
        cart: &Cart,
        placed_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if cart.is_empty() {
            return Err(DomainError::EmptyCart);
        }
        Ok(Self { id, customer, lines: cart.lines().to_vec(), total: cart.total(), placed_at })
    }

    pub fn header(&self) -> OrderHeaderRecord {
        OrderHeaderRecord {
            order_id: self.id.clone(),
            total: self.total,
            placed_at: self.placed_at,
            customer_name: self.customer.name.clone(),
            address: self.customer.address.clone(),
            phone: self.customer.phone.as_str().to_owned(),
        }
    }

    pub fn line_records(&self) -> Vec<OrderLineRecord> {
        self.lines
            .iter()
            .map(|line| OrderLineRecord {
                order_id: self.id.clone(),
                placed_at: self.placed_at,
                product_name: line.product_name().to_owned(),
                quantity: line.quantity(),
                unit_price: line.unit_price(),
                line_total: line.line_total(),
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHeaderRecord {
    pub order_id: OrderId,
    pub total: Decimal,
    pub placed_at: DateTime<Utc>,
    pub customer_name: String,
    pub address: String,
    pub phone: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRecord {
    pub order_id: OrderId,
    pub placed_at: DateTime<Utc>,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}
