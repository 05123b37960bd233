use std::num::NonZeroU32;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// One cart entry. The line total is fixed when the line is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    product_name: String,
    unit_price: Decimal,
    quantity: u32,
    line_total: Decimal,
}

impl LineItem {
    /// Fails when `unit_price * quantity` does not fit in a `Decimal`.
    pub fn new(
        product_name: impl Into<String>,
        unit_price: Decimal,
        quantity: NonZeroU32,
    ) -> Result<Self, DomainError> {
        let product_name = product_name.into();
        let quantity = quantity.get();
        let Some(line_total) = unit_price.checked_mul(Decimal::from(quantity)) else {
            return Err(DomainError::AmountOverflow { product: product_name });
        };
        Ok(Self { product_name, unit_price, quantity, line_total })
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn line_total(&self) -> Decimal {
        self.line_total
    }
}

/// Lines in append order. Every accepted line keeps the cart total representable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<LineItem>,
}

impl Cart {
    pub fn add_line(
        &mut self,
        product_name: impl Into<String>,
        unit_price: Decimal,
        quantity: NonZeroU32,
    ) -> Result<(), DomainError> {
        let line = LineItem::new(product_name, unit_price, quantity)?;
        if self.checked_total().and_then(|total| total.checked_add(line.line_total)).is_none() {
            return Err(DomainError::AmountOverflow { product: line.product_name });
        }
        self.lines.push(line);
        Ok(())
    }

    pub fn total(&self) -> Decimal {
        self.checked_total().unwrap_or(Decimal::MAX)
    }

    fn checked_total(&self) -> Option<Decimal> {
        self.lines
            .iter()
            .try_fold(Decimal::ZERO, |total, line| total.checked_add(line.line_total))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
