use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A catalog record as returned by a search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub product_name: String,
    pub price: Decimal,
}

impl CatalogItem {
    pub fn new(product_name: impl Into<String>, price: Decimal) -> Self {
        Self { product_name: product_name.into(), price }
    }

    /// Case-insensitive substring containment of `term` in the product name.
    pub fn matches_term(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        !term.is_empty() && self.product_name.to_lowercase().contains(&term)
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.product_name.trim().to_lowercase() == name.trim().to_lowercase()
    }
}
