use async_trait::async_trait;
use thiserror::Error;

use crate::domain::product::CatalogItem;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog service unavailable: {0}")]
    Unavailable(String),
    #[error("catalog search timed out after {after_secs}s")]
    Timeout { after_secs: u64 },
}

/// Free-text product lookup. `Ok(vec![])` means "no matches" and is not an error.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn search(&self, term: &str) -> Result<Vec<CatalogItem>, CatalogError>;
}

/// Keeps catalog order; no ranking.
pub fn filter_matches<I>(items: I, term: &str) -> Vec<CatalogItem>
where
    I: IntoIterator<Item = CatalogItem>,
{
    items.into_iter().filter(|item| item.matches_term(term)).collect()
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalog {
    items: Vec<CatalogItem>,
}

impl InMemoryCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }
}

#[async_trait]
impl CatalogClient for InMemoryCatalog {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn search(&self, term: &str) -> Result<Vec<CatalogItem>, CatalogError> {
        Ok(filter_matches(self.items.iter().cloned(), term))
    }
}
