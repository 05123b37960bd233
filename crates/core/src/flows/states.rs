use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::product::CatalogItem;

/// Where a conversation is. Search candidates and the selected product only
/// exist inside the stage that owns them, so they cannot leak into the next
/// add-to-cart cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Start,
    CollectingName,
    CollectingAddress,
    CollectingPhone,
    SearchingProduct,
    ResolvingSelection {
        candidates: Vec<CatalogItem>,
    },
    AwaitingQuantity {
        selected: CatalogItem,
    },
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Self::Start => StageKind::Start,
            Self::CollectingName => StageKind::CollectingName,
            Self::CollectingAddress => StageKind::CollectingAddress,
            Self::CollectingPhone => StageKind::CollectingPhone,
            Self::SearchingProduct => StageKind::SearchingProduct,
            Self::ResolvingSelection { .. } => StageKind::ResolvingSelection,
            Self::AwaitingQuantity { .. } => StageKind::AwaitingQuantity,
        }
    }
}

/// Payload-free stage label for logs, audit metadata and API responses.
/// `Committing` is only observed while a ledger commit is in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Start,
    CollectingName,
    CollectingAddress,
    CollectingPhone,
    SearchingProduct,
    ResolvingSelection,
    AwaitingQuantity,
    Committing,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::CollectingName => "collecting_name",
            Self::CollectingAddress => "collecting_address",
            Self::CollectingPhone => "collecting_phone",
            Self::SearchingProduct => "searching_product",
            Self::ResolvingSelection => "resolving_selection",
            Self::AwaitingQuantity => "awaiting_quantity",
            Self::Committing => "committing",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{Stage, StageKind};
    use crate::domain::product::CatalogItem;

    #[test]
    fn payload_stages_map_to_their_kind() {
        let item = CatalogItem::new("Jabon Azul", Decimal::from(5));
        assert_eq!(
            Stage::ResolvingSelection { candidates: vec![item.clone()] }.kind(),
            StageKind::ResolvingSelection
        );
        assert_eq!(Stage::AwaitingQuantity { selected: item }.kind(), StageKind::AwaitingQuantity);
        assert_eq!(Stage::default().kind(), StageKind::Start);
    }

    #[test]
    fn stage_kind_labels_are_snake_case() {
        assert_eq!(StageKind::SearchingProduct.to_string(), "searching_product");
        let json = serde_json::to_string(&StageKind::AwaitingQuantity).expect("serialize");
        assert_eq!(json, "\"awaiting_quantity\"");
    }
}
