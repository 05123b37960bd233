//! Outbound message templates. Wording is presentation only; the engine
//! decides which template a turn produces.

use rust_decimal::Decimal;

use crate::domain::order::{Order, OrderId};
use crate::domain::product::CatalogItem;
use crate::errors::{ServiceError, TurnError, ValidationError};
use crate::flows::keywords::{Keyword, KeywordSet};
use crate::flows::states::StageKind;

pub fn money(value: Decimal) -> String {
    format!("${}", value.normalize())
}

pub fn welcome(keywords: &KeywordSet) -> String {
    format!(
        "👋 Bienvenido. Escribe *{}* para iniciar o *{}* para salir.",
        keywords.primary(Keyword::Start),
        keywords.primary(Keyword::Finish)
    )
}

pub fn cancelled() -> String {
    "✅ Pedido cancelado. ¡Hasta pronto!".to_owned()
}

pub fn ask_name() -> String {
    "📋 Escribe tu nombre:".to_owned()
}

pub fn ask_address() -> String {
    "🏠 Escribe tu dirección:".to_owned()
}

pub fn ask_phone() -> String {
    "📱 Escribe tu celular (10 dígitos):".to_owned()
}

pub fn ask_product() -> String {
    "📦 Escribe el nombre del producto:".to_owned()
}

pub fn customer_registered(order_id: &OrderId) -> String {
    format!("✅ Datos registrados. Tu número de pedido es *{order_id}*\n\n{}", ask_product())
}

pub fn candidate_list(candidates: &[CatalogItem]) -> String {
    let lines = candidates
        .iter()
        .map(|item| format!("➡️ {} - {}", item.product_name, money(item.price)))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Selecciona uno:\n{lines}\n\nEscribe el *nombre exacto* del producto:")
}

pub fn ask_quantity(item: &CatalogItem) -> String {
    format!("¿Cuántas unidades de *{}* deseas?", item.product_name)
}

pub fn item_added(keywords: &KeywordSet) -> String {
    format!(
        "✅ Producto agregado.\n\nEscribe otro producto o *{}* para terminar el pedido.",
        keywords.primary(Keyword::Finish)
    )
}

pub fn order_summary(order: &Order) -> String {
    let mut lines = vec!["🧾 Resumen del pedido:".to_owned()];
    lines.extend(order.lines.iter().map(|line| {
        format!("🧴 {} x{} = {}", line.product_name(), line.quantity(), money(line.line_total()))
    }));
    lines.push(format!("💰 Total: {}", money(order.total)));
    lines.join("\n")
}

pub fn order_saved(order_id: &OrderId) -> String {
    format!("✅ Pedido *{order_id}* guardado. ¡Gracias por tu compra!")
}

pub fn commit_failed(order_id: &OrderId, keywords: &KeywordSet) -> String {
    format!(
        "⚠️ No pudimos guardar tu pedido *{order_id}*. Escribe *{}* para reintentar o *{}* para salir.",
        keywords.primary(Keyword::Finish),
        keywords.primary(Keyword::Cancel)
    )
}

/// Re-prompt for a stage when the input could not be used.
pub fn prompt_for(stage: StageKind, keywords: &KeywordSet) -> String {
    match stage {
        StageKind::Start => welcome(keywords),
        StageKind::CollectingName => ask_name(),
        StageKind::CollectingAddress => ask_address(),
        StageKind::CollectingPhone => ask_phone(),
        StageKind::SearchingProduct | StageKind::Committing => ask_product(),
        StageKind::ResolvingSelection => {
            "Escribe el *nombre exacto* de uno de los productos listados:".to_owned()
        }
        StageKind::AwaitingQuantity => "¿Cuántas unidades deseas?".to_owned(),
    }
}

pub fn for_error(error: &TurnError, stage: StageKind, keywords: &KeywordSet) -> String {
    match error {
        TurnError::Validation(ValidationError::EmptyInput) => prompt_for(stage, keywords),
        TurnError::Validation(ValidationError::MalformedPhone { .. }) => {
            "❌ El celular debe tener 10 dígitos. Intenta de nuevo:".to_owned()
        }
        TurnError::Validation(ValidationError::InvalidQuantity { .. }) => {
            "❌ Cantidad inválida. Intenta de nuevo:".to_owned()
        }
        TurnError::Validation(ValidationError::QuantityTooLarge { .. }) => {
            "❌ Cantidad demasiado grande. Intenta de nuevo:".to_owned()
        }
        TurnError::Validation(ValidationError::UnknownSelection { .. }) => {
            "❌ Producto inválido. Escribe el nombre exacto de la lista.".to_owned()
        }
        TurnError::Validation(ValidationError::EmptyCart) => {
            "❌ No hay productos agregados.".to_owned()
        }
        TurnError::NotFound { .. } => "❌ Producto no encontrado. Intenta otro nombre.".to_owned(),
        TurnError::Service(ServiceError::Catalog(_)) => {
            "⚠️ El catálogo no está disponible en este momento. Intenta de nuevo en unos minutos."
                .to_owned()
        }
        TurnError::Service(ServiceError::Ledger(_)) => format!(
            "⚠️ No pudimos guardar tu pedido. Escribe *{}* para reintentar.",
            keywords.primary(Keyword::Finish)
        ),
        TurnError::Domain(_) => format!(
            "❌ Hubo un problema con tu pedido. Escribe *{}* para empezar de nuevo.",
            keywords.primary(Keyword::Cancel)
        ),
    }
}
