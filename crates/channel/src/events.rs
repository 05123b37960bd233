use async_trait::async_trait;
use thiserror::Error;

use orderbot_core::errors::DomainError;
use orderbot_core::flows::{ConversationId, ConversationService};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// Transport-assigned id, used as the correlation id for the turn.
    pub message_id: String,
    pub conversation_id: ConversationId,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub conversation_id: ConversationId,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageContext {
    pub correlation_id: String,
}

impl Default for MessageContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandlerError {
    #[error("inbound message rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(
        &self,
        message: &InboundMessage,
        ctx: &MessageContext,
    ) -> Result<Vec<OutboundMessage>, HandlerError>;
}

#[async_trait]
impl MessageHandler for ConversationService {
    async fn handle(
        &self,
        message: &InboundMessage,
        ctx: &MessageContext,
    ) -> Result<Vec<OutboundMessage>, HandlerError> {
        if message.conversation_id.as_str().trim().is_empty() {
            return Err(HandlerError::Rejected(DomainError::MissingConversationId.to_string()));
        }

        let outcome =
            self.handle_message(&message.conversation_id, &message.text, &ctx.correlation_id).await;

        tracing::info!(
            event_name = "conversation.turn_completed",
            conversation_id = %message.conversation_id,
            correlation_id = %ctx.correlation_id,
            from = %outcome.from,
            to = %outcome.to,
            order_id = outcome.receipt.as_ref().map(|receipt| receipt.order_id.as_str()).unwrap_or("none"),
            "conversation turn completed"
        );

        Ok(outcome
            .replies
            .into_iter()
            .map(|text| OutboundMessage { conversation_id: message.conversation_id.clone(), text })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use orderbot_core::audit::InMemoryAuditSink;
    use orderbot_core::catalog::InMemoryCatalog;
    use orderbot_core::domain::order::OrderIdAllocator;
    use orderbot_core::domain::product::CatalogItem;
    use orderbot_core::flows::{
        ConversationEngine, ConversationId, ConversationService, EngineSettings, KeywordSet,
    };
    use orderbot_core::ledger::{CommitReceipt, LedgerError, OrderLedger};
    use orderbot_core::Order;

    use super::{HandlerError, InboundMessage, MessageContext, MessageHandler};

    struct AcceptingLedger;

    #[async_trait::async_trait]
    impl OrderLedger for AcceptingLedger {
        fn backend(&self) -> &'static str {
            "accepting"
        }

        async fn commit(&self, order: &Order) -> Result<CommitReceipt, LedgerError> {
            Ok(CommitReceipt {
                order_id: order.id.clone(),
                header_written: true,
                lines_written: order.lines.len(),
            })
        }
    }

    fn service() -> ConversationService {
        ConversationService::new(ConversationEngine::new(
            Arc::new(InMemoryCatalog::new(vec![CatalogItem::new("Jabon Azul", Decimal::from(5))])),
            Arc::new(AcceptingLedger),
            Arc::new(OrderIdAllocator::default()),
            KeywordSet::default(),
            EngineSettings::default(),
            Arc::new(InMemoryAuditSink::default()),
        ))
    }

    fn message(conversation: &str, text: &str) -> InboundMessage {
        InboundMessage {
            message_id: "msg-1".to_owned(),
            conversation_id: ConversationId::from(conversation),
            text: text.to_owned(),
        }
    }

    #[tokio::test]
    async fn replies_are_addressed_to_the_sender() {
        let service = service();
        let replies = service
            .handle(&message("whatsapp:+573001234567", "pedido"), &MessageContext::default())
            .await
            .expect("handled");

        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].conversation_id.as_str(), "whatsapp:+573001234567");
        assert!(replies[0].text.contains("nombre"));
    }

    #[tokio::test]
    async fn messages_without_conversation_are_rejected() {
        let error = service()
            .handle(&message("  ", "hola"), &MessageContext::default())
            .await
            .expect_err("rejected");
        assert!(matches!(error, HandlerError::Rejected(_)));
    }
}
