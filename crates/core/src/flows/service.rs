use std::sync::Arc;

use crate::flows::engine::{ConversationEngine, TurnOutcome};
use crate::flows::keywords::Keyword;
use crate::flows::replies;
use crate::flows::session::{ConversationId, Session, SessionStore};

/// Entry point for inbound messages: finds or creates the conversation's
/// session, serialises turns on it and delegates to the engine. A session is
/// evicted once its order is committed or cancelled.
#[derive(Clone)]
pub struct ConversationService {
    store: SessionStore,
    engine: Arc<ConversationEngine>,
}

impl ConversationService {
    pub fn new(engine: ConversationEngine) -> Self {
        Self { store: SessionStore::new(), engine: Arc::new(engine) }
    }

    pub fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub async fn handle_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
        correlation_id: &str,
    ) -> TurnOutcome {
        let (handle, created, mut session) = loop {
            let (handle, created) = self.store.get_or_create(conversation_id).await;
            let session = Arc::clone(&handle).lock_owned().await;
            if self.store.is_current(conversation_id, &handle).await {
                break (handle, created, session);
            }
        };

        if created {
            tracing::info!(
                event_name = "conversation.created",
                conversation_id = %conversation_id,
                correlation_id,
                "conversation session created"
            );
            if self.engine.keywords().classify(text) == Some(Keyword::Greeting) {
                let stage = session.stage.kind();
                return TurnOutcome {
                    replies: vec![replies::welcome(self.engine.keywords())],
                    from: stage,
                    to: stage,
                    receipt: None,
                    error: None,
                };
            }
        }

        let was_pristine = session.is_pristine();
        let outcome = self.engine.handle(&mut session, text, correlation_id).await;

        // Committed or cancelled: nothing left to keep for this conversation.
        if !was_pristine
            && session.is_pristine()
            && self.store.remove_if_current(conversation_id, &handle).await
        {
            tracing::info!(
                event_name = "conversation.closed",
                conversation_id = %conversation_id,
                correlation_id,
                committed = outcome.receipt.is_some(),
                "conversation session evicted"
            );
        }
        outcome
    }

    /// Copy of the current session state, if the conversation exists.
    pub async fn snapshot(&self, conversation_id: &ConversationId) -> Option<Session> {
        let session = self.store.get(conversation_id).await?;
        let guard = session.lock().await;
        Some(guard.clone())
    }

    pub async fn session_count(&self) -> usize {
        self.store.len().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use super::ConversationService;
    use crate::audit::TracingAuditSink;
    use crate::catalog::{CatalogClient, CatalogError, InMemoryCatalog};
    use crate::domain::order::{Order, OrderIdAllocator};
    use crate::domain::product::CatalogItem;
    use crate::flows::engine::{ConversationEngine, EngineSettings};
    use crate::flows::keywords::KeywordSet;
    use crate::flows::session::ConversationId;
    use crate::flows::states::{Stage, StageKind};
    use crate::ledger::{CommitReceipt, LedgerError, OrderLedger};

    struct AcceptingLedger;

    #[async_trait]
    impl OrderLedger for AcceptingLedger {
        fn backend(&self) -> &'static str {
            "accepting"
        }

        async fn commit(&self, order: &Order) -> Result<CommitReceipt, LedgerError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(CommitReceipt {
                order_id: order.id.clone(),
                header_written: true,
                lines_written: order.lines.len(),
            })
        }
    }

    /// Catalog that takes a while to answer, to overlap turns.
    struct SlowCatalog(InMemoryCatalog);

    #[async_trait]
    impl CatalogClient for SlowCatalog {
        fn backend(&self) -> &'static str {
            "slow"
        }

        async fn search(&self, term: &str) -> Result<Vec<CatalogItem>, CatalogError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.0.search(term).await
        }
    }

    fn service() -> ConversationService {
        let catalog = SlowCatalog(InMemoryCatalog::new(vec![CatalogItem::new(
            "Jabon Azul",
            Decimal::from(5),
        )]));
        ConversationService::new(ConversationEngine::new(
            Arc::new(catalog),
            Arc::new(AcceptingLedger),
            Arc::new(OrderIdAllocator::default()),
            KeywordSet::default(),
            EngineSettings::default(),
            Arc::new(TracingAuditSink),
        ))
    }

    #[tokio::test]
    async fn greeting_scenario_commits_and_accepts_a_new_order() {
        let service = service();
        let id = ConversationId::from("whatsapp:+573001234567");
        let inputs =
            ["hola", "pedido", "Ana", "Calle 1", "3001234567", "jabon", "Jabon Azul", "3", "fin"];

        let mut outcomes = Vec::new();
        for input in inputs {
            outcomes.push(service.handle_message(&id, input, "req-1").await);
        }

        assert_eq!(outcomes[0].to, StageKind::Start);
        assert!(outcomes[0].replies[0].contains("Bienvenido"));
        assert_eq!(outcomes[1].to, StageKind::CollectingName);

        let last = outcomes.last().expect("finish turn");
        let receipt = last.receipt.as_ref().expect("order committed");
        assert_eq!(receipt.order_id.as_str(), "PED-00001");
        assert_eq!(receipt.lines_written, 1);
        assert!(last.replies[0].contains("Jabon Azul x3 = $15"));
        assert!(last.replies[1].contains("Gracias por tu compra"));

        let again = service.handle_message(&id, "pedido", "req-2").await;
        assert_eq!(again.to, StageKind::CollectingName);
        assert_eq!(service.session_count().await, 1);
    }

    #[tokio::test]
    async fn first_message_without_greeting_uses_start_rules() {
        let service = service();
        let outcome =
            service.handle_message(&ConversationId::from("luis"), "pedido", "req-1").await;
        assert_eq!(outcome.to, StageKind::CollectingName);
    }

    #[tokio::test]
    async fn conversations_are_isolated_and_run_concurrently() {
        let service = service();
        let ana = ConversationId::from("ana");
        let luis = ConversationId::from("luis");

        for (id, name, phone) in [(&ana, "Ana", "3001234567"), (&luis, "Luis", "3009999999")] {
            for input in ["pedido", name, "Calle 1", phone] {
                service.handle_message(id, input, "req").await;
            }
        }

        let (left, right) = tokio::join!(
            service.handle_message(&ana, "jabon", "req-a"),
            service.handle_message(&luis, "cancelar", "req-b"),
        );
        assert_eq!(left.to, StageKind::ResolvingSelection);
        assert_eq!(right.to, StageKind::Start);

        let ana_session = service.snapshot(&ana).await.expect("ana exists");
        assert_eq!(ana_session.customer.name(), Some("Ana"));
        assert!(service.snapshot(&luis).await.is_none());
    }

    #[tokio::test]
    async fn messages_for_one_conversation_are_serialised() {
        let service = service();
        let id = ConversationId::from("ana");
        for input in ["pedido", "Ana", "Calle 1", "3001234567"] {
            service.handle_message(&id, input, "req").await;
        }

        let (search, selection) = tokio::join!(
            service.handle_message(&id, "jabon", "req-a"),
            service.handle_message(&id, "Jabon Azul", "req-b"),
        );

        assert_eq!(search.to, StageKind::ResolvingSelection);
        assert_eq!(selection.from, StageKind::ResolvingSelection);
        assert_eq!(selection.to, StageKind::AwaitingQuantity);
    }

    #[tokio::test]
    async fn finished_and_cancelled_conversations_are_evicted() {
        let service = service();
        let ana = ConversationId::from("ana");
        let luis = ConversationId::from("luis");

        for input in ["pedido", "Ana", "Calle 1", "3001234567", "jabon", "Jabon Azul", "2"] {
            service.handle_message(&ana, input, "req").await;
        }
        for input in ["pedido", "Luis"] {
            service.handle_message(&luis, input, "req").await;
        }
        assert_eq!(service.session_count().await, 2);

        let committed = service.handle_message(&ana, "fin", "req-fin").await;
        assert!(committed.receipt.is_some());
        assert!(service.snapshot(&ana).await.is_none());

        let cancelled = service.handle_message(&luis, "cancelar", "req-cancel").await;
        assert_eq!(cancelled.to, StageKind::Start);
        assert_eq!(service.session_count().await, 0);

        let welcome = service.handle_message(&ana, "hola", "req-back").await;
        assert!(welcome.replies[0].contains("Bienvenido"));
        assert_eq!(service.session_count().await, 1);
    }

    #[tokio::test]
    async fn message_queued_behind_a_commit_lands_on_a_fresh_session() {
        let service = service();
        let id = ConversationId::from("ana");
        for input in ["pedido", "Ana", "Calle 1", "3001234567", "jabon", "Jabon Azul", "1"] {
            service.handle_message(&id, input, "req").await;
        }

        let (finish, next) = tokio::join!(
            service.handle_message(&id, "fin", "req-a"),
            service.handle_message(&id, "pedido", "req-b"),
        );

        assert!(finish.receipt.is_some());
        assert_eq!(next.to, StageKind::CollectingName);
        let session = service.snapshot(&id).await.expect("new conversation kept");
        assert_eq!(session.stage, Stage::CollectingName);
    }
}
