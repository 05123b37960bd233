use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::catalog::{CatalogClient, CatalogError};
use crate::config::AppConfig;
use crate::domain::customer::PhoneNumber;
use crate::domain::order::{Order, OrderIdAllocator};
use crate::domain::product::CatalogItem;
use crate::errors::{DomainError, ServiceError, TurnError, ValidationError};
use crate::flows::keywords::{Keyword, KeywordSet};
use crate::flows::replies;
use crate::flows::session::Session;
use crate::flows::states::{Stage, StageKind};
use crate::ledger::{CommitReceipt, LedgerError, OrderLedger};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    pub catalog_timeout: Duration,
    pub ledger_timeout: Duration,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            catalog_timeout: Duration::from_secs(config.catalog.timeout_secs),
            ledger_timeout: Duration::from_secs(config.ledger.timeout_secs),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self { catalog_timeout: Duration::from_secs(10), ledger_timeout: Duration::from_secs(15) }
    }
}

/// Result of one inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    pub replies: Vec<String>,
    pub from: StageKind,
    pub to: StageKind,
    /// Set when this turn committed an order.
    pub receipt: Option<CommitReceipt>,
    /// The recoverable error this turn reported to the customer, if any.
    pub error: Option<TurnError>,
}

impl TurnOutcome {
    pub fn transitioned(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug, Default)]
struct Step {
    replies: Vec<String>,
    receipt: Option<CommitReceipt>,
    error: Option<TurnError>,
}

impl Step {
    fn reply(text: String) -> Self {
        Self { replies: vec![text], ..Self::default() }
    }
}

pub struct ConversationEngine {
    catalog: Arc<dyn CatalogClient>,
    ledger: Arc<dyn OrderLedger>,
    allocator: Arc<OrderIdAllocator>,
    keywords: KeywordSet,
    settings: EngineSettings,
    audit: Arc<dyn AuditSink>,
}

impl ConversationEngine {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        ledger: Arc<dyn OrderLedger>,
        allocator: Arc<OrderIdAllocator>,
        keywords: KeywordSet,
        settings: EngineSettings,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { catalog, ledger, allocator, keywords, settings, audit }
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    pub fn catalog_backend(&self) -> &'static str {
        self.catalog.backend()
    }

    pub fn ledger_backend(&self) -> &'static str {
        self.ledger.backend()
    }

    pub fn allocator(&self) -> &OrderIdAllocator {
        &self.allocator
    }

    /// Runs one turn. Never fails: every error becomes a reply and leaves the
    /// session exactly as it was before the turn.
    pub async fn handle(
        &self,
        session: &mut Session,
        input: &str,
        correlation_id: &str,
    ) -> TurnOutcome {
        let text = input.trim();
        let from = session.stage.kind();
        let keyword = self.keywords.classify(text);

        let result = if keyword == Some(Keyword::Cancel) {
            Ok(self.cancel(session, correlation_id))
        } else {
            match session.stage {
                Stage::Start => Ok(self.on_start(session, keyword, correlation_id)),
                Stage::CollectingName => self.on_name(session, text),
                Stage::CollectingAddress => self.on_address(session, text),
                Stage::CollectingPhone => self.on_phone(session, text, correlation_id),
                Stage::SearchingProduct if keyword == Some(Keyword::Finish) => {
                    self.on_finish(session, correlation_id).await
                }
                Stage::SearchingProduct => self.on_search(session, text, correlation_id).await,
                Stage::ResolvingSelection { .. } => self.on_selection(session, text),
                Stage::AwaitingQuantity { .. } => self.on_quantity(session, text),
            }
        };

        let step = result.unwrap_or_else(|error| {
            self.reject(session, &error, correlation_id);
            Step {
                replies: vec![replies::for_error(&error, from, &self.keywords)],
                receipt: None,
                error: Some(error),
            }
        });

        let to = session.stage.kind();
        if from != to {
            self.audit.emit(
                AuditEvent::new(
                    &self.audit_context(session, correlation_id),
                    "conversation.stage_changed",
                    AuditCategory::Conversation,
                    AuditOutcome::Success,
                )
                .with_metadata("from", from.as_str())
                .with_metadata("to", to.as_str()),
            );
        }

        tracing::debug!(
            event_name = "conversation.turn_handled",
            conversation_id = %session.conversation_id,
            correlation_id,
            from = %from,
            to = %to,
            replies = step.replies.len(),
            "conversation turn handled"
        );

        TurnOutcome { replies: step.replies, from, to, receipt: step.receipt, error: step.error }
    }

    fn on_start(&self, session: &mut Session, keyword: Option<Keyword>, correlation_id: &str) -> Step {
        match keyword {
            Some(Keyword::Greeting | Keyword::Start) => {
                session.stage = Stage::CollectingName;
                Step::reply(replies::ask_name())
            }
            Some(Keyword::Finish) => self.cancel(session, correlation_id),
            Some(Keyword::Cancel) | None => Step::reply(replies::welcome(&self.keywords)),
        }
    }

    fn on_name(&self, session: &mut Session, text: &str) -> Result<Step, TurnError> {
        if text.is_empty() {
            return Err(ValidationError::EmptyInput.into());
        }
        session.customer.set_name(text)?;
        session.stage = Stage::CollectingAddress;
        Ok(Step::reply(replies::ask_address()))
    }

    fn on_address(&self, session: &mut Session, text: &str) -> Result<Step, TurnError> {
        if text.is_empty() {
            return Err(ValidationError::EmptyInput.into());
        }
        session.customer.set_address(text)?;
        session.stage = Stage::CollectingPhone;
        Ok(Step::reply(replies::ask_phone()))
    }

    fn on_phone(
        &self,
        session: &mut Session,
        text: &str,
        correlation_id: &str,
    ) -> Result<Step, TurnError> {
        let phone = PhoneNumber::parse(text)?;
        session.customer.set_phone(phone)?;

        let order_id = self.allocator.allocate();
        session.order_id = Some(order_id.clone());
        session.stage = Stage::SearchingProduct;

        tracing::info!(
            event_name = "order.id_allocated",
            conversation_id = %session.conversation_id,
            correlation_id,
            order_id = %order_id,
            "order id allocated"
        );
        self.audit.emit(AuditEvent::new(
            &self.audit_context(session, correlation_id),
            "order.id_allocated",
            AuditCategory::Order,
            AuditOutcome::Success,
        ));

        Ok(Step::reply(replies::customer_registered(&order_id)))
    }

    async fn on_search(
        &self,
        session: &mut Session,
        term: &str,
        correlation_id: &str,
    ) -> Result<Step, TurnError> {
        if term.is_empty() {
            return Err(ValidationError::EmptyInput.into());
        }

        let candidates = match self.search_catalog(term).await {
            Ok(candidates) => candidates,
            Err(error) => {
                tracing::warn!(
                    event_name = "catalog.search_failed",
                    conversation_id = %session.conversation_id,
                    correlation_id,
                    backend = self.catalog.backend(),
                    error = %error,
                    "catalog search failed"
                );
                return Err(error.into());
            }
        };

        if candidates.is_empty() {
            return Err(TurnError::NotFound { term: term.to_owned() });
        }

        let reply = replies::candidate_list(&candidates);
        session.stage = Stage::ResolvingSelection { candidates };
        Ok(Step::reply(reply))
    }

    fn on_selection(&self, session: &mut Session, text: &str) -> Result<Step, TurnError> {
        let selected = match session.stage {
            Stage::ResolvingSelection { ref candidates } => select_candidate(candidates, text)?,
            _ => return Err(ValidationError::UnknownSelection { input: text.to_owned() }.into()),
        };

        let reply = replies::ask_quantity(&selected);
        session.stage = Stage::AwaitingQuantity { selected };
        Ok(Step::reply(reply))
    }

    fn on_quantity(&self, session: &mut Session, text: &str) -> Result<Step, TurnError> {
        let quantity = parse_quantity(text)?;
        let selected = match session.stage {
            Stage::AwaitingQuantity { ref selected } => selected.clone(),
            _ => return Err(ValidationError::InvalidQuantity { input: text.to_owned() }.into()),
        };

        session
            .cart
            .add_line(selected.product_name, selected.price, quantity)
            .map_err(|_| ValidationError::QuantityTooLarge { input: text.to_owned() })?;
        session.stage = Stage::SearchingProduct;
        Ok(Step::reply(replies::item_added(&self.keywords)))
    }

    async fn on_finish(&self, session: &mut Session, correlation_id: &str) -> Result<Step, TurnError> {
        if session.cart.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        let customer = session.customer.complete()?;
        let order_id = session.order_id.clone().ok_or(DomainError::MissingOrderId)?;
        let placed_at = *session.placed_at.get_or_insert_with(Utc::now);
        let order = Order::from_cart(order_id, customer, &session.cart, placed_at)?;
        let summary = replies::order_summary(&order);

        let context = self.audit_context(session, correlation_id);
        self.audit.emit(
            AuditEvent::new(
                &context,
                "conversation.stage_changed",
                AuditCategory::Conversation,
                AuditOutcome::Success,
            )
            .with_metadata("from", StageKind::SearchingProduct.as_str())
            .with_metadata("to", StageKind::Committing.as_str()),
        );

        match self.commit(&order).await {
            Ok(receipt) => {
                tracing::info!(
                    event_name = "order.committed",
                    conversation_id = %session.conversation_id,
                    correlation_id,
                    order_id = %order.id,
                    backend = self.ledger.backend(),
                    total = %order.total,
                    lines = order.lines.len(),
                    "order committed"
                );
                self.audit.emit(
                    AuditEvent::new(
                        &context,
                        "order.committed",
                        AuditCategory::Order,
                        AuditOutcome::Success,
                    )
                    .with_metadata("total", order.total.to_string())
                    .with_metadata("lines", order.lines.len().to_string()),
                );
                session.reset();
                Ok(Step {
                    replies: vec![summary, replies::order_saved(&order.id)],
                    receipt: Some(receipt),
                    error: None,
                })
            }
            Err(error) => {
                tracing::error!(
                    event_name = "order.commit_failed",
                    conversation_id = %session.conversation_id,
                    correlation_id,
                    order_id = %order.id,
                    backend = self.ledger.backend(),
                    partial = error.is_partial(),
                    error = %error,
                    "order commit failed; cart kept for retry"
                );
                self.audit.emit(
                    AuditEvent::new(
                        &context,
                        "order.commit_failed",
                        AuditCategory::Order,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("error", error.to_string())
                    .with_metadata("partial", error.is_partial().to_string()),
                );
                Ok(Step {
                    replies: vec![summary, replies::commit_failed(&order.id, &self.keywords)],
                    receipt: None,
                    error: Some(TurnError::Service(ServiceError::Ledger(error))),
                })
            }
        }
    }

    fn cancel(&self, session: &mut Session, correlation_id: &str) -> Step {
        if let Some(order_id) = &session.order_id {
            tracing::warn!(
                event_name = "order.id_burned",
                conversation_id = %session.conversation_id,
                correlation_id,
                order_id = %order_id,
                "conversation cancelled after order id allocation"
            );
            self.audit.emit(
                AuditEvent::new(
                    &self.audit_context(session, correlation_id),
                    "order.id_burned",
                    AuditCategory::Order,
                    AuditOutcome::Rejected,
                )
                .with_metadata("stage", session.stage.kind().as_str()),
            );
        }
        session.reset();
        Step::reply(replies::cancelled())
    }

    fn reject(&self, session: &Session, error: &TurnError, correlation_id: &str) {
        let (category, outcome) = match error {
            TurnError::Validation(_) | TurnError::NotFound { .. } => {
                (AuditCategory::Conversation, AuditOutcome::Rejected)
            }
            TurnError::Service(ServiceError::Catalog(_)) => {
                (AuditCategory::Catalog, AuditOutcome::Failed)
            }
            TurnError::Service(ServiceError::Ledger(_)) => (AuditCategory::Order, AuditOutcome::Failed),
            TurnError::Domain(_) => (AuditCategory::System, AuditOutcome::Failed),
        };
        self.audit.emit(
            AuditEvent::new(
                &self.audit_context(session, correlation_id),
                "conversation.input_rejected",
                category,
                outcome,
            )
            .with_metadata("stage", session.stage.kind().as_str())
            .with_metadata("error", error.to_string()),
        );
    }

    async fn search_catalog(&self, term: &str) -> Result<Vec<CatalogItem>, CatalogError> {
        let timeout = self.settings.catalog_timeout;
        tokio::time::timeout(timeout, self.catalog.search(term))
            .await
            .unwrap_or(Err(CatalogError::Timeout { after_secs: timeout.as_secs() }))
    }

    async fn commit(&self, order: &Order) -> Result<CommitReceipt, LedgerError> {
        let timeout = self.settings.ledger_timeout;
        tokio::time::timeout(timeout, self.ledger.commit(order))
            .await
            .unwrap_or(Err(LedgerError::Timeout { after_secs: timeout.as_secs() }))
    }

    fn audit_context(&self, session: &Session, correlation_id: &str) -> AuditContext {
        AuditContext::new(
            session.conversation_id.as_str(),
            session.order_id.clone(),
            correlation_id,
        )
    }
}

fn select_candidate(candidates: &[CatalogItem], text: &str) -> Result<CatalogItem, ValidationError> {
    candidates
        .iter()
        .find(|item| item.has_name(text))
        .cloned()
        .ok_or_else(|| ValidationError::UnknownSelection { input: text.to_owned() })
}

/// Plain positive integers only: no sign, no decimals, no trailing text.
fn parse_quantity(text: &str) -> Result<NonZeroU32, ValidationError> {
    let invalid = || ValidationError::InvalidQuantity { input: text.to_owned() };
    if text.is_empty() || !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(invalid());
    }
    text.parse::<NonZeroU32>().map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use super::{parse_quantity, ConversationEngine, EngineSettings, TurnOutcome};
    use crate::audit::InMemoryAuditSink;
    use crate::catalog::{CatalogClient, CatalogError, InMemoryCatalog};
    use crate::domain::order::{Order, OrderId, OrderIdAllocator};
    use crate::domain::product::CatalogItem;
    use crate::errors::{ServiceError, TurnError, ValidationError};
    use crate::flows::keywords::KeywordSet;
    use crate::flows::session::{ConversationId, Session};
    use crate::flows::states::{Stage, StageKind};
    use crate::ledger::{CommitReceipt, LedgerError, OrderLedger};

    #[derive(Default)]
    struct RecordingLedger {
        orders: Mutex<Vec<Order>>,
        failures_left: AtomicUsize,
    }

    impl RecordingLedger {
        fn failing(times: usize) -> Self {
            Self { orders: Mutex::new(Vec::new()), failures_left: AtomicUsize::new(times) }
        }

        fn orders(&self) -> Vec<Order> {
            self.orders.lock().expect("ledger lock").clone()
        }
    }

    #[async_trait]
    impl OrderLedger for RecordingLedger {
        fn backend(&self) -> &'static str {
            "recording"
        }

        async fn commit(&self, order: &Order) -> Result<CommitReceipt, LedgerError> {
            let remaining = self.failures_left.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_left.store(remaining - 1, Ordering::SeqCst);
                return Err(LedgerError::LinesRejected {
                    order_id: order.id.clone(),
                    reason: "HTTP 500".to_owned(),
                });
            }
            self.orders.lock().expect("ledger lock").push(order.clone());
            Ok(CommitReceipt {
                order_id: order.id.clone(),
                header_written: true,
                lines_written: order.lines.len(),
            })
        }
    }

    struct BrokenCatalog;

    #[async_trait]
    impl CatalogClient for BrokenCatalog {
        fn backend(&self) -> &'static str {
            "broken"
        }

        async fn search(&self, _term: &str) -> Result<Vec<CatalogItem>, CatalogError> {
            Err(CatalogError::Unavailable("connection refused".to_owned()))
        }
    }

    struct StalledCatalog;

    #[async_trait]
    impl CatalogClient for StalledCatalog {
        fn backend(&self) -> &'static str {
            "stalled"
        }

        async fn search(&self, _term: &str) -> Result<Vec<CatalogItem>, CatalogError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    fn catalog() -> Arc<InMemoryCatalog> {
        Arc::new(InMemoryCatalog::new(vec![
            CatalogItem::new("Jabon Azul", Decimal::from(5)),
            CatalogItem::new("Jabon Rosa", Decimal::new(550, 2)),
            CatalogItem::new("Soap", Decimal::from(5)),
            CatalogItem::new("Shampoo", Decimal::from(8)),
        ]))
    }

    struct Harness {
        engine: ConversationEngine,
        ledger: Arc<RecordingLedger>,
        audit: InMemoryAuditSink,
    }

    struct StalledLedger;

    #[async_trait]
    impl OrderLedger for StalledLedger {
        fn backend(&self) -> &'static str {
            "stalled"
        }

        async fn commit(&self, order: &Order) -> Result<CommitReceipt, LedgerError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(LedgerError::LinesRejected {
                order_id: order.id.clone(),
                reason: "never answered".to_owned(),
            })
        }
    }

    fn harness_with(catalog: Arc<dyn CatalogClient>, ledger: RecordingLedger) -> Harness {
        let ledger = Arc::new(ledger);
        let (engine, audit) = engine_with(catalog, ledger.clone());
        Harness { engine, ledger, audit }
    }

    fn engine_with(
        catalog: Arc<dyn CatalogClient>,
        ledger: Arc<dyn OrderLedger>,
    ) -> (ConversationEngine, InMemoryAuditSink) {
        let audit = InMemoryAuditSink::default();
        let engine = ConversationEngine::new(
            catalog,
            ledger,
            Arc::new(OrderIdAllocator::default()),
            KeywordSet::default(),
            EngineSettings {
                catalog_timeout: Duration::from_millis(50),
                ledger_timeout: Duration::from_millis(50),
            },
            Arc::new(audit.clone()),
        );
        (engine, audit)
    }

    fn harness() -> Harness {
        harness_with(catalog(), RecordingLedger::default())
    }

    fn session() -> Session {
        Session::new(ConversationId::from("whatsapp:+573001234567"))
    }

    async fn run(engine: &ConversationEngine, session: &mut Session, inputs: &[&str]) -> Vec<TurnOutcome> {
        let mut outcomes = Vec::new();
        for input in inputs {
            outcomes.push(engine.handle(session, input, "req-test").await);
        }
        outcomes
    }

    #[tokio::test]
    async fn full_order_scenario_commits_and_resets() {
        let h = harness();
        let mut session = session();

        let outcomes = run(
            &h.engine,
            &mut session,
            &["hola", "Ana", "Calle 1", "3001234567", "jabon", "Jabon Azul", "3", "fin"],
        )
        .await;

        let last = outcomes.last().expect("final turn");
        assert_eq!(last.to, StageKind::Start);
        assert_eq!(last.replies.len(), 2);
        assert!(last.replies[0].contains("Jabon Azul x3 = $15"));
        assert!(last.replies[1].contains("Gracias por tu compra"));
        assert_eq!(last.receipt.as_ref().map(|r| r.order_id.as_str()), Some("PED-00001"));

        let orders = h.ledger.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].lines.len(), 1);
        assert_eq!(orders[0].lines[0].quantity(), 3);
        assert_eq!(orders[0].lines[0].line_total(), Decimal::from(15));
        assert_eq!(orders[0].customer.name, "Ana");
        assert!(session.is_pristine());

        let restart = h.engine.handle(&mut session, "pedido", "req-test").await;
        assert_eq!(restart.to, StageKind::CollectingName);
    }

    #[tokio::test]
    async fn two_item_order_totals_eighteen() {
        let h = harness();
        let mut session = session();

        run(
            &h.engine,
            &mut session,
            &[
                "pedido", "Ana", "Calle 1", "3001234567", "soap", "Soap", "2", "shampoo", "shampoo",
                "1", "FIN",
            ],
        )
        .await;

        let orders = h.ledger.orders();
        assert_eq!(orders.len(), 1);
        let order = &orders[0];
        assert_eq!(order.total, Decimal::from(18));
        let records = order.line_records();
        assert_eq!(records.len(), 2);
        assert_eq!(
            (records[0].product_name.as_str(), records[0].quantity, records[0].unit_price),
            ("Soap", 2, Decimal::from(5))
        );
        assert_eq!(records[0].line_total, Decimal::from(10));
        assert_eq!(
            (records[1].product_name.as_str(), records[1].quantity, records[1].line_total),
            ("Shampoo", 1, Decimal::from(8))
        );
    }

    #[tokio::test]
    async fn phone_must_be_exactly_ten_digits() {
        let h = harness();
        for bad in ["300123456", "30012345678", "300-123-456", "abcdefghij", "", "３００１２３４５６７"] {
            let mut session = session();
            run(&h.engine, &mut session, &["pedido", "Ana", "Calle 1"]).await;

            let outcome = h.engine.handle(&mut session, bad, "req-test").await;
            assert_eq!(outcome.to, StageKind::CollectingPhone, "input {bad:?}");
            assert!(session.order_id.is_none());
            assert!(outcome.replies[0].contains("10 dígitos"), "input {bad:?}");
        }
    }

    #[tokio::test]
    async fn order_ids_increase_across_sessions() {
        let h = harness();
        let mut first = session();
        let mut second = Session::new(ConversationId::from("whatsapp:+573009999999"));

        run(&h.engine, &mut first, &["pedido", "Ana", "Calle 1", "3001234567"]).await;
        run(&h.engine, &mut second, &["pedido", "Luis", "Carrera 2", " 3009999999 "]).await;

        assert_eq!(first.order_id, Some(OrderId("PED-00001".to_owned())));
        assert_eq!(second.order_id, Some(OrderId("PED-00002".to_owned())));
        assert_eq!(second.stage, Stage::SearchingProduct);
    }

    #[tokio::test]
    async fn cancel_from_every_stage_restores_initial_session() {
        let prefixes: [&[&str]; 8] = [
            &[],
            &["pedido"],
            &["pedido", "Ana"],
            &["pedido", "Ana", "Calle 1"],
            &["pedido", "Ana", "Calle 1", "3001234567"],
            &["pedido", "Ana", "Calle 1", "3001234567", "jabon"],
            &["pedido", "Ana", "Calle 1", "3001234567", "jabon", "jabon azul"],
            &["pedido", "Ana", "Calle 1", "3001234567", "jabon", "jabon azul", "2", "soap"],
        ];

        for prefix in prefixes {
            let h = harness();
            let mut session = session();
            run(&h.engine, &mut session, prefix).await;

            let outcome = h.engine.handle(&mut session, "Cancelar", "req-test").await;
            assert_eq!(outcome.to, StageKind::Start);
            assert!(outcome.replies[0].contains("cancelado"));
            assert_eq!(session, Session::new(ConversationId::from("whatsapp:+573001234567")));
        }
    }

    #[tokio::test]
    async fn cancel_after_allocation_audits_burned_id() {
        let h = harness();
        let mut session = session();
        run(&h.engine, &mut session, &["pedido", "Ana", "Calle 1", "3001234567", "salir"]).await;

        assert!(h.audit.event_types().iter().any(|event| event == "order.id_burned"));
        assert!(h.ledger.orders().is_empty());
    }

    #[tokio::test]
    async fn finish_at_start_acts_as_cancel() {
        let h = harness();
        let mut session = session();
        let outcome = h.engine.handle(&mut session, "fin", "req-test").await;
        assert_eq!(outcome.to, StageKind::Start);
        assert!(outcome.replies[0].contains("cancelado"));
    }

    #[tokio::test]
    async fn unknown_input_at_start_reprompts_without_state_change() {
        let h = harness();
        let mut session = session();
        let outcome = h.engine.handle(&mut session, "quiero jabon", "req-test").await;
        assert_eq!(outcome.to, StageKind::Start);
        assert!(outcome.replies[0].contains("pedido"));
        assert!(session.is_pristine());
    }

    #[tokio::test]
    async fn empty_name_is_reprompted() {
        let h = harness();
        let mut session = session();
        run(&h.engine, &mut session, &["pedido"]).await;

        let outcome = h.engine.handle(&mut session, "   ", "req-test").await;
        assert_eq!(outcome.to, StageKind::CollectingName);
        assert_eq!(outcome.error, Some(TurnError::Validation(ValidationError::EmptyInput)));
        assert!(session.customer.name().is_none());
    }

    #[tokio::test]
    async fn search_without_matches_keeps_stage_and_cart() {
        let h = harness();
        let mut session = session();
        run(&h.engine, &mut session, &["pedido", "Ana", "Calle 1", "3001234567", "soap", "soap", "1"])
            .await;
        let cart_before = session.cart.clone();

        let outcome = h.engine.handle(&mut session, "cepillo", "req-test").await;
        assert_eq!(outcome.to, StageKind::SearchingProduct);
        assert!(matches!(outcome.error, Some(TurnError::NotFound { .. })));
        assert!(outcome.replies[0].contains("no encontrado"));
        assert_eq!(session.cart, cart_before);
    }

    #[tokio::test]
    async fn catalog_outage_has_its_own_reply() {
        let h = harness_with(Arc::new(BrokenCatalog), RecordingLedger::default());
        let mut session = session();
        run(&h.engine, &mut session, &["pedido", "Ana", "Calle 1", "3001234567"]).await;

        let outcome = h.engine.handle(&mut session, "jabon", "req-test").await;
        assert_eq!(outcome.to, StageKind::SearchingProduct);
        assert!(matches!(outcome.error, Some(TurnError::Service(ServiceError::Catalog(_)))));
        assert!(outcome.replies[0].contains("no está disponible"));
    }

    #[tokio::test]
    async fn catalog_timeout_is_a_service_failure() {
        let h = harness_with(Arc::new(StalledCatalog), RecordingLedger::default());
        let mut session = session();
        run(&h.engine, &mut session, &["pedido", "Ana", "Calle 1", "3001234567"]).await;

        let outcome = h.engine.handle(&mut session, "jabon", "req-test").await;
        assert_eq!(
            outcome.error,
            Some(TurnError::Service(ServiceError::Catalog(CatalogError::Timeout { after_secs: 0 })))
        );
        assert_eq!(session.stage, Stage::SearchingProduct);
    }

    #[tokio::test]
    async fn selection_must_name_a_listed_candidate() {
        let h = harness();
        let mut session = session();
        run(&h.engine, &mut session, &["pedido", "Ana", "Calle 1", "3001234567", "jabon"]).await;

        let miss = h.engine.handle(&mut session, "Shampoo", "req-test").await;
        assert_eq!(miss.to, StageKind::ResolvingSelection);
        assert!(miss.replies[0].contains("Producto inválido"));

        let hit = h.engine.handle(&mut session, "JABON ROSA", "req-test").await;
        assert_eq!(hit.to, StageKind::AwaitingQuantity);
        assert_eq!(
            session.stage,
            Stage::AwaitingQuantity { selected: CatalogItem::new("Jabon Rosa", Decimal::new(550, 2)) }
        );
    }

    #[tokio::test]
    async fn quantity_must_be_a_positive_integer() {
        let h = harness();
        let mut session = session();
        run(&h.engine, &mut session, &["pedido", "Ana", "Calle 1", "3001234567", "soap", "soap"])
            .await;

        for bad in ["0", "-2", "1.5", "dos", "3 unidades", ""] {
            let outcome = h.engine.handle(&mut session, bad, "req-test").await;
            assert_eq!(outcome.to, StageKind::AwaitingQuantity, "input {bad:?}");
            assert!(session.cart.is_empty());
        }

        let outcome = h.engine.handle(&mut session, "4", "req-test").await;
        assert_eq!(outcome.to, StageKind::SearchingProduct);
        assert_eq!(session.cart.total(), Decimal::from(20));
    }

    #[tokio::test]
    async fn quantity_overflowing_the_amount_is_reprompted() {
        let catalog = Arc::new(InMemoryCatalog::new(vec![
            CatalogItem::new("Yate", Decimal::MAX),
            CatalogItem::new("Soap", Decimal::from(5)),
        ]));
        let h = harness_with(catalog, RecordingLedger::default());
        let mut session = session();
        run(&h.engine, &mut session, &["pedido", "Ana", "Calle 1", "3001234567", "yate", "yate"])
            .await;

        let outcome = h.engine.handle(&mut session, "1000000000", "req-test").await;
        assert_eq!(
            outcome.error,
            Some(TurnError::Validation(ValidationError::QuantityTooLarge {
                input: "1000000000".to_owned()
            }))
        );
        assert_eq!(outcome.to, StageKind::AwaitingQuantity);
        assert!(outcome.replies[0].contains("Cantidad demasiado grande"));
        assert!(session.cart.is_empty());

        let accepted = h.engine.handle(&mut session, "1", "req-test").await;
        assert_eq!(accepted.to, StageKind::SearchingProduct);
        assert_eq!(session.cart.total(), Decimal::MAX);
    }

    #[tokio::test]
    async fn finishing_an_empty_cart_is_rejected() {
        let h = harness();
        let mut session = session();
        run(&h.engine, &mut session, &["pedido", "Ana", "Calle 1", "3001234567"]).await;

        let outcome = h.engine.handle(&mut session, "fin", "req-test").await;
        assert_eq!(outcome.to, StageKind::SearchingProduct);
        assert_eq!(outcome.replies, vec!["❌ No hay productos agregados.".to_owned()]);
        assert!(h.ledger.orders().is_empty());
    }

    #[tokio::test]
    async fn failed_commit_keeps_order_for_retry_with_same_id() {
        let h = harness_with(catalog(), RecordingLedger::failing(1));
        let mut session = session();
        let outcomes = run(
            &h.engine,
            &mut session,
            &["pedido", "Ana", "Calle 1", "3001234567", "soap", "soap", "2", "fin"],
        )
        .await;

        let failed = outcomes.last().expect("finish turn");
        assert_eq!(failed.to, StageKind::SearchingProduct);
        assert_eq!(failed.replies.len(), 2);
        assert!(failed.replies[1].contains("No pudimos guardar"));
        assert!(matches!(failed.error, Some(TurnError::Service(ServiceError::Ledger(_)))));
        assert_eq!(session.cart.len(), 1);
        assert_eq!(session.order_id, Some(OrderId("PED-00001".to_owned())));
        assert!(h.audit.event_types().iter().any(|event| event == "order.commit_failed"));
        let first_attempt = session.placed_at.expect("first finish stamps the order time");

        tokio::time::sleep(Duration::from_millis(5)).await;
        let retried = h.engine.handle(&mut session, "fin", "req-test").await;
        assert_eq!(retried.to, StageKind::Start);
        let orders = h.ledger.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id.as_str(), "PED-00001");
        assert_eq!(orders[0].placed_at, first_attempt);
        assert_eq!(h.engine.allocator().peek_next(), 2);
        assert!(session.placed_at.is_none());
    }

    #[tokio::test]
    async fn ledger_timeout_keeps_cart_and_id_for_retry() {
        let (engine, audit) = engine_with(catalog(), Arc::new(StalledLedger));
        let mut session = session();
        run(&engine, &mut session, &["pedido", "Ana", "Calle 1", "3001234567", "soap", "soap", "2"])
            .await;

        let outcome = engine.handle(&mut session, "fin", "req-test").await;
        assert_eq!(
            outcome.error,
            Some(TurnError::Service(ServiceError::Ledger(LedgerError::Timeout { after_secs: 0 })))
        );
        assert_eq!(outcome.to, StageKind::SearchingProduct);
        assert!(outcome.replies[1].contains("No pudimos guardar"));
        assert_eq!(session.stage, Stage::SearchingProduct);
        assert_eq!(session.cart.len(), 1);
        assert_eq!(session.cart.total(), Decimal::from(10));
        assert_eq!(session.order_id, Some(OrderId("PED-00001".to_owned())));
        assert!(audit.event_types().iter().any(|event| event == "order.commit_failed"));
    }

    #[tokio::test]
    async fn stage_changes_are_audited() {
        let h = harness();
        let mut session = session();
        run(&h.engine, &mut session, &["pedido", "Ana"]).await;

        let transitions = h
            .audit
            .events()
            .into_iter()
            .filter(|event| event.event_type == "conversation.stage_changed")
            .map(|event| {
                (
                    event.metadata.get("from").cloned().unwrap_or_default(),
                    event.metadata.get("to").cloned().unwrap_or_default(),
                )
            })
            .collect::<Vec<_>>();
        assert_eq!(
            transitions,
            vec![
                ("start".to_owned(), "collecting_name".to_owned()),
                ("collecting_name".to_owned(), "collecting_address".to_owned()),
            ]
        );
    }

    #[test]
    fn quantity_parser_rejects_signs_and_zero() {
        assert!(parse_quantity("+3").is_err());
        assert!(parse_quantity("0").is_err());
        assert!(parse_quantity("99999999999").is_err());
        assert_eq!(parse_quantity("12").map(|q| q.get()), Ok(12));
    }
}
