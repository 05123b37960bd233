use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::domain::cart::Cart;
use crate::domain::customer::CustomerProfile;
use crate::domain::order::OrderId;
use crate::flows::states::Stage;

/// Channel identity of one customer conversation, e.g. `whatsapp:+573001234567`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub conversation_id: ConversationId,
    pub stage: Stage,
    pub customer: CustomerProfile,
    pub cart: Cart,
    /// Allocated once the phone number is accepted; kept until commit or cancel.
    pub order_id: Option<OrderId>,
    /// Stamped by the first finish attempt so ledger retries reuse it.
    #[serde(default)]
    pub placed_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            stage: Stage::Start,
            customer: CustomerProfile::default(),
            cart: Cart::default(),
            order_id: None,
            placed_at: None,
        }
    }

    /// Back to the initial stage with nothing collected. Idempotent.
    pub fn reset(&mut self) {
        self.stage = Stage::Start;
        self.customer = CustomerProfile::default();
        self.cart.clear();
        self.order_id = None;
        self.placed_at = None;
    }

    pub fn is_pristine(&self) -> bool {
        self.stage == Stage::Start
            && self.customer.is_empty()
            && self.cart.is_empty()
            && self.order_id.is_none()
            && self.placed_at.is_none()
    }
}

/// Sessions keyed by conversation. Each session sits behind its own async
/// mutex: a turn holds it across catalog and ledger calls, so messages of one
/// conversation are processed strictly one at a time while other
/// conversations proceed.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<ConversationId, Arc<Mutex<Session>>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session and whether it was created by this call.
    pub async fn get_or_create(&self, id: &ConversationId) -> (Arc<Mutex<Session>>, bool) {
        if let Some(existing) = self.sessions.read().await.get(id) {
            return (Arc::clone(existing), false);
        }

        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(id) {
            return (Arc::clone(existing), false);
        }
        let session = Arc::new(Mutex::new(Session::new(id.clone())));
        sessions.insert(id.clone(), Arc::clone(&session));
        (session, true)
    }

    pub async fn get(&self, id: &ConversationId) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Whether `session` is still the live entry for `id`. A turn that waited
    /// on an evicted session must fetch the replacement instead.
    pub async fn is_current(&self, id: &ConversationId, session: &Arc<Mutex<Session>>) -> bool {
        self.sessions.read().await.get(id).is_some_and(|live| Arc::ptr_eq(live, session))
    }

    /// Drops the entry for `id` only if it is still `session`.
    pub async fn remove_if_current(
        &self,
        id: &ConversationId,
        session: &Arc<Mutex<Session>>,
    ) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.get(id).is_some_and(|live| Arc::ptr_eq(live, session)) {
            sessions.remove(id);
            return true;
        }
        false
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{ConversationId, Session, SessionStore};
    use crate::domain::customer::PhoneNumber;
    use crate::domain::order::OrderId;
    use crate::flows::states::Stage;

    #[test]
    fn reset_returns_to_a_fresh_session() {
        let id = ConversationId::from("whatsapp:+573001234567");
        let mut session = Session::new(id.clone());
        session.customer.set_name("Ana").expect("name");
        session.customer.set_address("Calle 1").expect("address");
        session.customer.set_phone(PhoneNumber::parse("3001234567").expect("phone")).expect("set");
        session.cart.add_line("Soap", Decimal::from(5), NonZeroU32::MIN).expect("line fits");
        session.order_id = Some(OrderId("PED-00003".to_owned()));
        session.placed_at = Some(Utc::now());
        session.stage = Stage::SearchingProduct;

        session.reset();
        assert_eq!(session, Session::new(id.clone()));
        assert!(session.is_pristine());

        session.reset();
        assert_eq!(session, Session::new(id));
    }

    #[tokio::test]
    async fn store_creates_once_per_conversation() {
        let store = SessionStore::new();
        let ana = ConversationId::from("ana");

        let (first, created) = store.get_or_create(&ana).await;
        assert!(created);
        let (second, created_again) = store.get_or_create(&ana).await;
        assert!(!created_again);
        assert!(Arc::ptr_eq(&first, &second));

        store.get_or_create(&ConversationId::from("luis")).await;
        assert_eq!(store.len().await, 2);
        assert!(store.is_current(&ana, &first).await);
        assert!(store.remove_if_current(&ana, &first).await);
        assert!(store.get(&ana).await.is_none());
        assert!(!store.is_current(&ana, &first).await);
    }

    #[tokio::test]
    async fn stale_handle_does_not_evict_its_replacement() {
        let store = SessionStore::new();
        let ana = ConversationId::from("ana");

        let (stale, _) = store.get_or_create(&ana).await;
        assert!(store.remove_if_current(&ana, &stale).await);
        let (fresh, created) = store.get_or_create(&ana).await;
        assert!(created);

        assert!(!store.remove_if_current(&ana, &stale).await);
        assert!(store.is_current(&ana, &fresh).await);
        assert_eq!(store.len().await, 1);
    }
}
