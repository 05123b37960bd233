use std::collections::HashMap;

use tokio::sync::RwLock;

use orderbot_core::domain::order::{Order, OrderId};
use orderbot_core::ledger::{CommitReceipt, LedgerError, OrderLedger};

/// Process-local ledger for demos and tests. First write per order id wins.
#[derive(Default)]
pub struct InMemoryOrderLedger {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderLedger {
    pub async fn find(&self, id: &OrderId) -> Option<Order> {
        self.orders.read().await.get(id.as_str()).cloned()
    }

    pub async fn orders(&self) -> Vec<Order> {
        let mut orders = self.orders.read().await.values().cloned().collect::<Vec<_>>();
        orders.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        orders
    }
}

#[async_trait::async_trait]
impl OrderLedger for InMemoryOrderLedger {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn commit(&self, order: &Order) -> Result<CommitReceipt, LedgerError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(order.id.as_str()) {
            return Ok(CommitReceipt {
                order_id: order.id.clone(),
                header_written: false,
                lines_written: 0,
            });
        }
        orders.insert(order.id.0.clone(), order.clone());
        Ok(CommitReceipt {
            order_id: order.id.clone(),
            header_written: true,
            lines_written: order.lines.len(),
        })
    }

    async fn highest_sequence(&self) -> Result<Option<u64>, LedgerError> {
        let orders = self.orders.read().await;
        Ok(orders.values().filter_map(|order| order.id.sequence()).max())
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use orderbot_core::domain::cart::Cart;
    use orderbot_core::domain::customer::{Customer, PhoneNumber};
    use orderbot_core::domain::order::{Order, OrderId};
    use orderbot_core::ledger::OrderLedger;

    use super::InMemoryOrderLedger;

    fn order(id: &str, quantity: u32) -> Order {
        let mut cart = Cart::default();
        cart.add_line("Jabon Azul", Decimal::from(5), NonZeroU32::new(quantity).expect("qty"))
            .expect("line fits");
        Order::from_cart(
            OrderId(id.to_owned()),
            Customer {
                name: "Ana".to_owned(),
                address: "Calle 1".to_owned(),
                phone: PhoneNumber::parse("3001234567").expect("phone"),
            },
            &cart,
            Utc::now(),
        )
        .expect("order")
    }

    #[tokio::test]
    async fn first_commit_wins_for_an_order_id() {
        let ledger = InMemoryOrderLedger::default();
        let first = ledger.commit(&order("PED-00001", 3)).await.expect("commit");
        let replay = ledger.commit(&order("PED-00001", 9)).await.expect("replay");

        assert!(first.header_written);
        assert!(!replay.header_written);
        let stored = ledger.find(&OrderId("PED-00001".to_owned())).await.expect("stored");
        assert_eq!(stored.total, Decimal::from(15));
    }

    #[tokio::test]
    async fn highest_sequence_reads_order_ids() {
        let ledger = InMemoryOrderLedger::default();
        ledger.commit(&order("PED-00002", 1)).await.expect("commit");
        ledger.commit(&order("PED-00010", 1)).await.expect("commit");

        assert_eq!(ledger.highest_sequence().await.expect("highest"), Some(10));
        assert_eq!(ledger.orders().await.len(), 2);
    }
}
