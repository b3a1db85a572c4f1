//! In-memory discount and order stores.
//!
//! - [`InMemoryDiscountStore`]: per-code entries, bounded increments under the entry lock
//! - [`InMemoryOrderStore`]: all-or-nothing order writes with a unique token index,
//!   plus fault injection for persistence and collision paths

use boxoffice_core::{
    BoxResult, DiscountCode, DiscountStore, Order, OrderId, OrderRecord, OrderStatus, OrderStore,
    RedemptionToken, StoreError, Ticket,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

/// In-memory [`DiscountStore`].
#[derive(Debug, Default)]
pub struct InMemoryDiscountStore {
    codes: DashMap<String, DiscountCode>,
}

impl InMemoryDiscountStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current redemption count of a code.
    #[must_use]
    pub fn redemptions_used(&self, code: &str) -> Option<u32> {
        self.codes
            .get(&DiscountCode::normalize(code))
            .map(|c| c.redemptions_used)
    }
}

impl DiscountStore for InMemoryDiscountStore {
    fn upsert(&self, mut code: DiscountCode) -> BoxResult<'_, (), StoreError> {
        Box::pin(async move {
            code.code = DiscountCode::normalize(&code.code);
            code.validate().map_err(StoreError::Invalid)?;
            self.codes.insert(code.code.clone(), code);
            Ok(())
        })
    }

    fn find<'a>(&'a self, code: &'a str) -> BoxResult<'a, Option<DiscountCode>, StoreError> {
        Box::pin(async move {
            Ok(self
                .codes
                .get(&DiscountCode::normalize(code))
                .map(|c| c.value().clone()))
        })
    }

    fn record_redemption<'a>(&'a self, code: &'a str) -> BoxResult<'a, bool, StoreError> {
        Box::pin(async move {
            let mut entry = self
                .codes
                .get_mut(&DiscountCode::normalize(code))
                .ok_or(StoreError::NotFound)?;
            if entry.is_exhausted() {
                return Ok(false);
            }
            entry.redemptions_used = entry.redemptions_used.saturating_add(1);
            Ok(true)
        })
    }
}

#[derive(Debug, Default)]
struct OrderBook {
    orders: HashMap<OrderId, OrderRecord>,
    tokens: HashMap<RedemptionToken, Option<(OrderId, usize)>>,
}

/// In-memory [`OrderStore`].
///
/// Writes are applied under one lock so an order and its tickets appear together
/// or not at all.
///
/// # Fault injection
///
/// - [`InMemoryOrderStore::fail_next_persists`]: next `n` writes return
///   [`StoreError::Unavailable`] without writing
/// - [`InMemoryOrderStore::lose_next_acks`]: next `n` successful writes are
///   kept but reported as [`StoreError::Unavailable`]
/// - [`InMemoryOrderStore::seed_token`]: pre-claim a token so a write carrying it collides
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    book: Mutex<OrderBook>,
    failures_pending: AtomicU32,
    lost_acks_pending: AtomicU32,
    persist_calls: AtomicU32,
}

impl InMemoryOrderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls to `persist` fail as transient.
    pub fn fail_next_persists(&self, n: u32) {
        self.failures_pending.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` successful writes report a transient failure.
    pub fn lose_next_acks(&self, n: u32) {
        self.lost_acks_pending.store(n, Ordering::SeqCst);
    }

    /// Claim `token` as if an existing ticket already used it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the store lock is poisoned.
    pub fn seed_token(&self, token: RedemptionToken) -> Result<(), StoreError> {
        self.lock()?.tokens.insert(token, None);
        Ok(())
    }

    /// Number of `persist` calls received, including failed ones.
    #[must_use]
    pub fn persist_calls(&self) -> u32 {
        self.persist_calls.load(Ordering::SeqCst)
    }

    /// Number of stored orders.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.lock().map_or(0, |book| book.orders.len())
    }

    /// Number of stored tickets across all orders.
    #[must_use]
    pub fn ticket_count(&self) -> usize {
        self.lock()
            .map_or(0, |book| book.orders.values().map(|r| r.tickets.len()).sum())
    }

    fn lock(&self) -> Result<MutexGuard<'_, OrderBook>, StoreError> {
        self.book
            .lock()
            .map_err(|_| StoreError::Unavailable("order book lock poisoned".to_string()))
    }

    fn write(&self, record: &OrderRecord) -> Result<(), StoreError> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }

        record.validate()?;
        let mut book = self.lock()?;

        if book.orders.contains_key(&record.order.id) {
            return Err(StoreError::Conflict(format!("order {} exists", record.order.id)));
        }
        let mut batch = HashSet::with_capacity(record.tickets.len());
        for ticket in &record.tickets {
            let token = &ticket.redemption_token;
            if book.tokens.contains_key(token) || !batch.insert(token) {
                return Err(StoreError::TokenCollision(Some(token.clone())));
            }
        }

        for (index, ticket) in record.tickets.iter().enumerate() {
            book.tokens
                .insert(ticket.redemption_token.clone(), Some((record.order.id, index)));
        }
        book.orders.insert(record.order.id, record.clone());

        if self
            .lost_acks_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Unavailable("connection reset after commit".to_string()));
        }
        Ok(())
    }
}

impl OrderStore for InMemoryOrderStore {
    fn persist<'a>(&'a self, record: &'a OrderRecord) -> BoxResult<'a, (), StoreError> {
        Box::pin(async move { self.write(record) })
    }

    fn order(&self, id: OrderId) -> BoxResult<'_, Option<OrderRecord>, StoreError> {
        Box::pin(async move { Ok(self.lock()?.orders.get(&id).cloned()) })
    }

    fn mark_refunded(&self, id: OrderId) -> BoxResult<'_, Order, StoreError> {
        Box::pin(async move {
            let mut book = self.lock()?;
            let record = book.orders.get_mut(&id).ok_or(StoreError::NotFound)?;
            let from = record.order.status;
            if !from.can_transition_to(OrderStatus::Refunded) {
                return Err(StoreError::InvalidTransition {
                    from,
                    to: OrderStatus::Refunded,
                });
            }
            record.order.status = OrderStatus::Refunded;
            Ok(record.order.clone())
        })
    }

    fn redeem<'a>(
        &'a self,
        token: &'a RedemptionToken,
        at: DateTime<Utc>,
    ) -> BoxResult<'a, Ticket, StoreError> {
        Box::pin(async move {
            let mut book = self.lock()?;
            let (order_id, index) = book
                .tokens
                .get(token)
                .copied()
                .flatten()
                .ok_or(StoreError::NotFound)?;
            let ticket = book
                .orders
                .get_mut(&order_id)
                .and_then(|record| record.tickets.get_mut(index))
                .ok_or(StoreError::NotFound)?;
            if ticket.used {
                return Err(StoreError::AlreadyUsed);
            }
            ticket.used = true;
            ticket.used_at = Some(at);
            Ok(ticket.clone())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use boxoffice_core::{
        BuyerId, DiscountKind, EventId, Money, OrderLine, TicketClassId, TicketId,
    };
    use chrono::Duration;

    fn record(tokens: &[&str]) -> OrderRecord {
        let order_id = OrderId::new();
        let quantity = u32::try_from(tokens.len()).unwrap();
        OrderRecord {
            order: Order {
                id: order_id,
                buyer_id: BuyerId::new("buyer-1"),
                lines: vec![OrderLine {
                    ticket_class_id: TicketClassId::new("vip"),
                    quantity,
                    unit_price: Money::from_cents(1000),
                }],
                subtotal: Money::from_cents(1000 * u64::from(quantity)),
                service_fee: Money::ZERO,
                discount_code: None,
                discount_amount: Money::ZERO,
                total: Money::from_cents(1000 * u64::from(quantity)),
                payment_reference: "pay_1".to_string(),
                status: OrderStatus::Paid,
                created_at: Utc::now(),
            },
            tickets: tokens
                .iter()
                .map(|token| Ticket {
                    id: TicketId::new(),
                    order_id,
                    ticket_class_id: TicketClassId::new("vip"),
                    event_id: EventId::new("gala"),
                    redemption_token: RedemptionToken::from_string(*token),
                    used: false,
                    used_at: None,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_collision_writes_nothing() {
        let store = InMemoryOrderStore::new();
        store.persist(&record(&["aa", "bb"])).await.unwrap();

        let result = store.persist(&record(&["cc", "bb"])).await;

        assert_eq!(
            result,
            Err(StoreError::TokenCollision(Some(RedemptionToken::from_string("bb"))))
        );
        assert_eq!(store.order_count(), 1);
        assert_eq!(store.ticket_count(), 2);
    }

    #[tokio::test]
    async fn test_injected_failures_are_transient() {
        let store = InMemoryOrderStore::new();
        store.fail_next_persists(1);

        let first = store.persist(&record(&["aa"])).await;
        assert!(first.unwrap_err().is_transient());
        assert!(store.persist(&record(&["aa"])).await.is_ok());
        assert_eq!(store.persist_calls(), 2);
    }

    #[tokio::test]
    async fn test_refund_only_from_paid() {
        let store = InMemoryOrderStore::new();
        let rec = record(&["aa"]);
        store.persist(&rec).await.unwrap();

        let refunded = store.mark_refunded(rec.order.id).await.unwrap();
        assert_eq!(refunded.status, OrderStatus::Refunded);
        assert_eq!(
            store.mark_refunded(rec.order.id).await,
            Err(StoreError::InvalidTransition {
                from: OrderStatus::Refunded,
                to: OrderStatus::Refunded,
            })
        );
        assert_eq!(store.mark_refunded(OrderId::new()).await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_redeem_exactly_once() {
        let store = InMemoryOrderStore::new();
        store.persist(&record(&["aa"])).await.unwrap();
        let token = RedemptionToken::from_string("aa");
        let at = Utc::now();

        let ticket = store.redeem(&token, at).await.unwrap();
        assert!(ticket.used);
        assert_eq!(ticket.used_at, Some(at));
        assert_eq!(store.redeem(&token, at).await, Err(StoreError::AlreadyUsed));
        assert_eq!(
            store.redeem(&RedemptionToken::from_string("zz"), at).await,
            Err(StoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_discount_increment_is_bounded() {
        let store = InMemoryDiscountStore::new();
        let now = Utc::now();
        store
            .upsert(DiscountCode {
                code: "once".to_string(),
                kind: DiscountKind::FixedAmount,
                value: 100,
                active_from: now - Duration::days(1),
                active_until: now + Duration::days(1),
                max_redemptions: Some(1),
                redemptions_used: 0,
                applicable_event_ids: vec![],
                enabled: true,
            })
            .await
            .unwrap();

        assert!(store.find("ONCE").await.unwrap().is_some());
        assert!(store.record_redemption("Once").await.unwrap());
        assert!(!store.record_redemption("once").await.unwrap());
        assert_eq!(store.redemptions_used("ONCE"), Some(1));
        assert_eq!(store.record_redemption("missing").await, Err(StoreError::NotFound));
    }
}
