//! Checkout transaction.
//!
//! Turns a cart plus a payment confirmation into a durable order with tickets,
//! or into an error with every hold it took released.
//!
//! # State machine
//!
//! ```text
//! Initiated ──► InventoryReserved ──► DiscountPriced ──► Persisted ──► Committed
//!     │                 │                    │
//!     ▼                 │                    ▼
//! ReservationFailed     │            PersistenceFailed
//!     │                 ▼                    │
//!     └──────────► Compensating ◄────────────┘
//!                       │
//!                       ▼
//!                  Compensated
//! ```
//!
//! Structural problems (empty cart, duplicate lines, quantities outside a class's
//! bounds, unconfirmed payment) fail before anything is reserved. Any failure
//! after the first reservation releases all holds before the error is returned.
//! Every await before persistence races the cancel signal and the deadline, so
//! a stalled collaborator cannot pin holds. Once persistence has started the
//! attempt runs to completion.
//!
//! A write whose outcome is unknown (the store failed after it may have
//! committed) is resolved by reading the order back. A durable order keeps its
//! stock; only an order that is provably absent is compensated.

use boxoffice_core::{
    BuyerId, CartLine, CartPricer, CheckoutError, Clock, DiscountEngine, DiscountStore, EventId,
    InventoryLedger, LedgerError, Money, Order, OrderCommitted, OrderId, OrderLine, OrderNotifier,
    OrderRecord, OrderStatus, OrderStore, PaymentConfirmation, ReservationId, ServiceFeeRate,
    StoreError, TicketClass, TicketClassId, TokenSource, ValidDiscount,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::issuer::TicketIssuer;
use crate::metrics;
use crate::retry::{RetryPolicy, retry_if};

/// A buyer's request to purchase a cart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Purchasing buyer
    pub buyer_id: BuyerId,
    /// Event every line must belong to
    pub event_id: EventId,
    /// Cart lines, one per ticket class
    pub lines: Vec<CartLine>,
    /// Optional discount code, matched case-insensitively
    pub discount_code: Option<String>,
    /// Externally authorized payment
    pub payment: PaymentConfirmation,
}

/// Checkout progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    /// Cart accepted for processing
    Initiated,
    /// Every line holds stock
    InventoryReserved,
    /// Discount (if any) validated and totals computed
    DiscountPriced,
    /// Order and tickets durably written
    Persisted,
    /// Holds committed; terminal success
    Committed,
    /// A line could not be reserved
    ReservationFailed,
    /// The order write failed
    PersistenceFailed,
    /// Releasing holds
    Compensating,
    /// All holds released; terminal failure
    Compensated,
}

impl CheckoutState {
    /// Whether moving from `self` to `next` is a legal step.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Initiated, Self::InventoryReserved | Self::ReservationFailed | Self::Compensating)
                | (Self::InventoryReserved, Self::DiscountPriced | Self::Compensating)
                | (Self::DiscountPriced, Self::Persisted | Self::PersistenceFailed | Self::Compensating)
                | (Self::Persisted, Self::Committed)
                | (Self::ReservationFailed | Self::PersistenceFailed, Self::Compensating)
                | (Self::Compensating, Self::Compensated)
        )
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Compensated)
    }
}

/// Invalid checkout configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Holds could expire while a checkout is still allowed to run.
    #[error("reservation TTL ({ttl:?}) must be at least twice the checkout timeout ({timeout:?})")]
    ReservationTtlTooShort {
        /// Configured reservation TTL
        ttl: Duration,
        /// Configured checkout timeout
        timeout: Duration,
    },

    /// Token collisions could never be retried.
    #[error("max_token_attempts must be at least 1")]
    NoTokenAttempts,

    /// A zero deadline would time out every checkout.
    #[error("checkout timeout must be greater than zero")]
    ZeroCheckoutTimeout,
}

/// Checkout tuning.
///
/// # Default Values
///
/// - `service_fee`: 10% (1000 basis points)
/// - `reservation_ttl`: 5 minutes
/// - `checkout_timeout`: 30 seconds
/// - `persist_retry`: [`RetryPolicy::default`]
/// - `max_token_attempts`: 5
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutConfig {
    /// Service fee charged on the subtotal
    pub service_fee: ServiceFeeRate,
    /// Lifetime of a hold before the sweeper may release it
    pub reservation_ttl: Duration,
    /// Deadline for reaching the persistence step
    pub checkout_timeout: Duration,
    /// Retries for transient order-write and release failures
    pub persist_retry: RetryPolicy,
    /// Order writes attempted when storage reports token collisions
    pub max_token_attempts: u32,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            service_fee: ServiceFeeRate::from_basis_points(1000),
            reservation_ttl: Duration::from_secs(300),
            checkout_timeout: Duration::from_secs(30),
            persist_retry: RetryPolicy::default(),
            max_token_attempts: 5,
        }
    }
}

impl CheckoutConfig {
    /// Check the configuration can uphold the reservation guarantees.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.checkout_timeout.is_zero() {
            return Err(ConfigError::ZeroCheckoutTimeout);
        }
        let floor = self.checkout_timeout.saturating_mul(2);
        if self.reservation_ttl < floor {
            return Err(ConfigError::ReservationTtlTooShort {
                ttl: self.reservation_ttl,
                timeout: self.checkout_timeout,
            });
        }
        if self.max_token_attempts == 0 {
            return Err(ConfigError::NoTokenAttempts);
        }
        Ok(())
    }
}

/// Collaborators a checkout runs against.
#[derive(Clone)]
pub struct CheckoutEnvironment {
    /// Time source for discount windows, expiry and timestamps
    pub clock: Arc<dyn Clock>,
    /// Stock reservations
    pub ledger: Arc<dyn InventoryLedger>,
    /// Discount code records
    pub discounts: Arc<dyn DiscountStore>,
    /// Order and ticket persistence
    pub orders: Arc<dyn OrderStore>,
    /// Post-commit notification
    pub notifier: Arc<dyn OrderNotifier>,
    /// Redemption token source
    pub tokens: Arc<dyn TokenSource>,
}

/// Caller cancellation plus the checkout deadline.
struct Interrupt {
    cancel: watch::Receiver<bool>,
    deadline: Instant,
}

impl Interrupt {
    fn check(&self) -> Result<(), CheckoutError> {
        if *self.cancel.borrow() {
            return Err(CheckoutError::Cancelled);
        }
        if Instant::now() >= self.deadline {
            return Err(CheckoutError::TimedOut);
        }
        Ok(())
    }

    /// Await `step` unless cancellation or the deadline comes first.
    ///
    /// A step that is ready wins over an interrupt raised in the same poll.
    async fn guard<T>(&mut self, step: impl Future<Output = T>) -> Result<T, CheckoutError> {
        self.check()?;
        let deadline = self.deadline;
        let cancel = &mut self.cancel;
        let cancelled = async {
            loop {
                if cancel.changed().await.is_err() {
                    // Sender gone: only the deadline can interrupt now
                    std::future::pending::<()>().await;
                }
                if *cancel.borrow_and_update() {
                    return;
                }
            }
        };

        tokio::select! {
            biased;

            output = step => Ok(output),
            () = cancelled => Err(CheckoutError::Cancelled),
            () = tokio::time::sleep_until(deadline) => Err(CheckoutError::TimedOut),
        }
    }
}

/// Result of writing an order.
enum WriteOutcome {
    /// The order and its tickets are durable.
    Written,
    /// Nothing was written.
    Failed(StoreError),
    /// The write failed and the order could not be read back.
    Unknown(StoreError),
}

/// Tracks the state machine for one attempt.
struct Progress {
    order_id: OrderId,
    state: CheckoutState,
}

impl Progress {
    fn advance(&mut self, next: CheckoutState) {
        if !self.state.can_transition_to(next) {
            tracing::error!(
                order_id = %self.order_id,
                from = ?self.state,
                to = ?next,
                "Illegal checkout transition"
            );
        }
        tracing::debug!(order_id = %self.order_id, from = ?self.state, to = ?next, "Checkout transition");
        self.state = next;
    }
}

/// A validated cart line joined with its ticket class.
struct PricedLine {
    class: TicketClass,
    quantity: u32,
}

/// Runs checkouts.
///
/// Cheap to clone and safe to share across request handlers.
#[derive(Clone)]
pub struct CheckoutTransaction {
    env: CheckoutEnvironment,
    config: CheckoutConfig,
    discounts: DiscountEngine,
    issuer: TicketIssuer,
}

impl CheckoutTransaction {
    /// Creates a checkout runner.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` fails [`CheckoutConfig::validate`].
    pub fn new(env: CheckoutEnvironment, config: CheckoutConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            discounts: DiscountEngine::new(Arc::clone(&env.discounts)),
            issuer: TicketIssuer::new(Arc::clone(&env.tokens)),
            env,
            config,
        })
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Run a checkout bounded only by the configured deadline.
    ///
    /// # Errors
    ///
    /// See [`CheckoutTransaction::run_cancellable`].
    pub async fn run(&self, request: CheckoutRequest) -> Result<OrderRecord, CheckoutError> {
        let (_cancel, cancelled) = watch::channel(false);
        self.run_cancellable(request, cancelled).await
    }

    /// Run a checkout that the caller may cancel by sending `true` on `cancel`.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::InvalidCart`] / [`CheckoutError::PaymentNotConfirmed`] before any side effect
    /// - [`CheckoutError::UnknownTicketClass`] if a line names a missing class
    /// - [`CheckoutError::InsufficientStock`] with the quantity still available
    /// - [`CheckoutError::DiscountInvalid`] with the rejection reason
    /// - [`CheckoutError::Persistence`] if the order could not be written
    /// - [`CheckoutError::Cancelled`] / [`CheckoutError::TimedOut`] if interrupted before persistence
    #[tracing::instrument(
        name = "checkout",
        skip(self, request, cancel),
        fields(buyer_id = %request.buyer_id, event_id = %request.event_id)
    )]
    pub async fn run_cancellable(
        &self,
        request: CheckoutRequest,
        cancel: watch::Receiver<bool>,
    ) -> Result<OrderRecord, CheckoutError> {
        let started = std::time::Instant::now();
        let mut interrupt = Interrupt {
            cancel,
            deadline: Instant::now() + self.config.checkout_timeout,
        };

        let result = self.execute(request, &mut interrupt).await;

        let outcome = match &result {
            Ok(_) => "committed",
            Err(e) => e.kind(),
        };
        metrics::record_checkout(outcome, started.elapsed());
        if let Err(e) = &result {
            tracing::debug!(error_kind = e.kind(), error = %e, "Checkout failed");
        }
        result
    }

    async fn execute(
        &self,
        request: CheckoutRequest,
        interrupt: &mut Interrupt,
    ) -> Result<OrderRecord, CheckoutError> {
        Self::validate_request(&request)?;
        let lines = interrupt.guard(self.load_lines(&request)).await??;

        let mut progress = Progress {
            order_id: OrderId::new(),
            state: CheckoutState::Initiated,
        };
        let now = self.env.clock.now();
        let expires_at = self.expiry_from(now);

        // Reserve
        let mut held: Vec<ReservationId> = Vec::with_capacity(lines.len());
        for line in &lines {
            let reserved = match self.reserve_line(line, expires_at, interrupt).await {
                Ok(reserved) => reserved,
                Err(e) => return Err(self.abort(&mut progress, &held, e).await),
            };
            match reserved {
                Ok(reservation_id) => {
                    tracing::debug!(
                        ticket_class_id = %line.class.id,
                        quantity = line.quantity,
                        reservation_id = %reservation_id,
                        "Reserved stock"
                    );
                    held.push(reservation_id);
                },
                Err(e) => {
                    tracing::warn!(ticket_class_id = %line.class.id, error = %e, "Reservation failed");
                    progress.advance(CheckoutState::ReservationFailed);
                    return Err(self.abort(&mut progress, &held, e.into()).await);
                },
            }
            if let Err(e) = interrupt.check() {
                return Err(self.abort(&mut progress, &held, e).await);
            }
        }
        progress.advance(CheckoutState::InventoryReserved);

        // Discount and price
        let discount = match interrupt.guard(self.validate_discount(&request, now)).await {
            Ok(Ok(discount)) => discount,
            Ok(Err(e)) | Err(e) => return Err(self.abort(&mut progress, &held, e).await),
        };
        let priced: Vec<(Money, u32)> = lines
            .iter()
            .map(|line| (line.class.unit_price, line.quantity))
            .collect();
        let subtotal = CartPricer::subtotal(&priced);
        let discount_amount = discount
            .as_ref()
            .map_or(Money::ZERO, |d| DiscountEngine::price_discount(d, subtotal));
        let breakdown = CartPricer::price(&priced, self.config.service_fee, discount_amount);
        progress.advance(CheckoutState::DiscountPriced);

        if let Err(e) = interrupt.check() {
            return Err(self.abort(&mut progress, &held, e).await);
        }

        // Persist
        let order = Order {
            id: progress.order_id,
            buyer_id: request.buyer_id,
            lines: lines
                .iter()
                .map(|line| OrderLine {
                    ticket_class_id: line.class.id.clone(),
                    quantity: line.quantity,
                    unit_price: line.class.unit_price,
                })
                .collect(),
            subtotal: breakdown.subtotal,
            service_fee: breakdown.service_fee,
            discount_code: discount.as_ref().map(|d| d.code.clone()),
            discount_amount: breakdown.discount_amount,
            total: breakdown.total,
            payment_reference: request.payment.payment_reference,
            status: OrderStatus::Paid,
            created_at: now,
        };
        let issue_lines: Vec<(TicketClassId, u32)> = lines
            .iter()
            .map(|line| (line.class.id.clone(), line.quantity))
            .collect();
        let tickets = self
            .issuer
            .issue_for_order(order.id, &request.event_id, &issue_lines);
        let mut record = OrderRecord { order, tickets };

        match self.persist(&mut record).await {
            WriteOutcome::Written => {},
            WriteOutcome::Failed(e) => {
                tracing::warn!(order_id = %record.order.id, error = %e, "Order write failed");
                progress.advance(CheckoutState::PersistenceFailed);
                let error = CheckoutError::Persistence(e.to_string());
                return Err(self.abort(&mut progress, &held, error).await);
            },
            WriteOutcome::Unknown(e) => {
                // The order may be durable: keep its stock rather than risk reselling it
                progress.advance(CheckoutState::PersistenceFailed);
                metrics::record_reconciliation_required();
                tracing::error!(
                    order_id = %record.order.id,
                    error = %e,
                    "Order write outcome unknown, holding stock for reconciliation"
                );
                self.commit_holds(record.order.id, &held).await;
                return Err(CheckoutError::Persistence(e.to_string()));
            },
        }
        progress.advance(CheckoutState::Persisted);

        // Commit
        self.commit_holds(record.order.id, &held).await;
        if let Some(discount) = &discount {
            self.count_redemption(record.order.id, discount).await;
        }
        progress.advance(CheckoutState::Committed);

        metrics::record_order_committed(record.order.ticket_count(), record.order.total.cents());
        tracing::info!(
            order_id = %record.order.id,
            tickets = record.tickets.len(),
            total_cents = record.order.total.cents(),
            "Order committed"
        );

        self.notify(&record).await;
        Ok(record)
    }

    /// Checks that need no I/O.
    fn validate_request(request: &CheckoutRequest) -> Result<(), CheckoutError> {
        if !request.payment.paid {
            return Err(CheckoutError::PaymentNotConfirmed);
        }
        if request.payment.payment_reference.trim().is_empty() {
            return Err(CheckoutError::InvalidCart(
                "payment reference must not be empty".to_string(),
            ));
        }
        if request.lines.is_empty() {
            return Err(CheckoutError::InvalidCart(
                "cart must contain at least one line".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(request.lines.len());
        let mut total: u32 = 0;
        for line in &request.lines {
            total = total.checked_add(line.quantity).ok_or_else(|| {
                CheckoutError::InvalidCart("cart holds too many tickets".to_string())
            })?;
            if line.quantity == 0 {
                return Err(CheckoutError::InvalidCart(format!(
                    "quantity for {} must be at least 1",
                    line.ticket_class_id
                )));
            }
            if !seen.insert(&line.ticket_class_id) {
                return Err(CheckoutError::InvalidCart(format!(
                    "ticket class {} appears more than once",
                    line.ticket_class_id
                )));
            }
        }
        Ok(())
    }

    /// Load each line's class and check it belongs to the event and accepts the quantity.
    async fn load_lines(&self, request: &CheckoutRequest) -> Result<Vec<PricedLine>, CheckoutError> {
        let mut lines = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let class = self.env.ledger.ticket_class(&line.ticket_class_id).await?;
            if class.event_id != request.event_id {
                return Err(CheckoutError::InvalidCart(format!(
                    "ticket class {} does not belong to event {}",
                    class.id, request.event_id
                )));
            }
            if !class.accepts_quantity(line.quantity) {
                return Err(CheckoutError::InvalidCart(format!(
                    "quantity {} for {} is outside {}..={}",
                    line.quantity, class.id, class.min_per_order, class.max_per_order
                )));
            }
            lines.push(PricedLine {
                class,
                quantity: line.quantity,
            });
        }
        Ok(lines)
    }

    async fn validate_discount(
        &self,
        request: &CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<ValidDiscount>, CheckoutError> {
        let Some(code) = request
            .discount_code
            .as_deref()
            .filter(|code| !code.trim().is_empty())
        else {
            return Ok(None);
        };
        let discount = self.discounts.validate(code, &request.event_id, now).await?;
        Ok(Some(discount))
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.config.reservation_ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Reserve one line unless interrupted first.
    ///
    /// A reservation that lands after the interrupt is released in the background.
    async fn reserve_line(
        &self,
        line: &PricedLine,
        expires_at: DateTime<Utc>,
        interrupt: &mut Interrupt,
    ) -> Result<Result<ReservationId, LedgerError>, CheckoutError> {
        let ledger = Arc::clone(&self.env.ledger);
        let class_id = line.class.id.clone();
        let quantity = line.quantity;
        let mut reserving =
            Box::pin(async move { ledger.reserve(&class_id, quantity, expires_at).await });

        match interrupt.guard(&mut reserving).await {
            Ok(reserved) => Ok(reserved),
            Err(interrupted) => {
                let ledger = Arc::clone(&self.env.ledger);
                tokio::spawn(async move {
                    let Ok(reservation_id) = reserving.await else {
                        return;
                    };
                    match ledger.release(reservation_id).await {
                        Ok(()) => {
                            metrics::record_reservations_released("interrupted", 1);
                            tracing::debug!(%reservation_id, "Released reservation that landed after interrupt");
                        },
                        Err(e) => tracing::error!(
                            %reservation_id,
                            error = %e,
                            "Failed to release late reservation, leaving it to expire"
                        ),
                    }
                });
                Err(interrupted)
            },
        }
    }

    /// Write the order, re-minting tokens when storage reports a collision.
    async fn persist(&self, record: &mut OrderRecord) -> WriteOutcome {
        let mut attempts = 1;
        loop {
            let snapshot: &OrderRecord = record;
            let written = retry_if(
                &self.config.persist_retry,
                || self.env.orders.persist(snapshot),
                StoreError::is_transient,
            )
            .await;

            let error = match written {
                Ok(()) => return WriteOutcome::Written,
                Err(e) => e,
            };

            if matches!(
                error,
                StoreError::Unavailable(_) | StoreError::Conflict(_) | StoreError::TokenCollision(_)
            ) {
                match self.read_back(record).await {
                    Ok(Some(durable)) => {
                        tracing::warn!(
                            order_id = %record.order.id,
                            error = %error,
                            "Order write reported failure but the order is durable"
                        );
                        *record = durable;
                        return WriteOutcome::Written;
                    },
                    Ok(None) => {},
                    Err(lookup) => {
                        tracing::error!(order_id = %record.order.id, error = %lookup, "Order read-back failed");
                        return WriteOutcome::Unknown(error);
                    },
                }
            }

            match error {
                StoreError::TokenCollision(token) if attempts < self.config.max_token_attempts => {
                    attempts += 1;
                    metrics::record_token_collision();
                    tracing::warn!(order_id = %record.order.id, attempts, "Redemption token collision, re-minting");
                    self.issuer.reissue(&mut record.tickets, token.as_ref());
                },
                other => return WriteOutcome::Failed(other),
            }
        }
    }

    /// The stored copy of `record`, if this attempt's order and tickets are durable.
    async fn read_back(&self, record: &OrderRecord) -> Result<Option<OrderRecord>, StoreError> {
        let stored = retry_if(
            &self.config.persist_retry,
            || self.env.orders.order(record.order.id),
            StoreError::is_transient,
        )
        .await?;

        let Some(stored) = stored else {
            return Ok(None);
        };
        let ours: HashSet<_> = record.tickets.iter().map(|t| t.id).collect();
        let theirs: HashSet<_> = stored.tickets.iter().map(|t| t.id).collect();
        if ours == theirs {
            Ok(Some(stored))
        } else {
            tracing::error!(order_id = %record.order.id, "Stored order has different tickets");
            Ok(None)
        }
    }

    /// Release every hold, then hand back `error`.
    async fn abort(
        &self,
        progress: &mut Progress,
        held: &[ReservationId],
        error: CheckoutError,
    ) -> CheckoutError {
        progress.advance(CheckoutState::Compensating);
        self.release_all(held).await;
        progress.advance(CheckoutState::Compensated);
        error
    }

    async fn release_all(&self, held: &[ReservationId]) {
        if held.is_empty() {
            return;
        }

        let results = join_all(held.iter().map(|reservation_id| {
            retry_if(
                &self.config.persist_retry,
                move || self.env.ledger.release(*reservation_id),
                |e| matches!(e, LedgerError::Storage(_)),
            )
        }))
        .await;

        let mut released = 0;
        for (reservation_id, result) in held.iter().zip(results) {
            match result {
                Ok(()) => released += 1,
                Err(e) => tracing::error!(
                    reservation_id = %reservation_id,
                    error = %e,
                    "Failed to release reservation, leaving it to expire"
                ),
            }
        }
        metrics::record_reservations_released("compensation", released);
        tracing::warn!(released, total = held.len(), "Released reservations after failed checkout");
    }

    async fn commit_holds(&self, order_id: OrderId, held: &[ReservationId]) {
        for reservation_id in held {
            if let Err(e) = self.env.ledger.commit(*reservation_id).await {
                metrics::record_reconciliation_required();
                tracing::error!(
                    order_id = %order_id,
                    reservation_id = %reservation_id,
                    error = %e,
                    "Order persisted but reservation could not be committed, reconciliation required"
                );
            }
        }
    }

    async fn count_redemption(&self, order_id: OrderId, discount: &ValidDiscount) {
        match self.discounts.record_redemption(&discount.code).await {
            Ok(true) => {},
            Ok(false) => tracing::warn!(
                order_id = %order_id,
                code = %discount.code,
                "Discount cap reached by a concurrent order, order stands"
            ),
            Err(e) => tracing::warn!(
                order_id = %order_id,
                code = %discount.code,
                error = %e,
                "Failed to record discount redemption"
            ),
        }
    }

    async fn notify(&self, record: &OrderRecord) {
        let event = OrderCommitted {
            order_id: record.order.id,
            buyer_id: record.order.buyer_id.clone(),
            ticket_ids: record.tickets.iter().map(|t| t.id).collect(),
        };
        if let Err(e) = self.env.notifier.order_committed(event).await {
            metrics::record_notification_failed();
            tracing::error!(order_id = %record.order.id, error = %e, "Order notification failed");
        }
    }
}
