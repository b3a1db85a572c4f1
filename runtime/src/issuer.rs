//! Ticket issuance.
//!
//! Mints one [`Ticket`] per unit sold. Tokens are unique within a batch here;
//! uniqueness across the system is enforced by the order store, and a reported
//! collision is resolved by [`TicketIssuer::reissue`] rather than failing checkout.

use boxoffice_core::{
    EventId, OrderId, RedemptionToken, Ticket, TicketClassId, TicketId, TokenSource,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Mints tickets with fresh redemption tokens.
#[derive(Clone)]
pub struct TicketIssuer {
    tokens: Arc<dyn TokenSource>,
}

impl TicketIssuer {
    /// Creates an issuer drawing tokens from `tokens`.
    #[must_use]
    pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
        Self { tokens }
    }

    /// Issue a single unused ticket.
    #[must_use]
    pub fn issue(&self, order_id: OrderId, ticket_class_id: TicketClassId, event_id: EventId) -> Ticket {
        Ticket {
            id: TicketId::new(),
            order_id,
            ticket_class_id,
            event_id,
            redemption_token: self.tokens.next_token(),
            used: false,
            used_at: None,
        }
    }

    /// Issue tickets for every `(class, quantity)` line of an order.
    ///
    /// Exactly `quantity` tickets are produced per line, and no two share a token.
    #[must_use]
    pub fn issue_for_order(
        &self,
        order_id: OrderId,
        event_id: &EventId,
        lines: &[(TicketClassId, u32)],
    ) -> Vec<Ticket> {
        let total: u64 = lines.iter().map(|(_, quantity)| u64::from(*quantity)).sum();
        let capacity = usize::try_from(total).unwrap_or_default();
        let mut tickets = Vec::with_capacity(capacity);
        let mut seen = HashSet::with_capacity(capacity);

        for (class_id, quantity) in lines {
            for _ in 0..*quantity {
                let mut ticket = self.issue(order_id, class_id.clone(), event_id.clone());
                while !seen.insert(ticket.redemption_token.clone()) {
                    ticket.redemption_token = self.tokens.next_token();
                }
                tickets.push(ticket);
            }
        }

        tickets
    }

    /// Replace tokens after storage reported a collision.
    ///
    /// With a known colliding token only the affected ticket is re-minted; with
    /// `None` every ticket gets a new token.
    pub fn reissue(&self, tickets: &mut [Ticket], colliding: Option<&RedemptionToken>) {
        let mut seen: HashSet<RedemptionToken> = match colliding {
            Some(token) => tickets
                .iter()
                .map(|t| t.redemption_token.clone())
                .filter(|t| t != token)
                .collect(),
            None => HashSet::with_capacity(tickets.len()),
        };
        if let Some(token) = colliding {
            seen.insert(token.clone());
        }

        for ticket in tickets.iter_mut() {
            let stale = colliding.is_none_or(|token| &ticket.redemption_token == token);
            if !stale {
                continue;
            }
            let mut fresh = self.tokens.next_token();
            while !seen.insert(fresh.clone()) {
                fresh = self.tokens.next_token();
            }
            ticket.redemption_token = fresh;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxoffice_core::OsRngTokenSource;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Hands out scripted tokens, then random ones.
    struct Scripted(Mutex<VecDeque<RedemptionToken>>);

    impl TokenSource for Scripted {
        fn next_token(&self) -> RedemptionToken {
            self.0
                .lock()
                .ok()
                .and_then(|mut queue| queue.pop_front())
                .unwrap_or_else(RedemptionToken::generate)
        }
    }

    fn scripted(tokens: &[&str]) -> Arc<dyn TokenSource> {
        Arc::new(Scripted(Mutex::new(
            tokens.iter().map(|t| RedemptionToken::from_string(*t)).collect(),
        )))
    }

    #[test]
    fn test_issues_exact_quantity_per_line() {
        let issuer = TicketIssuer::new(Arc::new(OsRngTokenSource));
        let order_id = OrderId::new();
        let tickets = issuer.issue_for_order(
            order_id,
            &EventId::new("gala"),
            &[(TicketClassId::new("vip"), 3), (TicketClassId::new("ga"), 2)],
        );

        assert_eq!(tickets.len(), 5);
        assert_eq!(tickets.iter().filter(|t| t.ticket_class_id.as_str() == "vip").count(), 3);
        assert!(tickets.iter().all(|t| t.order_id == order_id && !t.used));
    }

    #[test]
    fn test_duplicate_tokens_within_batch_are_replaced() {
        let issuer = TicketIssuer::new(scripted(&["aa", "aa", "bb"]));
        let tickets = issuer.issue_for_order(
            OrderId::new(),
            &EventId::new("gala"),
            &[(TicketClassId::new("vip"), 2)],
        );

        let tokens: Vec<&str> = tickets.iter().map(|t| t.redemption_token.as_str()).collect();
        assert_eq!(tokens, vec!["aa", "bb"]);
    }

    #[test]
    fn test_reissue_replaces_only_colliding_token() {
        let issuer = TicketIssuer::new(scripted(&["aa", "bb", "cc"]));
        let mut tickets = issuer.issue_for_order(
            OrderId::new(),
            &EventId::new("gala"),
            &[(TicketClassId::new("vip"), 2)],
        );

        issuer.reissue(&mut tickets, Some(&RedemptionToken::from_string("aa")));

        assert_eq!(tickets[0].redemption_token.as_str(), "cc");
        assert_eq!(tickets[1].redemption_token.as_str(), "bb");
    }

    #[test]
    fn test_reissue_without_hint_replaces_all() {
        let issuer = TicketIssuer::new(scripted(&["aa", "bb", "cc", "dd"]));
        let mut tickets = issuer.issue_for_order(
            OrderId::new(),
            &EventId::new("gala"),
            &[(TicketClassId::new("vip"), 2)],
        );

        issuer.reissue(&mut tickets, None);

        let tokens: Vec<&str> = tickets.iter().map(|t| t.redemption_token.as_str()).collect();
        assert_eq!(tokens, vec!["cc", "dd"]);
    }
}
