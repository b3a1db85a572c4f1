//! Default order notifier.

use boxoffice_core::{BoxResult, NotifyError, OrderCommitted, OrderNotifier};

/// Logs committed orders instead of delivering them anywhere.
///
/// Used when no delivery channel is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl OrderNotifier for TracingNotifier {
    fn order_committed(&self, event: OrderCommitted) -> BoxResult<'_, (), NotifyError> {
        Box::pin(async move {
            tracing::info!(
                order_id = %event.order_id,
                buyer_id = %event.buyer_id,
                tickets = event.ticket_ids.len(),
                "Order ready for delivery"
            );
            Ok(())
        })
    }
}
