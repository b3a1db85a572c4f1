//! Background release of abandoned reservations.
//!
//! A checkout that crashes or is abandoned between reserve and commit leaves
//! held stock behind. The sweeper periodically asks the ledger to release every
//! hold past its `expires_at`, bounding how long such stock stays unavailable.
//!
//! # Example
//!
//! ```rust,ignore
//! let (sweeper, shutdown) = ReservationSweeper::new(ledger, clock, Duration::from_secs(30));
//! let handle = tokio::spawn(async move { sweeper.run().await });
//!
//! // On shutdown:
//! shutdown.send(true).ok();
//! handle.await?;
//! ```

use boxoffice_core::{Clock, InventoryLedger, LedgerError, ReservationId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::metrics;

/// Periodically releases expired reservations.
pub struct ReservationSweeper {
    ledger: Arc<dyn InventoryLedger>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl ReservationSweeper {
    /// Create a sweeper and the sender that stops it.
    ///
    /// Send `true` on the returned sender to stop [`ReservationSweeper::run`].
    #[must_use]
    pub fn new(
        ledger: Arc<dyn InventoryLedger>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweeper = Self {
            ledger,
            clock,
            interval,
            shutdown: shutdown_rx,
        };
        (sweeper, shutdown_tx)
    }

    /// Release everything that expired before the clock's current time.
    ///
    /// # Errors
    ///
    /// Returns the ledger's error if the release query fails.
    pub async fn sweep_once(&self) -> Result<Vec<ReservationId>, LedgerError> {
        let now = self.clock.now();
        let released = self.ledger.release_expired(now).await?;

        if released.is_empty() {
            tracing::debug!("Reservation sweep found nothing to release");
        } else {
            tracing::info!(count = released.len(), "Released expired reservations");
            metrics::record_reservations_released("expired", released.len());
        }

        Ok(released)
    }

    /// Sweep on every tick until shutdown is signalled.
    ///
    /// Sweep failures are logged and the loop keeps going.
    pub async fn run(mut self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Reservation sweeper started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while !*self.shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::error!(error = %e, "Reservation sweep failed");
                    }
                }

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        tracing::info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }

        tracing::info!("Reservation sweeper stopped");
    }
}
