//! Concurrency and property tests for the in-memory inventory ledger.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use boxoffice_core::{InventoryLedger, LedgerError, Money, TicketClass, TicketClassId};
use boxoffice_testing::InMemoryInventoryLedger;
use boxoffice_testing::properties::{reservation_burst, reserve_release_ops};
use chrono::Utc;
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Test Fixtures
// ============================================================================

fn ledger_with(capacity: u32) -> Arc<InMemoryInventoryLedger> {
    Arc::new(
        InMemoryInventoryLedger::with_classes([TicketClass::new(
            "hot",
            "gala",
            "Hot",
            Money::from_cents(1000),
            capacity,
        )])
        .unwrap(),
    )
}

fn hot() -> TicketClassId {
    TicketClassId::new("hot")
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

/// Fire every quantity at once and return the quantities that were granted.
async fn reserve_concurrently(ledger: &Arc<InMemoryInventoryLedger>, quantities: &[u32]) -> Vec<u32> {
    let handles: Vec<_> = quantities
        .iter()
        .map(|&quantity| {
            let ledger = Arc::clone(ledger);
            tokio::spawn(async move {
                ledger
                    .reserve(&hot(), quantity, Utc::now())
                    .await
                    .map(|_| quantity)
            })
        })
        .collect();

    let mut granted = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(quantity) => granted.push(quantity),
            Err(LedgerError::InsufficientStock { .. }) => {},
            Err(other) => panic!("unexpected ledger error: {other}"),
        }
    }
    granted
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_concurrent_reservations_never_oversell(
        capacity in 1u32..60,
        burst in reservation_burst(8, 40),
    ) {
        let ledger = ledger_with(capacity);
        let granted = runtime().block_on(reserve_concurrently(&ledger, &burst));

        let sold: u32 = granted.iter().sum();
        prop_assert!(sold <= capacity);
        prop_assert_eq!(ledger.remaining(&hot()), Some(capacity - sold));
    }

    #[test]
    fn prop_release_is_idempotent(
        capacity in 1u32..60,
        ops in reserve_release_ops(6, 30),
    ) {
        let ledger = ledger_with(capacity);
        runtime().block_on(async {
            let mut held = 0u32;
            for (quantity, release) in ops {
                let Ok(id) = ledger.reserve(&hot(), quantity, Utc::now()).await else {
                    continue;
                };
                if release {
                    ledger.release(id).await.unwrap();
                    let after_first = ledger.remaining(&hot());
                    ledger.release(id).await.unwrap();
                    assert_eq!(ledger.remaining(&hot()), after_first);
                } else {
                    ledger.commit(id).await.unwrap();
                    ledger.release(id).await.unwrap();
                    held += quantity;
                }
            }
            assert_eq!(ledger.remaining(&hot()), Some(capacity - held));
        });
    }
}

// ============================================================================
// Contention
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_hundred_buyers_for_ten_tickets() {
    let ledger = ledger_with(10);
    let granted = reserve_concurrently(&ledger, &[1; 100]).await;

    assert_eq!(granted.len(), 10);
    assert_eq!(ledger.remaining(&hot()), Some(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_classes_are_independent() {
    let ledger = Arc::new(
        InMemoryInventoryLedger::with_classes((0..8).map(|i| {
            TicketClass::new(format!("class-{i}"), "gala", "Tier", Money::from_cents(100), 50)
        }))
        .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .flat_map(|i| {
            (0..50).map(move |_| TicketClassId::new(format!("class-{i}")))
        })
        .map(|id| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.reserve(&id, 1, Utc::now()).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    for i in 0..8 {
        assert_eq!(ledger.remaining(&TicketClassId::new(format!("class-{i}"))), Some(0));
    }
}
