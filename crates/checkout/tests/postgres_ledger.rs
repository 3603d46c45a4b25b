//! PostgreSQL inventory ledger and end-to-end checkout tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p checkout --test postgres_ledger
//! ```

use std::sync::Arc;

use checkout::{
    CheckoutCoordinator, CheckoutError, InMemoryPaymentGateway, InventoryLedger,
    PostgresInventoryLedger,
};
use common::{ProductId, UserId};
use domain::{
    AddressType, CartLine, CheckoutRequest, InventoryDemand, Money, NewAddress, OrderStatus,
    PaymentMethod, PostalAddress, Product, RejectionReason, ReservationResult,
};
use serial_test::serial;
use sqlx::PgPool;
use store::{AddressStore, CartStore, OrderStore, PostgresStore, ProductStore};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

const MUG: ProductId = ProductId::new(1);
const TEA: ProductId = ProductId::new(2);

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_checkout_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Fresh pool over cleared tables, seeded with a mug (10) and tea (5).
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_lines, orders, addresses, cart_lines, products RESTART IDENTITY")
        .execute(&pool)
        .await
        .unwrap();

    let store = PostgresStore::new(pool);
    ProductStore::save(&store, Product::new(MUG, "Mug", Money::from_cents(1999), 10))
        .await
        .unwrap();
    ProductStore::save(&store, Product::new(TEA, "Tea", Money::from_cents(550), 5))
        .await
        .unwrap();
    store
}

async fn stock(store: &PostgresStore, id: ProductId) -> u32 {
    store.get(id).await.unwrap().unwrap().stock_quantity
}

fn demand(entries: &[(ProductId, u32)]) -> InventoryDemand {
    InventoryDemand::from_entries(entries.iter().copied()).unwrap()
}

#[tokio::test]
#[serial]
async fn test_reserve_decrements_all_products() {
    let store = get_test_store().await;
    let ledger = PostgresInventoryLedger::new(store.pool().clone());

    let result = ledger.reserve(&demand(&[(MUG, 3), (TEA, 2)])).await.unwrap();

    assert_eq!(result, ReservationResult::Reserved);
    assert_eq!(stock(&store, MUG).await, 7);
    assert_eq!(stock(&store, TEA).await, 3);
}

#[tokio::test]
#[serial]
async fn test_rejected_reservation_changes_nothing() {
    let store = get_test_store().await;
    let ledger = PostgresInventoryLedger::new(store.pool().clone());

    let result = ledger.reserve(&demand(&[(MUG, 3), (TEA, 6)])).await.unwrap();

    assert_eq!(
        result,
        ReservationResult::Rejected {
            product_id: TEA,
            reason: RejectionReason::Insufficient {
                requested: 6,
                available: 5
            }
        }
    );
    assert_eq!(stock(&store, MUG).await, 10);
    assert_eq!(stock(&store, TEA).await, 5);
}

#[tokio::test]
#[serial]
async fn test_missing_and_inactive_products_are_rejected() {
    let store = get_test_store().await;
    ProductStore::save(&store, Product::new(TEA, "Tea", Money::from_cents(550), 5).deactivated())
        .await
        .unwrap();
    let ledger = PostgresInventoryLedger::new(store.pool().clone());

    let missing = ledger
        .reserve(&demand(&[(MUG, 1), (ProductId::new(42), 1)]))
        .await
        .unwrap();
    assert!(matches!(
        missing,
        ReservationResult::Rejected {
            reason: RejectionReason::Missing,
            ..
        }
    ));

    let inactive = ledger.reserve(&demand(&[(TEA, 1)])).await.unwrap();
    assert!(matches!(
        inactive,
        ReservationResult::Rejected {
            product_id: TEA,
            reason: RejectionReason::Inactive
        }
    ));
    assert_eq!(stock(&store, MUG).await, 10);
}

#[tokio::test]
#[serial]
async fn test_release_restores_stock_and_skips_missing() {
    let store = get_test_store().await;
    let ledger = PostgresInventoryLedger::new(store.pool().clone());
    let reserved = demand(&[(MUG, 4), (TEA, 5)]);

    ledger.reserve(&reserved).await.unwrap();
    assert_eq!(stock(&store, TEA).await, 0);

    ledger.release(&reserved).await.unwrap();
    assert_eq!(stock(&store, MUG).await, 10);
    assert_eq!(stock(&store, TEA).await, 5);

    ledger
        .release(&demand(&[(MUG, 1), (ProductId::new(42), 3)]))
        .await
        .unwrap();
    assert_eq!(stock(&store, MUG).await, 11);
}

#[tokio::test]
#[serial]
async fn test_availability_and_stock_levels() {
    let store = get_test_store().await;
    let ledger = PostgresInventoryLedger::new(store.pool().clone());

    assert!(ledger.check_availability(&demand(&[(MUG, 10)])).await.unwrap());
    assert!(!ledger.check_availability(&demand(&[(MUG, 11)])).await.unwrap());
    assert!(ledger.has_stock(TEA, 5).await.unwrap());
    assert!(!ledger.has_stock(ProductId::new(42), 1).await.unwrap());

    let levels = ledger
        .stock_levels(&[MUG, TEA, ProductId::new(42)])
        .await
        .unwrap();
    assert_eq!(levels.get(&MUG), Some(&10));
    assert_eq!(levels.get(&TEA), Some(&5));
    assert_eq!(levels.get(&ProductId::new(42)), Some(&0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_concurrent_reservations_never_oversell() {
    let store = get_test_store().await;
    let ledger = PostgresInventoryLedger::new(store.pool().clone());

    // 8 attempts at 2 of the 5 teas, in both product orders
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let ledger = ledger.clone();
            let wanted = if i % 2 == 0 {
                demand(&[(MUG, 1), (TEA, 2)])
            } else {
                demand(&[(TEA, 2), (MUG, 1)])
            };
            tokio::spawn(async move { ledger.reserve(&wanted).await.unwrap() })
        })
        .collect();

    let mut reserved = 0;
    for handle in handles {
        if handle.await.unwrap().is_reserved() {
            reserved += 1;
        }
    }

    assert_eq!(reserved, 2);
    assert_eq!(stock(&store, TEA).await, 1);
    assert_eq!(stock(&store, MUG).await, 8);
}

#[tokio::test]
#[serial]
async fn test_checkout_against_postgres() {
    let store = get_test_store().await;
    let ledger = PostgresInventoryLedger::new(store.pool().clone());
    let gateway = InMemoryPaymentGateway::new();
    let coordinator = CheckoutCoordinator::new(
        store.clone(),
        store.clone(),
        store.clone(),
        ledger,
        gateway.clone(),
    );

    let user = UserId::new(1);
    AddressStore::save(
        &store,
        NewAddress {
            user_id: user,
            postal: PostalAddress {
                line1: "1 Main St".to_string(),
                line2: None,
                city: "Springfield".to_string(),
                state: "IL".to_string(),
                postal_code: "62701".to_string(),
                country: "US".to_string(),
            },
            address_type: AddressType::Both,
            is_default: true,
        },
    )
    .await
    .unwrap();
    store
        .add_line(user, CartLine::new(MUG, "Mug", 3, Money::from_cents(1999)).unwrap())
        .await
        .unwrap();
    store
        .add_line(user, CartLine::new(TEA, "Tea", 2, Money::from_cents(550)).unwrap())
        .await
        .unwrap();

    let request = CheckoutRequest::with_default_addresses(PaymentMethod::card_token("tok_visa"));
    let order = coordinator.checkout(user, request.clone()).await.unwrap();

    assert_eq!(order.status(), OrderStatus::Confirmed);
    assert_eq!(order.total_amount(), Money::from_cents(7097));
    assert_eq!(stock(&store, MUG).await, 7);
    assert!(store.get_cart(user).await.unwrap().is_empty());

    let stored = OrderStore::find_by_id(&store, order.id()).await.unwrap().unwrap();
    assert_eq!(stored.lines(), order.lines());
    assert_eq!(stored.payment_reference(), Some("pi_test_0001"));

    // A declined second attempt leaves stock where it was
    store
        .add_line(user, CartLine::new(TEA, "Tea", 3, Money::from_cents(550)).unwrap())
        .await
        .unwrap();
    gateway.decline_with("insufficient funds");
    let err = coordinator.checkout(user, request).await.unwrap_err();

    assert!(matches!(err, CheckoutError::PaymentFailed { .. }));
    assert_eq!(stock(&store, TEA).await, 3);
    assert_eq!(store.get_cart(user).await.unwrap().lines.len(), 1);
}
