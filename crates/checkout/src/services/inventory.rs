//! Inventory ledger trait and in-process implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::ProductId;
use domain::{InventoryDemand, Product, ReservationResult};
use store::{ProductStore, StoreError};
use tokio::sync::Mutex;

use crate::telemetry::{INVENTORY_RELEASED, INVENTORY_RESERVATIONS};

/// Per-product stock accounting with atomic multi-item reservation.
///
/// Rejections are values; `Err` means the backing storage failed.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Checks the whole demand, then decrements every product, or nothing.
    ///
    /// A rejection names the first offending product in ascending id order.
    async fn reserve(&self, demand: &InventoryDemand) -> Result<ReservationResult, StoreError>;

    /// Gives reserved units back. Products that no longer exist are skipped.
    async fn release(&self, demand: &InventoryDemand) -> Result<(), StoreError>;

    /// Runs the reservation check without mutating anything.
    ///
    /// The answer may be stale by the time the caller acts on it.
    async fn check_availability(&self, demand: &InventoryDemand) -> Result<bool, StoreError>;

    /// Current stock of each product; unknown products report 0.
    async fn stock_levels(
        &self,
        product_ids: &[ProductId],
    ) -> Result<BTreeMap<ProductId, u32>, StoreError>;

    /// Single-product form of `check_availability`.
    async fn has_stock(&self, product_id: ProductId, quantity: u32) -> Result<bool, StoreError> {
        self.check_availability(&InventoryDemand::single(product_id, quantity))
            .await
    }
}

/// The check pass shared by every ledger.
///
/// Walks the demand in ascending product id and returns the first rejection,
/// or `Reserved` if every product can supply its quantity.
pub fn check_demand(
    demand: &InventoryDemand,
    products: &BTreeMap<ProductId, Product>,
) -> ReservationResult {
    for (product_id, requested) in demand.iter() {
        let verdict = match products.get(&product_id) {
            Some(product) => product.can_supply(requested),
            None => Err(domain::RejectionReason::Missing),
        };
        if let Err(reason) = verdict {
            return ReservationResult::Rejected { product_id, reason };
        }
    }
    ReservationResult::Reserved
}

pub(crate) fn record_reservation(result: &ReservationResult) {
    metrics::counter!(INVENTORY_RESERVATIONS, "outcome" => result.as_str()).increment(1);
}

pub(crate) fn record_release() {
    metrics::counter!(INVENTORY_RELEASED).increment(1);
}

/// In-process ledger over any product store.
///
/// A single async mutex serializes every check-then-mutate sequence, so two
/// concurrent reservations of the last unit cannot both succeed.
pub struct LockingInventoryLedger<P: ProductStore> {
    products: P,
    lock: Arc<Mutex<()>>,
}

impl<P: ProductStore + Clone> Clone for LockingInventoryLedger<P> {
    fn clone(&self) -> Self {
        Self {
            products: self.products.clone(),
            lock: Arc::clone(&self.lock),
        }
    }
}

impl<P: ProductStore> LockingInventoryLedger<P> {
    /// Creates a ledger over the given product store.
    pub fn new(products: P) -> Self {
        Self {
            products,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Returns the underlying product store.
    pub fn products(&self) -> &P {
        &self.products
    }

    async fn load(&self, product_ids: &[ProductId]) -> Result<BTreeMap<ProductId, Product>, StoreError> {
        let mut loaded = BTreeMap::new();
        for &id in product_ids {
            if let Some(product) = self.products.get(id).await? {
                loaded.insert(id, product);
            }
        }
        Ok(loaded)
    }

    /// Puts back decrements already applied when a later write fails.
    async fn undo(&self, applied: &[(ProductId, u32)]) {
        for &(id, previous) in applied.iter().rev() {
            if let Err(e) = self.products.set_stock(id, previous).await {
                tracing::error!(product_id = %id, stock = previous, error = %e, "failed to restore stock");
            }
        }
    }
}

#[async_trait]
impl<P: ProductStore> InventoryLedger for LockingInventoryLedger<P> {
    #[tracing::instrument(skip(self, demand), fields(products = demand.len(), units = demand.total_units()))]
    async fn reserve(&self, demand: &InventoryDemand) -> Result<ReservationResult, StoreError> {
        let _guard = self.lock.lock().await;

        let products = self.load(&demand.product_ids()).await?;
        let result = check_demand(demand, &products);
        if !result.is_reserved() {
            tracing::info!(outcome = result.as_str(), "reservation rejected");
            record_reservation(&result);
            return Ok(result);
        }

        let mut applied = Vec::with_capacity(demand.len());
        for (id, requested) in demand.iter() {
            let previous = products
                .get(&id)
                .map(|p| p.stock_quantity)
                .ok_or(StoreError::ProductNotFound(id))?;
            if let Err(e) = self.products.set_stock(id, previous - requested).await {
                self.undo(&applied).await;
                return Err(e);
            }
            applied.push((id, previous));
        }

        tracing::debug!("reservation applied");
        record_reservation(&result);
        Ok(result)
    }

    #[tracing::instrument(skip(self, demand), fields(products = demand.len()))]
    async fn release(&self, demand: &InventoryDemand) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;

        for (id, quantity) in demand.iter() {
            match self.products.get(id).await? {
                Some(product) => {
                    self.products
                        .set_stock(id, product.stock_quantity.saturating_add(quantity))
                        .await?;
                }
                None => {
                    tracing::warn!(product_id = %id, quantity, "released product no longer exists");
                }
            }
        }

        record_release();
        Ok(())
    }

    async fn check_availability(&self, demand: &InventoryDemand) -> Result<bool, StoreError> {
        let products = self.load(&demand.product_ids()).await?;
        Ok(check_demand(demand, &products).is_reserved())
    }

    async fn stock_levels(
        &self,
        product_ids: &[ProductId],
    ) -> Result<BTreeMap<ProductId, u32>, StoreError> {
        let products = self.load(product_ids).await?;
        Ok(product_ids
            .iter()
            .map(|id| (*id, products.get(id).map_or(0, |p| p.stock_quantity)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Money, RejectionReason};
    use store::InMemoryProductStore;

    fn product(id: i64, stock: u32) -> Product {
        Product::new(ProductId::new(id), format!("P{id}"), Money::from_cents(100), stock)
    }

    fn demand(entries: &[(i64, u32)]) -> InventoryDemand {
        InventoryDemand::from_entries(entries.iter().map(|&(id, qty)| (ProductId::new(id), qty)))
            .unwrap()
    }

    fn ledger(products: Vec<Product>) -> LockingInventoryLedger<InMemoryProductStore> {
        LockingInventoryLedger::new(InMemoryProductStore::with_products(products))
    }

    #[test]
    fn test_check_demand_reports_first_offender_in_id_order() {
        let products: BTreeMap<_, _> = [product(1, 0), product(2, 0)]
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let result = check_demand(&demand(&[(2, 1), (1, 1)]), &products);
        assert_eq!(
            result,
            ReservationResult::Rejected {
                product_id: ProductId::new(1),
                reason: RejectionReason::Insufficient {
                    requested: 1,
                    available: 0
                },
            }
        );
    }

    #[tokio::test]
    async fn test_reserve_decrements_each_product() {
        let ledger = ledger(vec![product(1, 10), product(2, 5)]);

        let result = ledger.reserve(&demand(&[(1, 3), (2, 5)])).await.unwrap();
        assert_eq!(result, ReservationResult::Reserved);

        let levels = ledger
            .stock_levels(&[ProductId::new(1), ProductId::new(2)])
            .await
            .unwrap();
        assert_eq!(levels[&ProductId::new(1)], 7);
        assert_eq!(levels[&ProductId::new(2)], 0);
    }

    #[tokio::test]
    async fn test_rejection_mutates_nothing() {
        let ledger = ledger(vec![product(1, 10), product(2, 1)]);
        let before = ledger.products().all().await;

        let result = ledger.reserve(&demand(&[(1, 3), (2, 2)])).await.unwrap();
        assert!(matches!(
            result,
            ReservationResult::Rejected { product_id, .. } if product_id == ProductId::new(2)
        ));
        assert_eq!(ledger.products().all().await, before);
    }

    #[tokio::test]
    async fn test_missing_and_inactive_products_rejected() {
        let inactive = product(2, 10).deactivated();
        let ledger = ledger(vec![product(1, 10), inactive]);

        let missing = ledger.reserve(&demand(&[(1, 1), (9, 1)])).await.unwrap();
        assert_eq!(
            missing,
            ReservationResult::Rejected {
                product_id: ProductId::new(9),
                reason: RejectionReason::Missing,
            }
        );

        let result = ledger.reserve(&demand(&[(2, 1)])).await.unwrap();
        assert_eq!(
            result,
            ReservationResult::Rejected {
                product_id: ProductId::new(2),
                reason: RejectionReason::Inactive,
            }
        );
    }

    #[tokio::test]
    async fn test_release_is_inverse_of_reserve() {
        let ledger = ledger(vec![product(1, 10), product(2, 5)]);
        let before = ledger.products().all().await;
        let d = demand(&[(1, 4), (2, 5)]);

        ledger.reserve(&d).await.unwrap();
        ledger.release(&d).await.unwrap();

        assert_eq!(ledger.products().all().await, before);
    }

    #[tokio::test]
    async fn test_release_skips_vanished_product() {
        let ledger = ledger(vec![product(1, 10), product(2, 5)]);
        let d = demand(&[(1, 2), (2, 2)]);
        ledger.reserve(&d).await.unwrap();
        ledger.products().remove(ProductId::new(2)).await;

        ledger.release(&d).await.unwrap();

        let levels = ledger
            .stock_levels(&[ProductId::new(1), ProductId::new(2)])
            .await
            .unwrap();
        assert_eq!(levels[&ProductId::new(1)], 10);
        assert_eq!(levels[&ProductId::new(2)], 0);
    }

    #[tokio::test]
    async fn test_check_availability_does_not_mutate() {
        let ledger = ledger(vec![product(1, 2)]);

        assert!(ledger.check_availability(&demand(&[(1, 2)])).await.unwrap());
        assert!(!ledger.check_availability(&demand(&[(1, 3)])).await.unwrap());
        assert!(ledger.has_stock(ProductId::new(1), 1).await.unwrap());
        assert!(!ledger.has_stock(ProductId::new(7), 1).await.unwrap());

        let levels = ledger.stock_levels(&[ProductId::new(1)]).await.unwrap();
        assert_eq!(levels[&ProductId::new(1)], 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations_of_last_unit() {
        let ledger = ledger(vec![product(1, 1)]);
        let d = demand(&[(1, 1)]);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                let d = d.clone();
                tokio::spawn(async move { ledger.reserve(&d).await.unwrap() })
            })
            .collect();

        let mut reserved = 0;
        for handle in handles {
            if handle.await.unwrap().is_reserved() {
                reserved += 1;
            }
        }

        assert_eq!(reserved, 1);
        let levels = ledger.stock_levels(&[ProductId::new(1)]).await.unwrap();
        assert_eq!(levels[&ProductId::new(1)], 0);
    }
}
