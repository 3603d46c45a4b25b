use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{AddressId, OrderId, ProductId, UserId};
use domain::{
    Address, AddressPurpose, AddressType, Cart, CartLine, NewAddress, NewOrder, Order, OrderNumber,
    OrderStatus, Product,
};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{AddressStore, CartStore, OrderStore, ProductStore},
};

/// In-memory product catalog for testing.
#[derive(Clone, Default)]
pub struct InMemoryProductStore {
    products: Arc<RwLock<BTreeMap<ProductId, Product>>>,
}

impl InMemoryProductStore {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog seeded with the given products.
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let products = products.into_iter().map(|p| (p.id, p)).collect();
        Self {
            products: Arc::new(RwLock::new(products)),
        }
    }

    /// Returns every product ordered by id.
    pub async fn all(&self) -> Vec<Product> {
        self.products.read().await.values().cloned().collect()
    }

    /// Removes a product, simulating a delisting.
    pub async fn remove(&self, id: ProductId) -> Option<Product> {
        self.products.write().await.remove(&id)
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn get(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn save(&self, product: Product) -> Result<()> {
        self.products.write().await.insert(product.id, product);
        Ok(())
    }

    async fn set_stock(&self, id: ProductId, stock_quantity: u32) -> Result<()> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(&id)
            .ok_or(StoreError::ProductNotFound(id))?;
        product.stock_quantity = stock_quantity;
        Ok(())
    }
}

/// In-memory carts for testing.
#[derive(Clone, Default)]
pub struct InMemoryCartStore {
    carts: Arc<RwLock<HashMap<UserId, Vec<CartLine>>>>,
}

impl InMemoryCartStore {
    /// Creates a new store with no carts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a user's cart wholesale, keeping lines exactly as given.
    pub async fn put_cart(&self, cart: Cart) {
        self.carts.write().await.insert(cart.user_id, cart.lines);
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn get_cart(&self, user_id: UserId) -> Result<Cart> {
        let lines = self
            .carts
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default();
        Ok(Cart { user_id, lines })
    }

    async fn add_line(&self, user_id: UserId, line: CartLine) -> Result<()> {
        let mut carts = self.carts.write().await;
        let lines = carts.entry(user_id).or_default();

        match lines.iter_mut().find(|l| l.product_id == line.product_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(line.quantity);
                existing.product_name = line.product_name;
                existing.unit_price = line.unit_price;
            }
            None => lines.push(line),
        }
        Ok(())
    }

    async fn remove_line(&self, user_id: UserId, product_id: ProductId) -> Result<()> {
        let mut carts = self.carts.write().await;
        let lines = carts.entry(user_id).or_default();
        let before = lines.len();
        lines.retain(|l| l.product_id != product_id);

        if lines.len() == before {
            return Err(StoreError::CartLineNotFound {
                user_id,
                product_id,
            });
        }
        Ok(())
    }

    async fn clear(&self, user_id: UserId) -> Result<()> {
        self.carts.write().await.remove(&user_id);
        Ok(())
    }
}

#[derive(Default)]
struct AddressBook {
    addresses: BTreeMap<AddressId, Address>,
    next_id: i64,
}

/// In-memory address book for testing.
#[derive(Clone, Default)]
pub struct InMemoryAddressStore {
    inner: Arc<RwLock<AddressBook>>,
}

impl InMemoryAddressStore {
    /// Creates a new empty address book.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AddressStore for InMemoryAddressStore {
    async fn find_by_id(&self, id: AddressId) -> Result<Option<Address>> {
        Ok(self.inner.read().await.addresses.get(&id).cloned())
    }

    async fn find_default(
        &self,
        user_id: UserId,
        purpose: AddressPurpose,
    ) -> Result<Option<Address>> {
        let book = self.inner.read().await;
        Ok(book
            .addresses
            .values()
            .find(|a| a.user_id == user_id && a.is_default && a.address_type.serves(purpose))
            .cloned())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Address>> {
        let book = self.inner.read().await;
        let mut addresses: Vec<Address> = book
            .addresses
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        addresses.sort_by(|a, b| b.is_default.cmp(&a.is_default).then(b.id.cmp(&a.id)));
        Ok(addresses)
    }

    async fn save(&self, address: NewAddress) -> Result<Address> {
        let mut book = self.inner.write().await;

        if address.is_default {
            for existing in book
                .addresses
                .values_mut()
                .filter(|a| a.user_id == address.user_id)
            {
                if address.address_type == AddressType::Both
                    || existing.address_type == address.address_type
                {
                    existing.is_default = false;
                }
            }
        }

        book.next_id += 1;
        let stored = Address {
            id: AddressId::new(book.next_id),
            user_id: address.user_id,
            postal: address.postal,
            address_type: address.address_type,
            is_default: address.is_default,
        };
        book.addresses.insert(stored.id, stored.clone());
        Ok(stored)
    }
}

#[derive(Default)]
struct OrderTable {
    orders: BTreeMap<OrderId, Order>,
    next_id: i64,
}

/// In-memory order storage for testing.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    inner: Arc<RwLock<OrderTable>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.inner.read().await.orders.len()
    }

    fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
        orders.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then(b.id().cmp(&a.id()))
        });
        orders
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn save(&self, order: NewOrder) -> Result<Order> {
        let mut table = self.inner.write().await;

        if table
            .orders
            .values()
            .any(|o| o.order_number() == &order.order_number)
        {
            return Err(StoreError::DuplicateOrderNumber(
                order.order_number.to_string(),
            ));
        }

        table.next_id += 1;
        let stored = order.into_order(OrderId::new(table.next_id), Utc::now());
        table.orders.insert(stored.id(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, order: &Order, expected: OrderStatus) -> Result<()> {
        let mut table = self.inner.write().await;
        let slot = table
            .orders
            .get_mut(&order.id())
            .ok_or(StoreError::OrderNotFound(order.id()))?;
        if slot.status() != expected {
            return Err(StoreError::StatusConflict {
                order_id: order.id(),
                expected,
            });
        }
        *slot = order.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let table = self.inner.read().await;
        let orders = table
            .orders
            .values()
            .filter(|o| o.user_id() == user_id)
            .cloned()
            .collect();
        Ok(Self::newest_first(orders))
    }

    async fn find_all(&self) -> Result<Vec<Order>> {
        let table = self.inner.read().await;
        Ok(Self::newest_first(table.orders.values().cloned().collect()))
    }

    async fn exists_by_order_number(&self, order_number: &OrderNumber) -> Result<bool> {
        let table = self.inner.read().await;
        Ok(table
            .orders
            .values()
            .any(|o| o.order_number() == order_number))
    }
}
