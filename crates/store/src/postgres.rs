use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AddressId, OrderId, ProductId, UserId};
use domain::{
    Address, AddressPurpose, AddressType, Cart, CartLine, Money, NewAddress, NewOrder, Order,
    OrderLine, OrderNumber, OrderParts, OrderStatus, PostalAddress, Product,
};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    Result, StoreError,
    store::{AddressStore, CartStore, OrderStore, ProductStore},
};

const ORDER_NUMBER_CONSTRAINT: &str = "orders_order_number_key";

const ORDER_COLUMNS: &str = "id, order_number, user_id, total_amount_cents, status, \
     payment_method, shipping_address, billing_address, payment_reference, \
     created_at, updated_at, shipped_at, delivered_at";

/// PostgreSQL-backed implementation of every store trait.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Converts a stock count or quantity to its column type.
pub fn count_to_db(count: u32) -> Result<i32> {
    i32::try_from(count).map_err(|_| StoreError::Corrupt(format!("count {count} out of range")))
}

/// Converts a stock or quantity column back to a count.
pub fn count_from_db(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {column}: {value}")))
}

/// Builds a product from a `products` row.
pub fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock_quantity: count_from_db(row.try_get("stock_quantity")?, "stock_quantity")?,
        active: row.try_get("active")?,
    })
}

fn row_to_cart_line(row: &PgRow) -> Result<CartLine> {
    Ok(CartLine {
        product_id: ProductId::new(row.try_get("product_id")?),
        product_name: row.try_get("product_name")?,
        quantity: count_from_db(row.try_get("quantity")?, "quantity")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
    })
}

fn row_to_address(row: &PgRow) -> Result<Address> {
    let address_type: String = row.try_get("address_type")?;
    Ok(Address {
        id: AddressId::new(row.try_get("id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        postal: PostalAddress {
            line1: row.try_get("line1")?,
            line2: row.try_get("line2")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            postal_code: row.try_get("postal_code")?,
            country: row.try_get("country")?,
        },
        address_type: AddressType::from_stored(&address_type),
        is_default: row.try_get("is_default")?,
    })
}

fn row_to_order_line(row: &PgRow) -> Result<OrderLine> {
    Ok(OrderLine {
        product_id: ProductId::new(row.try_get("product_id")?),
        product_name: row.try_get("product_name")?,
        quantity: count_from_db(row.try_get("quantity")?, "quantity")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        line_total: Money::from_cents(row.try_get("line_total_cents")?),
    })
}

fn row_to_order(row: &PgRow, lines: Vec<OrderLine>) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let status: OrderStatus = status
        .parse()
        .map_err(|e: domain::DomainError| StoreError::Corrupt(e.to_string()))?;

    Ok(Order::from(OrderParts {
        id: OrderId::new(row.try_get("id")?),
        order_number: OrderNumber::new(row.try_get::<String, _>("order_number")?),
        user_id: UserId::new(row.try_get("user_id")?),
        lines,
        total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
        status,
        payment_method: row.try_get("payment_method")?,
        shipping_address: row.try_get("shipping_address")?,
        billing_address: row.try_get("billing_address")?,
        payment_reference: row.try_get("payment_reference")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        shipped_at: row.try_get("shipped_at")?,
        delivered_at: row.try_get("delivered_at")?,
    }))
}

impl PostgresStore {
    /// Loads the lines of the given orders, grouped by order id in line order.
    async fn lines_for(&self, order_ids: &[i64]) -> Result<HashMap<i64, Vec<OrderLine>>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, product_name, quantity, unit_price_cents, line_total_cents
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_no
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i64, Vec<OrderLine>> = HashMap::new();
        for row in &rows {
            let order_id: i64 = row.try_get("order_id")?;
            grouped
                .entry(order_id)
                .or_default()
                .push(row_to_order_line(row)?);
        }
        Ok(grouped)
    }

    async fn orders_from_rows(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut lines = self.lines_for(&ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| row_to_order(row, lines.remove(&id).unwrap_or_default()))
            .collect()
    }
}

#[async_trait]
impl ProductStore for PostgresStore {
    async fn get(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, name, price_cents, stock_quantity, active FROM products WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn save(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock_quantity, active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                stock_quantity = EXCLUDED.stock_quantity,
                active = EXCLUDED.active,
                updated_at = NOW()
            "#,
        )
        .bind(product.id.get())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(count_to_db(product.stock_quantity)?)
        .bind(product.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_stock(&self, id: ProductId, stock_quantity: u32) -> Result<()> {
        let result = sqlx::query(
            "UPDATE products SET stock_quantity = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.get())
        .bind(count_to_db(stock_quantity)?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn get_cart(&self, user_id: UserId) -> Result<Cart> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, product_name, quantity, unit_price_cents
            FROM cart_lines
            WHERE user_id = $1
            ORDER BY added_at ASC, product_id ASC
            "#,
        )
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await?;

        let lines = rows.iter().map(row_to_cart_line).collect::<Result<_>>()?;
        Ok(Cart { user_id, lines })
    }

    async fn add_line(&self, user_id: UserId, line: CartLine) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_lines (user_id, product_id, product_name, quantity, unit_price_cents)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, product_id) DO UPDATE
            SET quantity = cart_lines.quantity + EXCLUDED.quantity,
                product_name = EXCLUDED.product_name,
                unit_price_cents = EXCLUDED.unit_price_cents
            "#,
        )
        .bind(user_id.get())
        .bind(line.product_id.get())
        .bind(&line.product_name)
        .bind(count_to_db(line.quantity)?)
        .bind(line.unit_price.cents())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_line(&self, user_id: UserId, product_id: ProductId) -> Result<()> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE user_id = $1 AND product_id = $2")
            .bind(user_id.get())
            .bind(product_id.get())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::CartLineNotFound {
                user_id,
                product_id,
            });
        }
        Ok(())
    }

    async fn clear(&self, user_id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM cart_lines WHERE user_id = $1")
            .bind(user_id.get())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AddressStore for PostgresStore {
    async fn find_by_id(&self, id: AddressId) -> Result<Option<Address>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, line1, line2, city, state, postal_code, country, address_type, is_default
            FROM addresses
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_address).transpose()
    }

    async fn find_default(
        &self,
        user_id: UserId,
        purpose: AddressPurpose,
    ) -> Result<Option<Address>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, line1, line2, city, state, postal_code, country, address_type, is_default
            FROM addresses
            WHERE user_id = $1 AND is_default AND address_type IN ($2, 'BOTH')
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(user_id.get())
        .bind(purpose.address_type().as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_address).transpose()
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Address>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, line1, line2, city, state, postal_code, country, address_type, is_default
            FROM addresses
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at DESC, id DESC
            "#,
        )
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_address).collect()
    }

    async fn save(&self, address: NewAddress) -> Result<Address> {
        let mut tx = self.pool.begin().await?;

        if address.is_default {
            sqlx::query(
                r#"
                UPDATE addresses SET is_default = FALSE
                WHERE user_id = $1 AND ($2 = 'BOTH' OR address_type = $2)
                "#,
            )
            .bind(address.user_id.get())
            .bind(address.address_type.as_str())
            .execute(&mut *tx)
            .await?;
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO addresses
                (user_id, line1, line2, city, state, postal_code, country, address_type, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(address.user_id.get())
        .bind(&address.postal.line1)
        .bind(&address.postal.line2)
        .bind(&address.postal.city)
        .bind(&address.postal.state)
        .bind(&address.postal.postal_code)
        .bind(&address.postal.country)
        .bind(address.address_type.as_str())
        .bind(address.is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Address {
            id: AddressId::new(id),
            user_id: address.user_id,
            postal: address.postal,
            address_type: address.address_type,
            is_default: address.is_default,
        })
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn save(&self, order: NewOrder) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO orders
                (order_number, user_id, total_amount_cents, status, payment_method,
                 shipping_address, billing_address, payment_reference)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, created_at
            "#,
        )
        .bind(order.order_number.as_str())
        .bind(order.user_id.get())
        .bind(order.total_amount.cents())
        .bind(order.status.as_str())
        .bind(&order.payment_method)
        .bind(&order.shipping_address)
        .bind(&order.billing_address)
        .bind(&order.payment_reference)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(ORDER_NUMBER_CONSTRAINT)
            {
                return StoreError::DuplicateOrderNumber(order.order_number.to_string());
            }
            StoreError::Database(e)
        })?;

        let id: i64 = row.try_get("id")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;

        for (line_no, line) in order.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines
                    (order_id, line_no, product_id, product_name, quantity,
                     unit_price_cents, line_total_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(id)
            .bind(line_no as i32)
            .bind(line.product_id.get())
            .bind(&line.product_name)
            .bind(count_to_db(line.quantity)?)
            .bind(line.unit_price.cents())
            .bind(line.line_total.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(order_id = id, order_number = %order.order_number, "Order row inserted");
        Ok(order.into_order(OrderId::new(id), created_at))
    }

    async fn update(&self, order: &Order, expected: OrderStatus) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, updated_at = $3, shipped_at = $4, delivered_at = $5
            WHERE id = $1 AND status = $6
            "#,
        )
        .bind(order.id().get())
        .bind(order.status().as_str())
        .bind(order.updated_at())
        .bind(order.shipped_at())
        .bind(order.delivered_at())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1)")
                    .bind(order.id().get())
                    .fetch_one(&self.pool)
                    .await?;
            if !exists {
                return Err(StoreError::OrderNotFound(order.id()));
            }
            return Err(StoreError::StatusConflict {
                order_id: order.id(),
                expected,
            });
        }
        Ok(())
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.orders_from_rows(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await?;

        self.orders_from_rows(rows).await
    }

    async fn find_all(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        self.orders_from_rows(rows).await
    }

    async fn exists_by_order_number(&self, order_number: &OrderNumber) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE order_number = $1)")
                .bind(order_number.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}
