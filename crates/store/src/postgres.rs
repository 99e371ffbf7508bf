use async_trait::async_trait;
use common::{CategoryId, Money, OrderId, OrderItemId, ProductId, UserId};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CategoryRecord, OrderItemRecord, OrderRecord, ProductQuery, ProductRecord, Result, StoreError,
    UserRecord,
    store::{RecordStore, StoreTransaction},
};

const CATEGORY_COLUMNS: &str = "id, name, parent_id, level, created_at";
const PRODUCT_COLUMNS: &str = "id, name, description, price_cents, sku, stock, created_at";
const ORDER_COLUMNS: &str = "id, customer_id, status, total_cents, created_at";
const ORDER_ITEM_COLUMNS: &str =
    "id, order_id, product_id, line_no, quantity, unit_price_cents, subtotal_cents";
const USER_COLUMNS: &str = "id, names, email, password_hash, phone_number, country, role, \
     last_login_at, reset_token, reset_token_expires_at, created_at";

/// Advisory lock key guarding category tree writes.
const CATEGORY_TREE_LOCK: i64 = 0x6361_7465_676f_7279;

/// PostgreSQL-backed record store implementation.
#[derive(Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// Creates a new PostgreSQL record store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool to `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
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

fn to_u32(value: i32, column: &'static str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Decode {
        column,
        reason: format!("negative value {value}"),
    })
}

fn to_i32(value: u32, column: &'static str) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::Decode {
        column,
        reason: format!("value {value} out of range"),
    })
}

fn category_from_row(row: PgRow) -> Result<CategoryRecord> {
    let level: i16 = row.try_get("level")?;
    Ok(CategoryRecord {
        id: CategoryId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        parent_id: row
            .try_get::<Option<Uuid>, _>("parent_id")?
            .map(CategoryId::from_uuid),
        level: u8::try_from(level).map_err(|_| StoreError::Decode {
            column: "level",
            reason: format!("value {level} out of range"),
        })?,
        created_at: row.try_get("created_at")?,
    })
}

fn product_from_row(row: PgRow) -> Result<ProductRecord> {
    Ok(ProductRecord {
        id: ProductId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        sku: row.try_get("sku")?,
        stock: to_u32(row.try_get("stock")?, "stock")?,
        created_at: row.try_get("created_at")?,
    })
}

fn order_from_row(row: PgRow) -> Result<OrderRecord> {
    let status: String = row.try_get("status")?;
    Ok(OrderRecord {
        id: OrderId::from_uuid(row.try_get("id")?),
        customer_id: UserId::from_uuid(row.try_get("customer_id")?),
        status: status.parse().map_err(|reason| StoreError::Decode {
            column: "status",
            reason,
        })?,
        total: Money::from_cents(row.try_get("total_cents")?),
        created_at: row.try_get("created_at")?,
    })
}

fn order_item_from_row(row: PgRow) -> Result<OrderItemRecord> {
    Ok(OrderItemRecord {
        id: OrderItemId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        line_no: to_u32(row.try_get("line_no")?, "line_no")?,
        quantity: to_u32(row.try_get("quantity")?, "quantity")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
    })
}

fn user_from_row(row: PgRow) -> Result<UserRecord> {
    let role: String = row.try_get("role")?;
    Ok(UserRecord {
        id: UserId::from_uuid(row.try_get("id")?),
        names: row.try_get("names")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        phone_number: row.try_get("phone_number")?,
        country: row.try_get("country")?,
        role: role.parse().map_err(|reason| StoreError::Decode {
            column: "role",
            reason,
        })?,
        last_login_at: row.try_get("last_login_at")?,
        reset_token: row.try_get("reset_token")?,
        reset_token_expires_at: row.try_get("reset_token_expires_at")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<CategoryRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(category_from_row).transpose()
    }

    async fn list_categories(&self) -> Result<Vec<CategoryRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(category_from_row).collect()
    }

    async fn get_children(&self, parent: CategoryId) -> Result<Vec<CategoryRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE parent_id = $1 \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(parent.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(category_from_row).collect()
    }

    async fn categories_for_product(&self, product: ProductId) -> Result<Vec<CategoryRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.name, c.parent_id, c.level, c.created_at
            FROM categories c
            JOIN product_categories pc ON pc.category_id = c.id
            WHERE pc.product_id = $1
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(product.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(category_from_row).collect()
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<ProductRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(product_from_row).transpose()
    }

    async fn find_products(&self, query: &ProductQuery) -> Result<Vec<ProductRecord>> {
        let mut sql = format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE 1=1");
        let mut param_count = 0;

        if query.category_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM product_categories pc \
                 WHERE pc.product_id = p.id AND pc.category_id = ${param_count})"
            ));
        }
        let pattern = query.like_pattern();
        if pattern.is_some() {
            param_count += 1;
            sql.push_str(&format!(
                " AND (p.name ILIKE ${param_count} OR p.description ILIKE ${param_count} \
                 OR p.sku ILIKE ${param_count})"
            ));
        }
        sql.push_str(" ORDER BY p.created_at ASC, p.id ASC");

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(category) = query.category_id {
            sqlx_query = sqlx_query.bind(category.as_uuid());
        }
        if let Some(pattern) = pattern {
            sqlx_query = sqlx_query.bind(pattern);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(product_from_row).collect()
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderRecord>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(order_from_row).transpose()
    }

    async fn find_orders_by_customer(&self, customer: UserId) -> Result<Vec<OrderRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(customer.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(order_from_row).collect()
    }

    async fn get_order_items(&self, order: OrderId) -> Result<Vec<OrderItemRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 \
             ORDER BY line_no ASC"
        ))
        .bind(order.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(order_item_from_row).collect()
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(user_from_row).transpose()
    }

    async fn find_user_by_reset_token(&self, token: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE reset_token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        row.map(user_from_row).transpose()
    }

    async fn insert_user(&self, user: &UserRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, names, email, password_hash, phone_number, country, role,
                               last_login_at, reset_token, reset_token_expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.names)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.phone_number)
        .bind(&user.country)
        .bind(user.role.as_str())
        .bind(user.last_login_at)
        .bind(&user.reset_token)
        .bind(user.reset_token_expires_at)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_user(&self, user: &UserRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users SET names = $2, email = $3, password_hash = $4, phone_number = $5,
                country = $6, role = $7, last_login_at = $8, reset_token = $9,
                reset_token_expires_at = $10
            WHERE id = $1
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.names)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.phone_number)
        .bind(&user.country)
        .bind(user.role.as_str())
        .bind(user.last_login_at)
        .bind(&user.reset_token)
        .bind(user.reset_token_expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Transaction over a [`PostgresRecordStore`].
///
/// Product reads use `SELECT ... FOR UPDATE`, so concurrent reservations of
/// the same product queue behind each other until the holder commits or
/// rolls back.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn lock_category_tree(&mut self) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(CATEGORY_TREE_LOCK)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn get_category(&mut self, id: CategoryId) -> Result<Option<CategoryRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(category_from_row).transpose()
    }

    async fn get_children(&mut self, parent: CategoryId) -> Result<Vec<CategoryRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE parent_id = $1 \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(parent.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(category_from_row).collect()
    }

    async fn insert_category(&mut self, category: &CategoryRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, parent_id, level, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(category.id.as_uuid())
        .bind(&category.name)
        .bind(category.parent_id.map(|p| p.as_uuid()))
        .bind(i16::from(category.level))
        .bind(category.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn save_category(&mut self, category: &CategoryRecord) -> Result<()> {
        sqlx::query("UPDATE categories SET name = $2, parent_id = $3, level = $4 WHERE id = $1")
            .bind(category.id.as_uuid())
            .bind(&category.name)
            .bind(category.parent_id.map(|p| p.as_uuid()))
            .bind(i16::from(category.level))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn get_product_for_update(&mut self, id: ProductId) -> Result<Option<ProductRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(product_from_row).transpose()
    }

    async fn insert_product(
        &mut self,
        product: &ProductRecord,
        categories: &[CategoryId],
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price_cents, sku, stock, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(&product.sku)
        .bind(to_i32(product.stock, "stock")?)
        .bind(product.created_at)
        .execute(&mut *self.tx)
        .await?;

        for category in categories {
            sqlx::query(
                r#"
                INSERT INTO product_categories (product_id, category_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(product.id.as_uuid())
            .bind(category.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn save_product(&mut self, product: &ProductRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE products SET name = $2, description = $3, price_cents = $4, sku = $5, stock = $6
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(&product.sku)
        .bind(to_i32(product.stock, "stock")?)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_user(&mut self, id: UserId) -> Result<Option<UserRecord>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(user_from_row).transpose()
    }

    async fn insert_order(&mut self, order: &OrderRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, status, total_cents, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.total.cents())
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn save_order(&mut self, order: &OrderRecord) -> Result<()> {
        sqlx::query("UPDATE orders SET status = $2, total_cents = $3 WHERE id = $1")
            .bind(order.id.as_uuid())
            .bind(order.status.as_str())
            .bind(order.total.cents())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItemRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, line_no, quantity,
                                     unit_price_cents, subtotal_cents)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.order_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(to_i32(item.line_no, "line_no")?)
        .bind(to_i32(item.quantity, "quantity")?)
        .bind(item.unit_price.cents())
        .bind(item.subtotal.cents())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        metrics::counter!("store_transactions_total", "outcome" => "committed").increment(1);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        metrics::counter!("store_transactions_total", "outcome" => "rolled_back").increment(1);
        tracing::debug!("transaction rolled back");
        Ok(())
    }
}
