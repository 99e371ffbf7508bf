use async_trait::async_trait;
use common::{CategoryId, OrderId, ProductId, UserId};

use crate::{
    CategoryRecord, OrderItemRecord, OrderRecord, ProductQuery, ProductRecord, Result, UserRecord,
};

/// Core trait for record store implementations.
///
/// Reads and single-row account writes can be issued directly against the
/// store. Every multi-row write goes through a [`StoreTransaction`] obtained
/// from [`RecordStore::begin`]. All implementations must be thread-safe.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The transaction type handed out by this store.
    type Transaction: StoreTransaction;

    /// Opens a new transaction scope.
    async fn begin(&self) -> Result<Self::Transaction>;

    async fn get_category(&self, id: CategoryId) -> Result<Option<CategoryRecord>>;

    /// All categories in creation order.
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>>;

    /// Direct children of `parent`, in creation order.
    async fn get_children(&self, parent: CategoryId) -> Result<Vec<CategoryRecord>>;

    async fn categories_for_product(&self, product: ProductId) -> Result<Vec<CategoryRecord>>;

    async fn get_product(&self, id: ProductId) -> Result<Option<ProductRecord>>;

    /// Products matching `query`, in creation order.
    async fn find_products(&self, query: &ProductQuery) -> Result<Vec<ProductRecord>>;

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderRecord>>;

    /// Orders placed by `customer`, oldest first.
    async fn find_orders_by_customer(&self, customer: UserId) -> Result<Vec<OrderRecord>>;

    /// Lines of an order in request order.
    async fn get_order_items(&self, order: OrderId) -> Result<Vec<OrderItemRecord>>;

    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    async fn find_user_by_reset_token(&self, token: &str) -> Result<Option<UserRecord>>;

    /// Inserts a user. Fails with `ConstraintViolation` on a duplicate email.
    async fn insert_user(&self, user: &UserRecord) -> Result<()>;

    /// Overwrites an existing user row.
    async fn save_user(&self, user: &UserRecord) -> Result<()>;
}

/// A unit of work against the record store.
///
/// Writes become visible to other callers only after [`commit`]. Dropping a
/// transaction without committing discards every write made through it.
///
/// [`commit`]: StoreTransaction::commit
#[async_trait]
pub trait StoreTransaction: Send {
    /// Serializes category tree writes for the rest of this transaction.
    async fn lock_category_tree(&mut self) -> Result<()>;

    async fn get_category(&mut self, id: CategoryId) -> Result<Option<CategoryRecord>>;

    async fn get_children(&mut self, parent: CategoryId) -> Result<Vec<CategoryRecord>>;

    async fn insert_category(&mut self, category: &CategoryRecord) -> Result<()>;

    async fn save_category(&mut self, category: &CategoryRecord) -> Result<()>;

    /// Reads a product and holds it against concurrent writers until the
    /// transaction ends.
    async fn get_product_for_update(&mut self, id: ProductId) -> Result<Option<ProductRecord>>;

    /// Inserts a product and its category memberships.
    /// Fails with `ConstraintViolation` on a duplicate SKU.
    async fn insert_product(
        &mut self,
        product: &ProductRecord,
        categories: &[CategoryId],
    ) -> Result<()>;

    async fn save_product(&mut self, product: &ProductRecord) -> Result<()>;

    /// Deletes a product and its category memberships.
    ///
    /// Returns false if no such product exists. Fails with
    /// `ConstraintViolation` while order lines still reference it.
    async fn delete_product(&mut self, id: ProductId) -> Result<bool>;

    async fn get_user(&mut self, id: UserId) -> Result<Option<UserRecord>>;

    async fn insert_order(&mut self, order: &OrderRecord) -> Result<()>;

    async fn save_order(&mut self, order: &OrderRecord) -> Result<()>;

    async fn insert_order_item(&mut self, item: &OrderItemRecord) -> Result<()>;

    /// Makes every write in this transaction durable and visible.
    async fn commit(self) -> Result<()>;

    /// Discards every write in this transaction.
    async fn rollback(self) -> Result<()>;
}
