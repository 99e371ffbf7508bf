use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{CategoryId, OrderId, ProductId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    CategoryRecord, OrderItemRecord, OrderRecord, ProductQuery, ProductRecord, Result, StoreError,
    UserRecord,
    store::{RecordStore, StoreTransaction},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    categories: Vec<CategoryRecord>,
    products: Vec<ProductRecord>,
    product_categories: Vec<(ProductId, CategoryId)>,
    orders: Vec<OrderRecord>,
    order_items: Vec<OrderItemRecord>,
    users: Vec<UserRecord>,
}

impl Tables {
    fn category(&self, id: CategoryId) -> Option<CategoryRecord> {
        self.categories.iter().find(|c| c.id == id).cloned()
    }

    fn children(&self, parent: CategoryId) -> Vec<CategoryRecord> {
        self.categories
            .iter()
            .filter(|c| c.parent_id == Some(parent))
            .cloned()
            .collect()
    }

    fn insert_category(&mut self, category: &CategoryRecord) -> Result<()> {
        if self.categories.iter().any(|c| c.id == category.id) {
            return Err(StoreError::constraint("categories_pkey"));
        }
        if let Some(parent) = category.parent_id
            && self.category(parent).is_none()
        {
            return Err(StoreError::constraint("categories_parent_id_fkey"));
        }
        self.categories.push(category.clone());
        Ok(())
    }

    fn save_category(&mut self, category: &CategoryRecord) -> Result<()> {
        if let Some(existing) = self.categories.iter_mut().find(|c| c.id == category.id) {
            *existing = category.clone();
        }
        Ok(())
    }

    fn product(&self, id: ProductId) -> Option<ProductRecord> {
        self.products.iter().find(|p| p.id == id).cloned()
    }

    fn check_sku(&self, product: &ProductRecord) -> Result<()> {
        if self
            .products
            .iter()
            .any(|p| p.sku == product.sku && p.id != product.id)
        {
            return Err(StoreError::constraint("products_sku_key"));
        }
        Ok(())
    }

    fn insert_product(&mut self, product: &ProductRecord, categories: &[CategoryId]) -> Result<()> {
        self.check_sku(product)?;
        if categories.iter().any(|id| self.category(*id).is_none()) {
            return Err(StoreError::constraint(
                "product_categories_category_id_fkey",
            ));
        }
        self.products.push(product.clone());
        for category in categories {
            if !self.product_categories.contains(&(product.id, *category)) {
                self.product_categories.push((product.id, *category));
            }
        }
        Ok(())
    }

    fn save_product(&mut self, product: &ProductRecord) -> Result<()> {
        self.check_sku(product)?;
        if let Some(existing) = self.products.iter_mut().find(|p| p.id == product.id) {
            *existing = product.clone();
        }
        Ok(())
    }

    fn delete_product(&mut self, id: ProductId) -> Result<bool> {
        if self.product(id).is_none() {
            return Ok(false);
        }
        if self.order_items.iter().any(|i| i.product_id == id) {
            return Err(StoreError::constraint("order_items_product_id_fkey"));
        }
        self.products.retain(|p| p.id != id);
        self.product_categories.retain(|(p, _)| *p != id);
        Ok(true)
    }

    fn user(&self, id: UserId) -> Option<UserRecord> {
        self.users.iter().find(|u| u.id == id).cloned()
    }

    fn check_email(&self, user: &UserRecord) -> Result<()> {
        if self
            .users
            .iter()
            .any(|u| u.email == user.email && u.id != user.id)
        {
            return Err(StoreError::constraint("users_email_key"));
        }
        Ok(())
    }
}

/// In-memory record store implementation for testing.
///
/// A transaction takes exclusive ownership of the tables and works on a
/// staged copy, so transactions are fully serialized and a dropped or
/// rolled-back transaction leaves no trace. Direct reads wait for any open
/// transaction to finish.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    tables: Arc<Mutex<Tables>>,
    fail_on_commit: Arc<AtomicBool>,
    fail_order_reads: Arc<AtomicBool>,
}

impl InMemoryRecordStore {
    /// Creates a new empty in-memory record store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every subsequent commit to abort.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    /// Makes direct order and order-line reads fail. Transactions are
    /// unaffected.
    pub fn set_fail_order_reads(&self, fail: bool) {
        self.fail_order_reads.store(fail, Ordering::SeqCst);
    }

    fn check_order_reads(&self) -> Result<()> {
        if self.fail_order_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Aborted("order reads disabled".to_string()));
        }
        Ok(())
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    /// Returns the number of stored order lines.
    pub async fn order_item_count(&self) -> usize {
        self.tables.lock().await.order_items.len()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            staged,
            fail_on_commit: self.fail_on_commit.load(Ordering::SeqCst),
        })
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<CategoryRecord>> {
        Ok(self.tables.lock().await.category(id))
    }

    async fn list_categories(&self) -> Result<Vec<CategoryRecord>> {
        Ok(self.tables.lock().await.categories.clone())
    }

    async fn get_children(&self, parent: CategoryId) -> Result<Vec<CategoryRecord>> {
        Ok(self.tables.lock().await.children(parent))
    }

    async fn categories_for_product(&self, product: ProductId) -> Result<Vec<CategoryRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .categories
            .iter()
            .filter(|c| tables.product_categories.contains(&(product, c.id)))
            .cloned()
            .collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<ProductRecord>> {
        Ok(self.tables.lock().await.product(id))
    }

    async fn find_products(&self, query: &ProductQuery) -> Result<Vec<ProductRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .products
            .iter()
            .filter(|p| {
                if let Some(category) = query.category_id
                    && !tables.product_categories.contains(&(p.id, category))
                {
                    return false;
                }
                query.matches_search(p)
            })
            .cloned()
            .collect())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderRecord>> {
        self.check_order_reads()?;
        let tables = self.tables.lock().await;
        Ok(tables.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn find_orders_by_customer(&self, customer: UserId) -> Result<Vec<OrderRecord>> {
        self.check_order_reads()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .iter()
            .filter(|o| o.customer_id == customer)
            .cloned()
            .collect())
    }

    async fn get_order_items(&self, order: OrderId) -> Result<Vec<OrderItemRecord>> {
        self.check_order_reads()?;
        let tables = self.tables.lock().await;
        let mut items: Vec<_> = tables
            .order_items
            .iter()
            .filter(|i| i.order_id == order)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.line_no);
        Ok(items)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>> {
        Ok(self.tables.lock().await.user(id))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_reset_token(&self, token: &str) -> Result<Option<UserRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.reset_token.as_deref() == Some(token))
            .cloned())
    }

    async fn insert_user(&self, user: &UserRecord) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.check_email(user)?;
        if tables.user(user.id).is_some() {
            return Err(StoreError::constraint("users_pkey"));
        }
        tables.users.push(user.clone());
        Ok(())
    }

    async fn save_user(&self, user: &UserRecord) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.check_email(user)?;
        if let Some(existing) = tables.users.iter_mut().find(|u| u.id == user.id) {
            *existing = user.clone();
        }
        Ok(())
    }
}

/// Transaction over an [`InMemoryRecordStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
    fail_on_commit: bool,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn lock_category_tree(&mut self) -> Result<()> {
        // The whole store is already held exclusively.
        Ok(())
    }

    async fn get_category(&mut self, id: CategoryId) -> Result<Option<CategoryRecord>> {
        Ok(self.staged.category(id))
    }

    async fn get_children(&mut self, parent: CategoryId) -> Result<Vec<CategoryRecord>> {
        Ok(self.staged.children(parent))
    }

    async fn insert_category(&mut self, category: &CategoryRecord) -> Result<()> {
        self.staged.insert_category(category)
    }

    async fn save_category(&mut self, category: &CategoryRecord) -> Result<()> {
        self.staged.save_category(category)
    }

    async fn get_product_for_update(&mut self, id: ProductId) -> Result<Option<ProductRecord>> {
        Ok(self.staged.product(id))
    }

    async fn insert_product(
        &mut self,
        product: &ProductRecord,
        categories: &[CategoryId],
    ) -> Result<()> {
        self.staged.insert_product(product, categories)
    }

    async fn save_product(&mut self, product: &ProductRecord) -> Result<()> {
        self.staged.save_product(product)
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool> {
        self.staged.delete_product(id)
    }

    async fn get_user(&mut self, id: UserId) -> Result<Option<UserRecord>> {
        Ok(self.staged.user(id))
    }

    async fn insert_order(&mut self, order: &OrderRecord) -> Result<()> {
        if self.staged.user(order.customer_id).is_none() {
            return Err(StoreError::constraint("orders_customer_id_fkey"));
        }
        self.staged.orders.push(order.clone());
        Ok(())
    }

    async fn save_order(&mut self, order: &OrderRecord) -> Result<()> {
        if let Some(existing) = self.staged.orders.iter_mut().find(|o| o.id == order.id) {
            *existing = order.clone();
        }
        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItemRecord) -> Result<()> {
        if !self.staged.orders.iter().any(|o| o.id == item.order_id) {
            return Err(StoreError::constraint("order_items_order_id_fkey"));
        }
        if self.staged.product(item.product_id).is_none() {
            return Err(StoreError::constraint("order_items_product_id_fkey"));
        }
        self.staged.order_items.push(item.clone());
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let InMemoryTransaction {
            mut guard,
            staged,
            fail_on_commit,
        } = self;
        if fail_on_commit {
            return Err(StoreError::Aborted("injected commit failure".to_string()));
        }
        *guard = staged;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
