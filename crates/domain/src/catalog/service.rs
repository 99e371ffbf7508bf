//! Catalog service: product CRUD and category price statistics.

use std::sync::Arc;

use common::{CategoryId, Identity, Money, ProductId};
use store::{ProductQuery, ProductRecord, RecordStore, StoreTransaction};

use crate::category::CategorySummary;
use crate::error::DomainError;
use crate::transaction::{require_catalog_admin, settle};

use super::{CatalogError, NewProduct, ProductFilter, ProductUpdate, ProductView};

/// Service for managing catalog products.
pub struct CatalogService<S: RecordStore> {
    store: Arc<S>,
}

impl<S: RecordStore> CatalogService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Creates a product in the given categories.
    ///
    /// Fails with `NotFound` for an unknown category and with
    /// `ConstraintViolation` for a SKU already in use.
    #[tracing::instrument(skip(self))]
    pub async fn create_product(
        &self,
        identity: &Identity,
        input: NewProduct,
    ) -> Result<ProductView, DomainError> {
        require_catalog_admin(identity)?;
        let name = required(&input.name, CatalogError::EmptyName)?;
        let sku = required(&input.sku, CatalogError::EmptySku)?;
        check_price(input.price)?;

        let product = ProductRecord::new(
            name,
            input.description.unwrap_or_default(),
            input.price,
            sku,
            input.stock,
        );
        let mut categories = input.category_ids;
        categories.sort();
        categories.dedup();

        let mut tx = self.store.begin().await?;
        let result = insert_product(&mut tx, &product, &categories).await;
        settle(tx, result).await?;

        tracing::info!(product_id = %product.id, sku = %product.sku, "Product created");
        self.get_product(product.id).await
    }

    /// Replaces name, description, price and stock of a product.
    #[tracing::instrument(skip(self))]
    pub async fn update_product(
        &self,
        identity: &Identity,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<ProductView, DomainError> {
        require_catalog_admin(identity)?;
        let name = required(&update.name, CatalogError::EmptyName)?;
        check_price(update.price)?;

        let mut tx = self.store.begin().await?;
        let result = apply_update(&mut tx, id, name, update).await;
        let product = settle(tx, result).await?;

        tracing::info!(product_id = %product.id, stock = product.stock, "Product updated");
        self.get_product(id).await
    }

    /// Removes a product and its category memberships.
    ///
    /// Products already referenced by order lines are kept and the call fails
    /// with `ConstraintViolation`.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, identity: &Identity, id: ProductId) -> Result<(), DomainError> {
        require_catalog_admin(identity)?;

        let mut tx = self.store.begin().await?;
        let result = match tx.delete_product(id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DomainError::not_found("product", id)),
            Err(e) => Err(e.into()),
        };
        settle(tx, result).await?;

        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<ProductView, DomainError> {
        let record = self
            .store
            .get_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", id))?;
        let categories = self
            .store
            .categories_for_product(id)
            .await?
            .iter()
            .map(CategorySummary::from)
            .collect();
        Ok(ProductView::new(record, categories))
    }

    /// Products matching `filter`, in creation order.
    #[tracing::instrument(skip(self))]
    pub async fn list_products(&self, filter: ProductFilter) -> Result<Vec<ProductView>, DomainError> {
        let records = self.store.find_products(&ProductQuery::from(&filter)).await?;
        let mut views = Vec::with_capacity(records.len());
        for record in records {
            let categories = self
                .store
                .categories_for_product(record.id)
                .await?
                .iter()
                .map(CategorySummary::from)
                .collect();
            views.push(ProductView::new(record, categories));
        }
        Ok(views)
    }

    /// Mean price of the products in a category; zero when it has none.
    #[tracing::instrument(skip(self))]
    pub async fn category_average_price(&self, category_id: CategoryId) -> Result<Money, DomainError> {
        if self.store.get_category(category_id).await?.is_none() {
            return Err(DomainError::not_found("category", category_id));
        }
        let products = self
            .store
            .find_products(&ProductQuery::new().category(category_id))
            .await?;
        Ok(Money::average(products.iter().map(|p| p.price)))
    }
}

fn required(value: &str, err: CatalogError) -> Result<String, CatalogError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(err);
    }
    Ok(value.to_string())
}

fn check_price(price: Money) -> Result<(), CatalogError> {
    if price.is_positive() {
        Ok(())
    } else {
        Err(CatalogError::InvalidPrice(price))
    }
}

async fn insert_product<T: StoreTransaction>(
    tx: &mut T,
    product: &ProductRecord,
    categories: &[CategoryId],
) -> Result<(), DomainError> {
    for &category_id in categories {
        if tx.get_category(category_id).await?.is_none() {
            return Err(DomainError::not_found("category", category_id));
        }
    }
    tx.insert_product(product, categories).await?;
    Ok(())
}

async fn apply_update<T: StoreTransaction>(
    tx: &mut T,
    id: ProductId,
    name: String,
    update: ProductUpdate,
) -> Result<ProductRecord, DomainError> {
    let mut product = tx
        .get_product_for_update(id)
        .await?
        .ok_or_else(|| DomainError::not_found("product", id))?;

    product.name = name;
    if let Some(description) = update.description {
        product.description = description;
    }
    product.price = update.price;
    product.stock = update.stock;

    tx.save_product(&product).await?;
    Ok(product)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::UserId;
    use store::InMemoryRecordStore;

    fn new_product(sku: &str, cents: i64) -> NewProduct {
        NewProduct {
            name: "Widget".to_string(),
            description: None,
            price: Money::from_cents(cents),
            sku: sku.to_string(),
            stock: 5,
            category_ids: vec![],
        }
    }

    fn service() -> (CatalogService<InMemoryRecordStore>, Identity) {
        (
            CatalogService::new(Arc::new(InMemoryRecordStore::new())),
            Identity::admin(UserId::new()),
        )
    }

    #[tokio::test]
    async fn non_positive_price_is_rejected() {
        let (service, admin) = service();
        let result = service.create_product(&admin, new_product("SKU-1", 0)).await;
        assert!(matches!(
            result,
            Err(DomainError::Catalog(CatalogError::InvalidPrice(_)))
        ));
    }

    #[tokio::test]
    async fn unknown_category_is_not_found() {
        let (service, admin) = service();
        let mut input = new_product("SKU-1", 100);
        input.category_ids = vec![CategoryId::new()];

        let result = service.create_product(&admin, input).await;
        assert!(matches!(
            result,
            Err(DomainError::NotFound { entity: "category", .. })
        ));
        assert!(service.list_products(ProductFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_restocks_and_keeps_description() {
        let (service, admin) = service();
        let mut input = new_product("SKU-1", 100);
        input.description = Some("Blue".to_string());
        let created = service.create_product(&admin, input).await.unwrap();

        let updated = service
            .update_product(
                &admin,
                created.id,
                ProductUpdate {
                    name: "Widget".to_string(),
                    description: None,
                    price: Money::from_cents(150),
                    stock: 40,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.stock, 40);
        assert_eq!(updated.price, Money::from_cents(150));
        assert_eq!(updated.description, "Blue");
    }

    #[tokio::test]
    async fn delete_of_missing_product_is_not_found() {
        let (service, admin) = service();
        let result = service.delete_product(&admin, ProductId::new()).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn customers_cannot_change_products() {
        let (service, _) = service();
        let customer = Identity::customer(UserId::new());
        let result = service.create_product(&customer, new_product("SKU-1", 100)).await;
        assert!(matches!(result, Err(DomainError::Unauthorized(_))));
    }
}
