//! Category service: create, move and read tree nodes.

use std::collections::HashSet;
use std::sync::Arc;

use common::{CategoryId, Identity};
use store::{CategoryRecord, ProductQuery, RecordStore, StoreTransaction};

use crate::catalog::ProductSummary;
use crate::error::DomainError;
use crate::transaction::{require_catalog_admin, settle};

use super::tree::{self, Subtree};
use super::{CategoryError, CategorySummary, CategoryUpdate, CategoryView, NewCategory};

/// Service for managing the category tree.
///
/// Every write runs in one transaction holding the tree lock, so concurrent
/// moves cannot interleave their level recomputation.
pub struct CategoryService<S: RecordStore> {
    store: Arc<S>,
}

impl<S: RecordStore> CategoryService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Creates a root category, or a child one level below `parent_id`.
    #[tracing::instrument(skip(self))]
    pub async fn create_category(
        &self,
        identity: &Identity,
        input: NewCategory,
    ) -> Result<CategoryView, DomainError> {
        require_catalog_admin(identity)?;
        let name = validated_name(&input.name)?;

        let mut tx = self.store.begin().await?;
        let result = insert_category(&mut tx, name, input.parent_id).await;
        let record = settle(tx, result).await?;

        metrics::counter!("categories_written_total", "op" => "create").increment(1);
        tracing::info!(category_id = %record.id, level = record.level, "Category created");

        self.view(record).await
    }

    /// Renames a category and moves it under `update.parent_id` (or to the
    /// root when absent). Levels of the whole moved subtree are rewritten in
    /// the same transaction.
    #[tracing::instrument(skip(self))]
    pub async fn update_category(
        &self,
        identity: &Identity,
        id: CategoryId,
        update: CategoryUpdate,
    ) -> Result<CategoryView, DomainError> {
        require_catalog_admin(identity)?;
        let name = validated_name(&update.name)?;

        let mut tx = self.store.begin().await?;
        let result = move_category(&mut tx, id, name, update.parent_id).await;
        let (record, relevelled) = settle(tx, result).await?;

        metrics::counter!("categories_written_total", "op" => "update").increment(1);
        tracing::info!(
            category_id = %record.id,
            level = record.level,
            relevelled,
            "Category updated"
        );

        self.view(record).await
    }

    /// Loads a category with its children and products.
    #[tracing::instrument(skip(self))]
    pub async fn get_category(&self, id: CategoryId) -> Result<CategoryView, DomainError> {
        let record = self
            .store
            .get_category(id)
            .await?
            .ok_or_else(|| DomainError::not_found("category", id))?;
        self.view(record).await
    }

    /// Every category with its children and products, in creation order.
    #[tracing::instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<CategoryView>, DomainError> {
        let all = self.store.list_categories().await?;
        let mut views = Vec::with_capacity(all.len());
        for record in &all {
            let children = all
                .iter()
                .filter(|c| c.parent_id == Some(record.id))
                .map(CategorySummary::from)
                .collect();
            let products = self.products_in(record.id).await?;
            views.push(CategoryView {
                id: record.id,
                name: record.name.clone(),
                parent_id: record.parent_id,
                level: record.level,
                children,
                products,
            });
        }
        Ok(views)
    }

    async fn view(&self, record: CategoryRecord) -> Result<CategoryView, DomainError> {
        let children = self
            .store
            .get_children(record.id)
            .await?
            .iter()
            .map(CategorySummary::from)
            .collect();
        let products = self.products_in(record.id).await?;
        Ok(CategoryView {
            id: record.id,
            name: record.name,
            parent_id: record.parent_id,
            level: record.level,
            children,
            products,
        })
    }

    async fn products_in(&self, id: CategoryId) -> Result<Vec<ProductSummary>, DomainError> {
        Ok(self
            .store
            .find_products(&ProductQuery::new().category(id))
            .await?
            .iter()
            .map(ProductSummary::from)
            .collect())
    }
}

fn validated_name(name: &str) -> Result<String, CategoryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CategoryError::EmptyName);
    }
    Ok(name.to_string())
}

async fn insert_category<T: StoreTransaction>(
    tx: &mut T,
    name: String,
    parent_id: Option<CategoryId>,
) -> Result<CategoryRecord, DomainError> {
    tx.lock_category_tree().await?;

    let level = match parent_id {
        Some(parent_id) => {
            let parent = tx
                .get_category(parent_id)
                .await?
                .ok_or_else(|| DomainError::not_found("category", parent_id))?;
            tree::child_level(&parent)?
        }
        None => 0,
    };

    let record = CategoryRecord::new(name, parent_id, level);
    tx.insert_category(&record).await?;
    Ok(record)
}

/// Returns the saved category and how many descendants changed level.
async fn move_category<T: StoreTransaction>(
    tx: &mut T,
    id: CategoryId,
    name: String,
    parent_id: Option<CategoryId>,
) -> Result<(CategoryRecord, usize), DomainError> {
    tx.lock_category_tree().await?;

    let mut target = tx
        .get_category(id)
        .await?
        .ok_or_else(|| DomainError::not_found("category", id))?;

    let level = match parent_id {
        Some(parent_id) => {
            let parent = tx
                .get_category(parent_id)
                .await?
                .ok_or_else(|| DomainError::not_found("category", parent_id))?;
            let ancestors = ancestors_of(tx, &parent).await?;
            tree::check_new_parent(id, parent_id, &ancestors)?;
            tree::child_level(&parent)?
        }
        None => 0,
    };

    let subtree = collect_subtree(tx, id).await?;
    subtree.check_fits(level)?;

    target.name = name;
    target.parent_id = parent_id;
    target.level = level;
    tx.save_category(&target).await?;

    let changed = subtree.relevel(level);
    for node in &changed {
        tx.save_category(node).await?;
    }

    Ok((target, changed.len()))
}

/// Ids above `node`, nearest first, up to the root.
async fn ancestors_of<T: StoreTransaction>(
    tx: &mut T,
    node: &CategoryRecord,
) -> Result<Vec<CategoryId>, DomainError> {
    let mut chain = Vec::new();
    let mut next = node.parent_id;
    while let Some(id) = next {
        if chain.contains(&id) {
            break;
        }
        chain.push(id);
        next = tx.get_category(id).await?.and_then(|c| c.parent_id);
    }
    Ok(chain)
}

async fn collect_subtree<T: StoreTransaction>(
    tx: &mut T,
    root: CategoryId,
) -> Result<Subtree, DomainError> {
    let mut subtree = Subtree::new();
    let mut seen = HashSet::from([root]);
    let mut frontier = vec![(root, 0u8)];

    while let Some((id, depth)) = frontier.pop() {
        for child in tx.get_children(id).await? {
            if !seen.insert(child.id) {
                continue;
            }
            let child_depth = depth.saturating_add(1);
            frontier.push((child.id, child_depth));
            subtree.push(child, child_depth);
        }
    }

    Ok(subtree)
}
