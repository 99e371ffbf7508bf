//! Product catalog: products, their category memberships and price queries.

mod service;

pub use service::CatalogService;

use chrono::{DateTime, Utc};
use common::{CategoryId, Money, ProductId};
use serde::{Deserialize, Serialize};
use store::{ProductQuery, ProductRecord};
use thiserror::Error;

use crate::category::CategorySummary;

/// Product input rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Product name must not be empty")]
    EmptyName,

    #[error("Product SKU must not be empty")]
    EmptySku,

    /// Prices must be strictly positive.
    #[error("Invalid price: {0} (must be greater than 0)")]
    InvalidPrice(Money),
}

/// Input for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    pub sku: String,
    pub stock: u32,
    #[serde(default)]
    pub category_ids: Vec<CategoryId>,
}

/// Replacement values for a product. Setting `stock` is how products are
/// restocked. A missing description keeps the current one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    pub stock: u32,
}

/// Optional filters for listing products.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductFilter {
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub search: Option<String>,
}

impl From<&ProductFilter> for ProductQuery {
    fn from(filter: &ProductFilter) -> Self {
        let mut query = ProductQuery::new();
        if let Some(id) = filter.category_id {
            query = query.category(id);
        }
        if let Some(term) = &filter.search {
            query = query.search(term.as_str());
        }
        query
    }
}

/// A product as listed under a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub price: Money,
}

impl From<&ProductRecord> for ProductSummary {
    fn from(record: &ProductRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            sku: record.sku.clone(),
            price: record.price,
        }
    }
}

/// A product with the categories it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub sku: String,
    pub stock: u32,
    pub categories: Vec<CategorySummary>,
    pub created_at: DateTime<Utc>,
}

impl ProductView {
    pub(crate) fn new(record: ProductRecord, categories: Vec<CategorySummary>) -> Self {
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
            price: record.price,
            sku: record.sku,
            stock: record.stock,
            categories,
            created_at: record.created_at,
        }
    }
}
