//! Order fulfillment: one transaction per order, stock reserved line by line.

mod commands;
mod inventory;
mod service;

pub use commands::{NewOrder, OrderLine};
pub use service::OrderService;

use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderItemId, OrderStatus, ProductId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::ProductSummary;

/// Reasons an order cannot be placed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// Invalid quantity.
    #[error("Invalid quantity for product {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// A line references a product that does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A line asks for more units than are in stock.
    #[error("Insufficient stock for product {name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        requested: u32,
        available: u32,
    },

    /// The ordering user has no account record.
    #[error("Invalid customer: {0}")]
    InvalidCustomer(UserId),

    /// A line subtotal or the order total does not fit in the money range.
    #[error("Order amount out of range at product {product_id}")]
    AmountOverflow { product_id: ProductId },
}

impl OrderError {
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::NoItems => "no_items",
            OrderError::InvalidQuantity { .. } => "invalid_quantity",
            OrderError::ProductNotFound(_) => "product_not_found",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::InvalidCustomer(_) => "invalid_customer",
            OrderError::AmountOverflow { .. } => "amount_overflow",
        }
    }
}

/// The customer an order belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub id: UserId,
    pub names: String,
    pub email: String,
}

/// One order line with its frozen price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemView {
    pub id: OrderItemId,
    pub product_id: ProductId,
    /// Current catalog entry for the product, if it still exists.
    pub product: Option<ProductSummary>,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// An order with its customer and lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub id: OrderId,
    pub customer: Option<CustomerSummary>,
    pub customer_id: UserId,
    pub status: OrderStatus,
    pub total: Money,
    pub items: Vec<OrderItemView>,
    pub created_at: DateTime<Utc>,
}
