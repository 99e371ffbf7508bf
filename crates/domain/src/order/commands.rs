//! Order inputs.

use common::ProductId;
use serde::{Deserialize, Serialize};

use super::OrderError;

/// One requested line: a product and how many units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// A request to place an order for the calling customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub items: Vec<OrderLine>,
}

impl NewOrder {
    pub fn new(items: Vec<OrderLine>) -> Self {
        Self { items }
    }

    /// Adds a line to the order.
    pub fn with_line(mut self, product_id: ProductId, quantity: u32) -> Self {
        self.items.push(OrderLine::new(product_id, quantity));
        self
    }

    /// Rejects empty orders and zero quantities before any store access.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::NoItems);
        }
        if let Some(line) = self.items.iter().find(|line| line.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }
        Ok(())
    }
}
