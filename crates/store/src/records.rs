//! Persisted record shapes.
//!
//! Records mirror table rows one-to-one. Relations are carried as identifiers;
//! the domain layer assembles them into response views.

use chrono::{DateTime, Utc};
use common::{CategoryId, Money, OrderId, OrderItemId, OrderStatus, ProductId, Role, UserId};
use serde::{Deserialize, Serialize};

/// A node in the category tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: CategoryId,
    pub name: String,
    pub parent_id: Option<CategoryId>,
    /// Distance from the root of the tree; stored, never derived on read.
    pub level: u8,
    pub created_at: DateTime<Utc>,
}

impl CategoryRecord {
    pub fn new(name: impl Into<String>, parent_id: Option<CategoryId>, level: u8) -> Self {
        Self {
            id: CategoryId::new(),
            name: name.into(),
            parent_id,
            level,
            created_at: Utc::now(),
        }
    }
}

/// A catalog product together with its stock count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub sku: String,
    pub stock: u32,
    pub created_at: DateTime<Utc>,
}

impl ProductRecord {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        price: Money,
        sku: impl Into<String>,
        stock: u32,
    ) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            description: description.into(),
            price,
            sku: sku.into(),
            stock,
            created_at: Utc::now(),
        }
    }
}

/// Order header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub customer_id: UserId,
    pub status: OrderStatus,
    pub total: Money,
    pub created_at: DateTime<Utc>,
}

impl OrderRecord {
    /// A fresh order shell: pending, zero total.
    pub fn pending(customer_id: UserId) -> Self {
        Self {
            id: OrderId::new(),
            customer_id,
            status: OrderStatus::Pending,
            total: Money::zero(),
            created_at: Utc::now(),
        }
    }
}

/// One line of an order, with the product price frozen at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    /// Position of the line in the original request, starting at 0.
    pub line_no: u32,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

impl OrderItemRecord {
    /// Snapshots the current price of `product` into a new order line.
    ///
    /// Returns `None` when the subtotal does not fit in the cent range.
    pub fn snapshot(
        order_id: OrderId,
        line_no: u32,
        product: &ProductRecord,
        quantity: u32,
    ) -> Option<Self> {
        Some(Self {
            id: OrderItemId::new(),
            order_id,
            product_id: product.id,
            line_no,
            quantity,
            unit_price: product.price,
            subtotal: product.price.checked_multiply(quantity)?,
        })
    }
}

/// A customer or administrator account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub names: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub phone_number: String,
    pub country: String,
    pub role: Role,
    pub last_login_at: Option<DateTime<Utc>>,
    pub reset_token: Option<String>,
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(
        names: impl Into<String>,
        email: impl Into<String>,
        phone_number: impl Into<String>,
        country: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id: UserId::new(),
            names: names.into(),
            email: email.into(),
            password_hash: None,
            phone_number: phone_number.into(),
            country: country.into(),
            role,
            last_login_at: None,
            reset_token: None,
            reset_token_expires_at: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_freezes_price_and_subtotal() {
        let mut product = ProductRecord::new("Widget", "", Money::from_cents(1000), "SKU-1", 5);
        let item = OrderItemRecord::snapshot(OrderId::new(), 0, &product, 3).unwrap();

        product.price = Money::from_cents(9999);

        assert_eq!(item.unit_price, Money::from_cents(1000));
        assert_eq!(item.subtotal, Money::from_cents(3000));
        assert_eq!(item.product_id, product.id);
    }

    #[test]
    fn snapshot_refuses_overflowing_subtotal() {
        let product = ProductRecord::new("Bullion", "", Money::from_cents(i64::MAX / 2), "AU-1", 5);
        assert!(OrderItemRecord::snapshot(OrderId::new(), 0, &product, 3).is_none());
    }

    #[test]
    fn pending_order_starts_empty() {
        let order = OrderRecord::pending(UserId::new());
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.total.is_zero());
    }
}
