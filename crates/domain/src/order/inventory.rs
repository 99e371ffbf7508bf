//! Inventory ledger: stock checks and decrements inside an order transaction.

use common::ProductId;
use store::{ProductRecord, StoreTransaction};

use crate::error::DomainError;

use super::OrderError;

/// Takes `quantity` units out of `product`, or reports how many are left.
pub(crate) fn take(product: &mut ProductRecord, quantity: u32) -> Result<(), OrderError> {
    if quantity > product.stock {
        return Err(OrderError::InsufficientStock {
            product_id: product.id,
            name: product.name.clone(),
            requested: quantity,
            available: product.stock,
        });
    }
    product.stock -= quantity;
    Ok(())
}

/// Locks the product row, decrements its stock and writes it back.
///
/// Only callable with an open transaction; the returned record carries the
/// price to snapshot into the order line.
pub(crate) async fn reserve<T: StoreTransaction>(
    tx: &mut T,
    product_id: ProductId,
    quantity: u32,
) -> Result<ProductRecord, DomainError> {
    let mut product = tx
        .get_product_for_update(product_id)
        .await?
        .ok_or(OrderError::ProductNotFound(product_id))?;

    take(&mut product, quantity)?;
    tx.save_product(&product).await?;

    tracing::debug!(
        product_id = %product_id,
        quantity,
        remaining = product.stock,
        "Stock reserved"
    );
    Ok(product)
}
