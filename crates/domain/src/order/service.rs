//! Order service: the fulfillment transaction and order reads.

use std::sync::Arc;
use std::time::Instant;

use common::{Identity, OrderId, UserId};
use notifications::{NoticeLine, Notification, Notifier, OrderNotice};
use store::{
    OrderItemRecord, OrderRecord, ProductRecord, RecordStore, StoreTransaction, UserRecord,
};

use crate::catalog::ProductSummary;
use crate::error::DomainError;
use crate::transaction::settle;

use super::inventory;
use super::{CustomerSummary, NewOrder, OrderError, OrderItemView, OrderLine, OrderView};

/// Service for placing and reading orders.
///
/// Each order is placed in exactly one store transaction: the order shell,
/// every line, every stock decrement and the final total either all commit
/// or all roll back. Notifications go out only after a commit.
pub struct OrderService<S: RecordStore> {
    store: Arc<S>,
    notifier: Notifier,
}

impl<S: RecordStore> OrderService<S> {
    pub fn new(store: Arc<S>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// Places an order for the calling customer.
    ///
    /// Lines are processed in request order; the first line that names a
    /// missing product or asks for more than is in stock aborts the whole
    /// order.
    #[tracing::instrument(skip(self, input), fields(customer_id = %identity.subject(), lines = input.items.len()))]
    pub async fn create_order(
        &self,
        identity: &Identity,
        input: NewOrder,
    ) -> Result<OrderView, DomainError> {
        let start = Instant::now();
        let result = self.fulfil(identity.subject(), &input).await;
        metrics::histogram!("order_creation_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        let placed = match result {
            Ok(placed) => placed,
            Err(e) => {
                metrics::counter!("orders_failed_total", "reason" => e.kind()).increment(1);
                tracing::warn!(error = %e, "Order rolled back");
                return Err(e);
            }
        };

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %placed.order.id, total = %placed.order.total, "Order created");

        // Built from the committed records; the order exists whatever a
        // re-read would report.
        let view = order_view(
            placed.order,
            Some(&placed.customer),
            placed
                .lines
                .into_iter()
                .map(|(item, product)| (item, Some(product))),
        );
        self.notifier
            .notify(Notification::OrderPlaced(order_notice(&view, &placed.customer)));
        Ok(view)
    }

    /// Loads an order the caller owns, or any order for an admin.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(
        &self,
        identity: &Identity,
        id: OrderId,
    ) -> Result<OrderView, DomainError> {
        let order = self
            .store
            .get_order(id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", id))?;

        if !identity.can_access(order.customer_id) {
            return Err(DomainError::Unauthorized(
                "orders are visible to their customer and admins only",
            ));
        }

        self.load(order).await
    }

    /// The caller's orders, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders_for_user(
        &self,
        identity: &Identity,
    ) -> Result<Vec<OrderView>, DomainError> {
        let orders = self
            .store
            .find_orders_by_customer(identity.subject())
            .await?;
        let mut views = Vec::with_capacity(orders.len());
        for order in orders {
            views.push(self.load(order).await?);
        }
        Ok(views)
    }

    async fn fulfil(&self, customer_id: UserId, input: &NewOrder) -> Result<Placed, DomainError> {
        input.validate()?;
        let mut tx = self.store.begin().await?;
        let result = place_order(&mut tx, customer_id, &input.items).await;
        settle(tx, result).await
    }

    /// Reads an order back with its customer and lines.
    async fn load(&self, order: OrderRecord) -> Result<OrderView, DomainError> {
        let customer = self.store.get_user(order.customer_id).await?;
        let items = self.store.get_order_items(order.id).await?;

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let product = self.store.get_product(item.product_id).await?;
            lines.push((item, product));
        }
        Ok(order_view(order, customer.as_ref(), lines))
    }
}

/// Everything written by one successful fulfillment transaction.
struct Placed {
    order: OrderRecord,
    customer: UserRecord,
    lines: Vec<(OrderItemRecord, ProductRecord)>,
}

fn order_view(
    order: OrderRecord,
    customer: Option<&UserRecord>,
    lines: impl IntoIterator<Item = (OrderItemRecord, Option<ProductRecord>)>,
) -> OrderView {
    OrderView {
        id: order.id,
        customer: customer.map(|c| CustomerSummary {
            id: c.id,
            names: c.names.clone(),
            email: c.email.clone(),
        }),
        customer_id: order.customer_id,
        status: order.status,
        total: order.total,
        items: lines
            .into_iter()
            .map(|(item, product)| OrderItemView {
                id: item.id,
                product_id: item.product_id,
                product: product.as_ref().map(ProductSummary::from),
                quantity: item.quantity,
                unit_price: item.unit_price,
                subtotal: item.subtotal,
            })
            .collect(),
        created_at: order.created_at,
    }
}

async fn place_order<T: StoreTransaction>(
    tx: &mut T,
    customer_id: UserId,
    lines: &[OrderLine],
) -> Result<Placed, DomainError> {
    let customer = tx
        .get_user(customer_id)
        .await?
        .ok_or(OrderError::InvalidCustomer(customer_id))?;

    let mut order = OrderRecord::pending(customer_id);
    tx.insert_order(&order).await?;

    let mut placed = Vec::with_capacity(lines.len());
    for (line_no, line) in lines.iter().enumerate() {
        let product = inventory::reserve(tx, line.product_id, line.quantity).await?;
        let overflow = || OrderError::AmountOverflow {
            product_id: product.id,
        };
        let item = OrderItemRecord::snapshot(order.id, line_no as u32, &product, line.quantity)
            .ok_or_else(overflow)?;
        order.total = order.total.checked_add(item.subtotal).ok_or_else(overflow)?;
        tx.insert_order_item(&item).await?;
        placed.push((item, product));
    }

    tx.save_order(&order).await?;
    Ok(Placed {
        order,
        customer,
        lines: placed,
    })
}

fn order_notice(view: &OrderView, customer: &UserRecord) -> OrderNotice {
    OrderNotice {
        order_id: view.id,
        customer_name: customer.names.clone(),
        customer_email: customer.email.clone(),
        customer_phone: customer.phone_number.clone(),
        total: view.total,
        lines: view
            .items
            .iter()
            .map(|item| NoticeLine {
                product_name: item
                    .product
                    .as_ref()
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| item.product_id.to_string()),
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect(),
    }
}
