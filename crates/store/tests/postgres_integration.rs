//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{Money, Role};
use sqlx::PgPool;
use store::{
    CategoryRecord, OrderItemRecord, OrderRecord, PostgresRecordStore, ProductQuery,
    ProductRecord, RecordStore, StoreError, StoreTransaction, UserRecord,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_storefront_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresRecordStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE order_items, orders, product_categories, products, categories, users",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresRecordStore::new(pool)
}

async fn seed_customer(store: &PostgresRecordStore) -> UserRecord {
    let user = UserRecord::new("Ada", "ada@example.com", "+254700000000", "KE", Role::User);
    store.insert_user(&user).await.unwrap();
    user
}

fn widget(sku: &str, stock: u32) -> ProductRecord {
    ProductRecord::new("Widget", "A widget", Money::from_cents(1000), sku, stock)
}

#[tokio::test]
async fn category_round_trip() {
    let store = get_test_store().await;
    let root = CategoryRecord::new("Electronics", None, 0);
    let child = CategoryRecord::new("Phones", Some(root.id), 1);

    let mut tx = store.begin().await.unwrap();
    tx.lock_category_tree().await.unwrap();
    tx.insert_category(&root).await.unwrap();
    tx.insert_category(&child).await.unwrap();
    tx.commit().await.unwrap();

    let loaded = store.get_category(child.id).await.unwrap().unwrap();
    assert_eq!(loaded.parent_id, Some(root.id));
    assert_eq!(loaded.level, 1);

    let children = store.get_children(root.id).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, child.id);
}

#[tokio::test]
async fn rollback_discards_order_and_stock_change() {
    let store = get_test_store().await;
    let customer = seed_customer(&store).await;
    let product = widget("SKU-1", 2);

    let mut tx = store.begin().await.unwrap();
    tx.insert_product(&product, &[]).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let order = OrderRecord::pending(customer.id);
    tx.insert_order(&order).await.unwrap();
    let mut locked = tx.get_product_for_update(product.id).await.unwrap().unwrap();
    tx.insert_order_item(&OrderItemRecord::snapshot(order.id, 0, &locked, 1).unwrap())
        .await
        .unwrap();
    locked.stock -= 1;
    tx.save_product(&locked).await.unwrap();
    tx.rollback().await.unwrap();

    assert!(store.get_order(order.id).await.unwrap().is_none());
    assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 2);
}

#[tokio::test]
async fn committed_order_reads_back_with_items() {
    let store = get_test_store().await;
    let customer = seed_customer(&store).await;
    let product = widget("SKU-1", 5);

    let mut tx = store.begin().await.unwrap();
    tx.insert_product(&product, &[]).await.unwrap();
    let mut order = OrderRecord::pending(customer.id);
    tx.insert_order(&order).await.unwrap();
    let item = OrderItemRecord::snapshot(order.id, 0, &product, 3).unwrap();
    tx.insert_order_item(&item).await.unwrap();
    order.total = item.subtotal;
    tx.save_order(&order).await.unwrap();
    tx.commit().await.unwrap();

    let loaded = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.total, Money::from_cents(3000));

    let items = store.get_order_items(order.id).await.unwrap();
    assert_eq!(items, vec![item]);

    let orders = store.find_orders_by_customer(customer.id).await.unwrap();
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
async fn duplicate_sku_maps_to_constraint_violation() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    tx.insert_product(&widget("SKU-1", 1), &[]).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let result = tx.insert_product(&widget("SKU-1", 1), &[]).await;
    assert!(matches!(
        result,
        Err(StoreError::ConstraintViolation { ref constraint }) if constraint == "products_sku_key"
    ));
}

#[tokio::test]
async fn duplicate_email_maps_to_constraint_violation() {
    let store = get_test_store().await;
    seed_customer(&store).await;

    let twin = UserRecord::new("Ada 2", "ada@example.com", "+1", "KE", Role::User);
    assert!(store.insert_user(&twin).await.unwrap_err().is_constraint_violation());
}

#[tokio::test]
async fn find_products_filters_by_category_and_search() {
    let store = get_test_store().await;
    let phones = CategoryRecord::new("Phones", None, 0);
    let mut phone = widget("PHONE-1", 1);
    phone.name = "Smartphone".to_string();
    let cable = widget("CABLE_1", 1);

    let mut tx = store.begin().await.unwrap();
    tx.insert_category(&phones).await.unwrap();
    tx.insert_product(&phone, &[phones.id]).await.unwrap();
    tx.insert_product(&cable, &[]).await.unwrap();
    tx.commit().await.unwrap();

    let in_phones = store
        .find_products(&ProductQuery::new().category(phones.id))
        .await
        .unwrap();
    assert_eq!(in_phones.len(), 1);
    assert_eq!(in_phones[0].id, phone.id);

    let cables = store
        .find_products(&ProductQuery::new().search("cable_"))
        .await
        .unwrap();
    assert_eq!(cables.len(), 1);
    assert_eq!(cables[0].id, cable.id);
}

#[tokio::test]
async fn reset_token_lookup() {
    let store = get_test_store().await;
    let mut user = seed_customer(&store).await;
    user.reset_token = Some("token-123".to_string());
    store.save_user(&user).await.unwrap();

    let found = store.find_user_by_reset_token("token-123").await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(user.id));
    assert!(
        store
            .find_user_by_reset_token("other")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn row_lock_serializes_concurrent_decrements() {
    let store = get_test_store().await;
    let product = widget("SKU-RACE", 3);

    let mut tx = store.begin().await.unwrap();
    tx.insert_product(&product, &[]).await.unwrap();
    tx.commit().await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let id = product.id;
        handles.push(tokio::spawn(async move {
            let mut tx = store.begin().await.unwrap();
            let mut locked = tx.get_product_for_update(id).await.unwrap().unwrap();
            if locked.stock == 0 {
                tx.rollback().await.unwrap();
                return false;
            }
            locked.stock -= 1;
            tx.save_product(&locked).await.unwrap();
            tx.commit().await.unwrap();
            true
        }));
    }

    let mut reserved = 0;
    for handle in handles {
        if handle.await.unwrap() {
            reserved += 1;
        }
    }

    assert_eq!(reserved, 3);
    assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 0);
}
