//! Record store for the storefront.
//!
//! The store persists categories, products, orders, order items and users,
//! and hands out transactions in which multi-record writes either all commit
//! or all vanish. Two implementations share the [`RecordStore`] contract:
//! [`InMemoryRecordStore`] for tests and local runs, [`PostgresRecordStore`]
//! for production.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryRecordStore, InMemoryTransaction};
pub use postgres::{PostgresRecordStore, PostgresTransaction};
pub use query::ProductQuery;
pub use records::{CategoryRecord, OrderItemRecord, OrderRecord, ProductRecord, UserRecord};
pub use store::{RecordStore, StoreTransaction};
