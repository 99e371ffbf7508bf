//! Domain layer for the storefront.
//!
//! This crate provides the services the request layer calls into:
//! - [`CategoryService`]: bounded-depth, acyclic category tree
//! - [`CatalogService`]: products, category membership, price statistics
//! - [`OrderService`]: the order-fulfillment transaction
//! - [`AccountService`]: accounts and password reset
//!
//! Every service is generic over a [`store::RecordStore`] and receives it,
//! along with the [`notifications::Notifier`] where needed, at construction.

pub mod account;
pub mod catalog;
pub mod category;
pub mod error;
pub mod order;
mod transaction;

pub use account::{
    AccountError, AccountService, NewUser, PasswordReset, ProfileUpdate, SignIn, UserView,
};
pub use catalog::{
    CatalogError, CatalogService, NewProduct, ProductFilter, ProductSummary, ProductUpdate,
    ProductView,
};
pub use category::{
    CategoryError, CategoryService, CategorySummary, CategoryUpdate, CategoryView, MAX_LEVEL,
    NewCategory,
};
pub use error::DomainError;
pub use order::{
    CustomerSummary, NewOrder, OrderError, OrderItemView, OrderLine, OrderService, OrderView,
};
