//! Shared types for the storefront workspace.
//!
//! Everything here is plain data: strongly typed identifiers, exact money
//! arithmetic, order status, and the authenticated caller identity that the
//! request layer hands to every core operation.

mod identity;
mod money;
mod status;
mod types;

pub use identity::{Identity, Role};
pub use money::Money;
pub use status::OrderStatus;
pub use types::{CategoryId, IdParseError, OrderId, OrderItemId, ProductId, UserId};
