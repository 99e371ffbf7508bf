//! Domain error types.

use common::IdParseError;
use store::StoreError;
use thiserror::Error;

use crate::account::AccountError;
use crate::catalog::CatalogError;
use crate::category::CategoryError;
use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An identifier could not be parsed.
    #[error("Invalid {entity} reference: {value:?}")]
    InvalidReference { entity: &'static str, value: String },

    /// The caller may not perform this operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    /// A category hierarchy rule was violated.
    #[error(transparent)]
    Category(CategoryError),

    /// A catalog rule was violated.
    #[error(transparent)]
    Catalog(CatalogError),

    /// An order could not be fulfilled.
    #[error(transparent)]
    Order(OrderError),

    /// An account operation was rejected.
    #[error(transparent)]
    Account(AccountError),

    /// The store rejected a write (duplicate SKU or email, dangling reference).
    #[error("Constraint violation: {constraint}")]
    ConstraintViolation { constraint: String },

    /// The store aborted the operation.
    #[error("Transaction failed: {0}")]
    TransactionFailure(StoreError),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::NotFound { .. } => "not_found",
            DomainError::InvalidReference { .. } => "invalid_reference",
            DomainError::Unauthorized(_) => "unauthorized",
            DomainError::Category(_) => "category",
            DomainError::Catalog(_) => "catalog",
            DomainError::Order(e) => e.kind(),
            DomainError::Account(_) => "account",
            DomainError::ConstraintViolation { .. } => "constraint_violation",
            DomainError::TransactionFailure(_) => "transaction_failure",
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConstraintViolation { constraint } => {
                DomainError::ConstraintViolation { constraint }
            }
            other => DomainError::TransactionFailure(other),
        }
    }
}

impl From<IdParseError> for DomainError {
    fn from(e: IdParseError) -> Self {
        DomainError::InvalidReference {
            entity: e.kind,
            value: e.value,
        }
    }
}

impl From<CategoryError> for DomainError {
    fn from(e: CategoryError) -> Self {
        DomainError::Category(e)
    }
}

impl From<CatalogError> for DomainError {
    fn from(e: CatalogError) -> Self {
        DomainError::Catalog(e)
    }
}

impl From<OrderError> for DomainError {
    fn from(e: OrderError) -> Self {
        DomainError::Order(e)
    }
}

impl From<AccountError> for DomainError {
    fn from(e: AccountError) -> Self {
        DomainError::Account(e)
    }
}
