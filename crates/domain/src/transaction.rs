//! Commit-or-rollback handling shared by the services.

use common::Identity;
use store::StoreTransaction;

use crate::error::DomainError;

/// Commits `tx` when `result` is a success and rolls it back otherwise.
///
/// The original error is returned unchanged; a failed rollback is only
/// logged.
pub(crate) async fn settle<T, R>(tx: T, result: Result<R, DomainError>) -> Result<R, DomainError>
where
    T: StoreTransaction,
{
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}

/// Rejects callers that may not change categories or products.
pub(crate) fn require_catalog_admin(identity: &Identity) -> Result<(), DomainError> {
    if identity.can_manage_catalog() {
        Ok(())
    } else {
        Err(DomainError::Unauthorized(
            "catalog changes require the admin role",
        ))
    }
}
