//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{AccountError, CategoryError, DomainError, OrderError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Caller identity missing or malformed.
    Unauthenticated(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        metrics::counter!("http_errors_total", "status" => status.as_u16().to_string())
            .increment(1);

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    let status = match &err {
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::InvalidReference { .. } => StatusCode::BAD_REQUEST,
        DomainError::Unauthorized(_) => StatusCode::FORBIDDEN,
        DomainError::Category(category_err) => match category_err {
            CategoryError::EmptyName => StatusCode::BAD_REQUEST,
            CategoryError::DepthExceeded { .. }
            | CategoryError::SelfParent(_)
            | CategoryError::CyclicParent { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        },
        DomainError::Catalog(_) => StatusCode::BAD_REQUEST,
        DomainError::Order(order_err) => match order_err {
            OrderError::ProductNotFound(_) => StatusCode::NOT_FOUND,
            OrderError::InsufficientStock { .. } => StatusCode::CONFLICT,
            OrderError::NoItems
            | OrderError::InvalidQuantity { .. }
            | OrderError::InvalidCustomer(_)
            | OrderError::AmountOverflow { .. } => StatusCode::BAD_REQUEST,
        },
        DomainError::Account(account_err) => match account_err {
            AccountError::EmptyEmail
            | AccountError::PasswordMismatch
            | AccountError::InvalidResetToken
            | AccountError::ResetTokenExpired
            | AccountError::WeakPassword { .. } => StatusCode::BAD_REQUEST,
        },
        DomainError::ConstraintViolation { .. } => StatusCode::CONFLICT,
        DomainError::TransactionFailure(_) => {
            tracing::error!(error = %err, "internal server error");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            );
        }
    };
    (status, err.to_string())
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CategoryId, ProductId};
    use store::StoreError;

    fn status_of(err: DomainError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn hierarchy_rules_are_unprocessable() {
        let id = CategoryId::new();
        assert_eq!(
            status_of(CategoryError::SelfParent(id).into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(CategoryError::DepthExceeded { level: 5, max: 4 }.into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn stock_and_uniqueness_conflicts() {
        let err = OrderError::InsufficientStock {
            product_id: ProductId::new(),
            name: "Widget".to_string(),
            requested: 3,
            available: 2,
        };
        assert_eq!(status_of(err.into()), StatusCode::CONFLICT);
        assert_eq!(
            status_of(StoreError::constraint("products_sku_key").into()),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn store_failures_hide_details() {
        let response =
            ApiError::from(DomainError::from(StoreError::Aborted("boom".to_string())))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn missing_identity_is_unauthenticated() {
        let response = ApiError::Unauthenticated("missing x-user-id".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
