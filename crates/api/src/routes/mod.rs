//! HTTP route handlers.

pub mod categories;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;
pub mod users;

use std::str::FromStr;

use common::IdParseError;
use domain::DomainError;

use crate::error::ApiError;

/// Parses a path identifier, mapping failures to `InvalidReference`.
pub(crate) fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = IdParseError>,
{
    raw.parse::<T>()
        .map_err(|e| ApiError::Domain(DomainError::from(e)))
}
