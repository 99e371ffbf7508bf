//! Catalog product endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use domain::{NewProduct, ProductFilter, ProductUpdate, ProductView};
use store::RecordStore;

use super::parse_id;
use crate::error::ApiError;
use crate::identity::Caller;
use crate::state::AppState;

/// POST /products
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: RecordStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductView>), ApiError> {
    let Json(input) = payload?;
    let product = state.catalog.create_product(&identity, input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products?category_id=..&search=..
#[tracing::instrument(skip(state, filter))]
pub async fn list<S: RecordStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    filter: Result<Query<ProductFilter>, QueryRejection>,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    let Query(filter) = filter?;
    Ok(Json(state.catalog.list_products(filter).await?))
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: RecordStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductView>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.catalog.get_product(id).await?))
}

/// PUT /products/{id} — replace fields; also the restock path.
#[tracing::instrument(skip(state, payload))]
pub async fn update<S: RecordStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    Path(id): Path<String>,
    payload: Result<Json<ProductUpdate>, JsonRejection>,
) -> Result<Json<ProductView>, ApiError> {
    let id = parse_id(&id)?;
    let Json(update) = payload?;
    Ok(Json(
        state.catalog.update_product(&identity, id, update).await?,
    ))
}

/// DELETE /products/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: RecordStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    state.catalog.delete_product(&identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
