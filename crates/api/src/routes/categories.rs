//! Category tree endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{CategoryId, Money};
use domain::{CategoryUpdate, CategoryView, NewCategory};
use serde::Serialize;
use store::RecordStore;

use super::parse_id;
use crate::error::ApiError;
use crate::identity::Caller;
use crate::state::AppState;

#[derive(Serialize)]
pub struct AveragePriceResponse {
    pub category_id: CategoryId,
    pub average_price: Money,
    pub formatted: String,
}

/// POST /categories — create a root or child category.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: RecordStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    payload: Result<Json<NewCategory>, JsonRejection>,
) -> Result<(StatusCode, Json<CategoryView>), ApiError> {
    let Json(input) = payload?;
    let category = state.categories.create_category(&identity, input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /categories — every category with children and products.
#[tracing::instrument(skip(state))]
pub async fn list<S: RecordStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<CategoryView>>, ApiError> {
    Ok(Json(state.categories.list_categories().await?))
}

/// GET /categories/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: RecordStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<CategoryView>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.categories.get_category(id).await?))
}

/// PUT /categories/{id} — rename and/or move a category.
#[tracing::instrument(skip(state, payload))]
pub async fn update<S: RecordStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    Path(id): Path<String>,
    payload: Result<Json<CategoryUpdate>, JsonRejection>,
) -> Result<Json<CategoryView>, ApiError> {
    let id = parse_id(&id)?;
    let Json(update) = payload?;
    Ok(Json(
        state
            .categories
            .update_category(&identity, id, update)
            .await?,
    ))
}

/// GET /categories/{id}/average-price
#[tracing::instrument(skip(state))]
pub async fn average_price<S: RecordStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<AveragePriceResponse>, ApiError> {
    let category_id = parse_id(&id)?;
    let average = state.catalog.category_average_price(category_id).await?;
    Ok(Json(AveragePriceResponse {
        category_id,
        average_price: average,
        formatted: average.to_string(),
    }))
}
