//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{NewOrder, OrderView};
use store::RecordStore;

use super::parse_id;
use crate::error::ApiError;
use crate::identity::Caller;
use crate::state::AppState;

/// POST /orders — place an order for the caller.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: RecordStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    payload: Result<Json<NewOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let Json(order) = payload?;
    let order = state.orders.create_order(&identity, order).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders — the caller's orders, oldest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: RecordStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    Ok(Json(state.orders.list_orders_for_user(&identity).await?))
}

/// GET /orders/{id} — visible to the owning customer and admins.
#[tracing::instrument(skip(state))]
pub async fn get<S: RecordStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.orders.get_order(&identity, id).await?))
}
