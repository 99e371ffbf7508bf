//! Account endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use domain::{PasswordReset, ProfileUpdate, UserView};
use serde::{Deserialize, Serialize};
use store::RecordStore;

use crate::error::ApiError;
use crate::identity::Caller;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// GET /users/me
#[tracing::instrument(skip(state))]
pub async fn me<S: RecordStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
) -> Result<Json<UserView>, ApiError> {
    Ok(Json(state.accounts.get_user(identity.subject()).await?))
}

/// PUT /users/me — update phone number and country.
#[tracing::instrument(skip(state, payload))]
pub async fn update_me<S: RecordStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<UserView>, ApiError> {
    let Json(update) = payload?;
    Ok(Json(state.accounts.update_profile(&identity, update).await?))
}

/// POST /password-reset — issue a reset token and email the link.
#[tracing::instrument(skip(state, payload))]
pub async fn request_reset<S: RecordStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<PasswordResetRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StatusResponse>), ApiError> {
    let Json(request) = payload?;
    state.accounts.request_password_reset(&request.email).await?;
    Ok((StatusCode::ACCEPTED, Json(StatusResponse { status: "sent" })))
}

/// POST /password-reset/confirm — set a new password with a reset token.
#[tracing::instrument(skip(state, payload))]
pub async fn confirm_reset<S: RecordStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<PasswordReset>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(reset) = payload?;
    state.accounts.reset_password(reset).await?;
    Ok(Json(StatusResponse { status: "reset" }))
}
