//! Caller identity extraction.
//!
//! Authentication happens upstream; the gateway forwards the verified
//! subject and role as `x-user-id` and `x-user-role` headers, plus the
//! `x-user-email` and `x-user-name` claims. Every authenticated request
//! signs the caller in: the account is created on first sight and its
//! last login time is stamped.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{Identity, Role, UserId};
use domain::{AccountError, DomainError, SignIn};
use store::RecordStore;

use crate::error::ApiError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Identity);

impl<S> FromRequestParts<Arc<AppState<S>>> for Caller
where
    S: RecordStore + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let (identity, claims) = credentials(parts)?;

        match state.accounts.sign_in(&identity, claims).await {
            Ok(_) => Ok(Caller(identity)),
            Err(DomainError::Account(AccountError::EmptyEmail)) => Err(ApiError::Unauthenticated(
                format!("{USER_EMAIL_HEADER} header required for new users"),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reads the forwarded identity and claims without touching the store.
fn credentials(parts: &Parts) -> Result<(Identity, SignIn), ApiError> {
    let subject: UserId = header(parts, USER_ID_HEADER)?
        .ok_or_else(|| ApiError::Unauthenticated(format!("missing {USER_ID_HEADER} header")))?
        .parse()
        .map_err(|_| ApiError::Unauthenticated(format!("malformed {USER_ID_HEADER} header")))?;

    let role = match header(parts, USER_ROLE_HEADER)? {
        Some(value) => value.parse::<Role>().map_err(ApiError::Unauthenticated)?,
        None => Role::User,
    };

    let claims = SignIn {
        email: header(parts, USER_EMAIL_HEADER)?.map(str::to_string),
        names: header(parts, USER_NAME_HEADER)?.map(str::to_string),
    };

    Ok((Identity::new(subject, role), claims))
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ApiError> {
    parts
        .headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::trim)
                .map_err(|_| ApiError::Unauthenticated(format!("malformed {name} header")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use axum::http::Request;
    use notifications::{NotifierConfig, RecordingDispatcher};
    use store::InMemoryRecordStore;

    use super::*;

    fn state() -> Arc<AppState<InMemoryRecordStore>> {
        let (state, _handle) = AppState::new(
            InMemoryRecordStore::new(),
            Arc::new(RecordingDispatcher::new()),
            NotifierConfig::default(),
        );
        state
    }

    async fn extract(
        state: &Arc<AppState<InMemoryRecordStore>>,
        headers: &[(&str, &str)],
    ) -> Result<Caller, ApiError> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Caller::from_request_parts(&mut parts, state).await
    }

    #[tokio::test]
    async fn defaults_to_customer_role() {
        let state = state();
        let id = UserId::new();
        let raw = id.to_string();
        let Caller(identity) = extract(
            &state,
            &[(USER_ID_HEADER, raw.as_str()), (USER_EMAIL_HEADER, "ada@example.com")],
        )
        .await
        .unwrap();
        assert_eq!(identity, Identity::customer(id));
    }

    #[tokio::test]
    async fn reads_admin_role() {
        let state = state();
        let raw = UserId::new().to_string();
        let Caller(identity) = extract(
            &state,
            &[
                (USER_ID_HEADER, raw.as_str()),
                (USER_ROLE_HEADER, "admin"),
                (USER_EMAIL_HEADER, "root@example.com"),
            ],
        )
        .await
        .unwrap();
        assert!(identity.is_admin());
    }

    #[tokio::test]
    async fn rejects_missing_or_malformed_identity() {
        let state = state();
        assert!(matches!(extract(&state, &[]).await, Err(ApiError::Unauthenticated(_))));
        assert!(matches!(
            extract(&state, &[(USER_ID_HEADER, "not-a-uuid")]).await,
            Err(ApiError::Unauthenticated(_))
        ));
        let raw = UserId::new().to_string();
        assert!(matches!(
            extract(&state, &[(USER_ID_HEADER, raw.as_str()), (USER_ROLE_HEADER, "root")]).await,
            Err(ApiError::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn first_request_provisions_the_account() {
        let state = state();
        let id = UserId::new();
        let raw = id.to_string();

        extract(
            &state,
            &[
                (USER_ID_HEADER, raw.as_str()),
                (USER_EMAIL_HEADER, "Grace@Example.com"),
                (USER_NAME_HEADER, "Grace Hopper"),
            ],
        )
        .await
        .unwrap();

        let user = state.accounts.get_user(id).await.unwrap();
        assert_eq!(user.email, "grace@example.com");
        assert_eq!(user.names, "Grace Hopper");
        assert_eq!(user.role, Role::User);
        assert!(user.last_login_at.is_some());
    }

    #[tokio::test]
    async fn known_caller_needs_no_email() {
        let state = state();
        let id = UserId::new();
        let raw = id.to_string();
        extract(&state, &[(USER_ID_HEADER, raw.as_str()), (USER_EMAIL_HEADER, "ada@example.com")])
            .await
            .unwrap();

        let Caller(identity) = extract(&state, &[(USER_ID_HEADER, raw.as_str())]).await.unwrap();

        assert_eq!(identity.subject(), id);
    }

    #[tokio::test]
    async fn unknown_caller_without_email_is_unauthenticated() {
        let state = state();
        let id = UserId::new();
        let raw = id.to_string();

        let result = extract(&state, &[(USER_ID_HEADER, raw.as_str())]).await;

        assert!(matches!(result, Err(ApiError::Unauthenticated(msg)) if msg.contains(USER_EMAIL_HEADER)));
        assert!(state.accounts.get_user(id).await.is_err());
    }
}
