//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::config::Config;
use api::identity::{USER_EMAIL_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};
use api::state::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Identity, Role, UserId};
use domain::NewUser;
use metrics_exporter_prometheus::PrometheusHandle;
use notifications::{NotifierConfig, NotifierHandle, RecordingDispatcher, SentMessage};
use serde_json::{Value, json};
use store::InMemoryRecordStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    state: Arc<AppState<InMemoryRecordStore>>,
    dispatcher: Arc<RecordingDispatcher>,
    admin: UserId,
    _notifier: NotifierHandle,
}

fn setup() -> TestApp {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let (state, notifier) = AppState::new(
        InMemoryRecordStore::new(),
        dispatcher.clone(),
        NotifierConfig::default(),
    );
    let app = api::create_app(state.clone(), get_metrics_handle(), &Config::default());
    TestApp {
        app,
        state,
        dispatcher,
        admin: UserId::new(),
        _notifier: notifier,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: &str,
        uri: &str,
        caller: Option<(UserId, Role)>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((id, role)) = caller {
            builder = builder
                .header(USER_ID_HEADER, id.to_string())
                .header(USER_ROLE_HEADER, role.as_str())
                .header(USER_EMAIL_HEADER, format!("{id}@example.com"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn as_admin(&self) -> Option<(UserId, Role)> {
        Some((self.admin, Role::Admin))
    }

    async fn customer(&self, email: &str) -> UserId {
        self.state
            .accounts
            .register_user(NewUser {
                names: "Ada Lovelace".to_string(),
                email: email.to_string(),
                phone_number: "+15550100".to_string(),
                country: "UK".to_string(),
                role: Role::User,
                password: Some("initial-pass".to_string()),
            })
            .await
            .unwrap()
            .id
    }

    async fn product(&self, sku: &str, price_cents: i64, stock: u32) -> String {
        let (status, json) = self
            .send(
                "POST",
                "/products",
                self.as_admin(),
                Some(json!({
                    "name": format!("Product {sku}"),
                    "description": "test product",
                    "price": price_cents,
                    "sku": sku,
                    "stock": stock,
                    "category_ids": []
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["id"].as_str().unwrap().to_string()
    }
}

mod ambient {
    use super::*;

    #[tokio::test]
    async fn health_reports_ok() {
        let app = setup();
        let (status, json) = app.send("GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "api");
    }

    #[tokio::test]
    async fn metrics_are_exposed_in_prometheus_format() {
        let app = setup();
        let (status, _) = app.send("GET", "/orders", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let response = app
            .app
            .clone()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("http_errors_total"));
    }

    #[tokio::test]
    async fn protected_routes_require_identity() {
        let app = setup();
        let (status, json) = app.send("GET", "/users/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(json["error"].as_str().unwrap().contains("x-user-id"));
    }

    #[tokio::test]
    async fn malformed_path_id_is_bad_request() {
        let app = setup();
        let (status, _) = app.send("GET", "/categories/not-a-uuid", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let app = setup();
        let (status, json) = app
            .send(
                "POST",
                "/categories",
                app.as_admin(),
                Some(json!({ "title": "missing name" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }
}

mod categories {
    use super::*;

    #[tokio::test]
    async fn create_list_and_average_price() {
        let app = setup();
        let (status, root) = app
            .send(
                "POST",
                "/categories",
                app.as_admin(),
                Some(json!({ "name": "Electronics", "parent_id": null })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(root["level"], 0);

        let (status, child) = app
            .send(
                "POST",
                "/categories",
                app.as_admin(),
                Some(json!({ "name": "Phones", "parent_id": root["id"] })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(child["level"], 1);

        for (sku, cents) in [("PH-1", 1000), ("PH-2", 2000)] {
            let (status, _) = app
                .send(
                    "POST",
                    "/products",
                    app.as_admin(),
                    Some(json!({
                        "name": sku,
                        "description": null,
                        "price": cents,
                        "sku": sku,
                        "stock": 1,
                        "category_ids": [child["id"]]
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, all) = app.send("GET", "/categories", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all.as_array().unwrap().len(), 2);

        let uri = format!("/categories/{}/average-price", child["id"].as_str().unwrap());
        let (status, average) = app.send("GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(average["average_price"], 1500);
        assert_eq!(average["formatted"], "$15.00");
    }

    #[tokio::test]
    async fn customers_cannot_change_the_tree() {
        let app = setup();
        let (status, _) = app
            .send(
                "POST",
                "/categories",
                Some((UserId::new(), Role::User)),
                Some(json!({ "name": "Nope", "parent_id": null })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn moving_a_parent_under_its_child_is_unprocessable() {
        let app = setup();
        let (_, parent) = app
            .send(
                "POST",
                "/categories",
                app.as_admin(),
                Some(json!({ "name": "Parent", "parent_id": null })),
            )
            .await;
        let (_, child) = app
            .send(
                "POST",
                "/categories",
                app.as_admin(),
                Some(json!({ "name": "Child", "parent_id": parent["id"] })),
            )
            .await;

        let uri = format!("/categories/{}", parent["id"].as_str().unwrap());
        let (status, json) = app
            .send(
                "PUT",
                &uri,
                app.as_admin(),
                Some(json!({ "name": "Parent", "parent_id": child["id"] })),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{json}");

        let (_, parent) = app.send("GET", &uri, None, None).await;
        assert!(parent["parent_id"].is_null());
        assert_eq!(parent["level"], 0);
    }
}

mod products {
    use super::*;

    #[tokio::test]
    async fn update_filter_and_delete() {
        let app = setup();
        let id = app.product("SKU-A", 1299, 4).await;
        app.product("SKU-B", 500, 1).await;

        let uri = format!("/products/{id}");
        let (status, updated) = app
            .send(
                "PUT",
                &uri,
                app.as_admin(),
                Some(json!({
                    "name": "Renamed gadget",
                    "description": null,
                    "price": 1499,
                    "stock": 10
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["price"], 1499);
        assert_eq!(updated["stock"], 10);
        assert_eq!(updated["description"], "test product");

        let (status, found) = app
            .send("GET", "/products?search=renamed", None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found.as_array().unwrap().len(), 1);

        let (status, _) = app.send("DELETE", &uri, app.as_admin(), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app.send("GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_sku_conflicts() {
        let app = setup();
        app.product("SKU-DUP", 100, 1).await;
        let (status, _) = app
            .send(
                "POST",
                "/products",
                app.as_admin(),
                Some(json!({
                    "name": "Twin",
                    "description": null,
                    "price": 100,
                    "sku": "SKU-DUP",
                    "stock": 1,
                    "category_ids": []
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}

mod orders {
    use super::*;

    #[tokio::test]
    async fn place_order_totals_lines_and_decrements_stock() {
        let app = setup();
        let customer = app.customer("ada@example.com").await;
        let widget = app.product("W-1", 1000, 5).await;
        let gadget = app.product("G-1", 1500, 2).await;

        let (status, order) = app
            .send(
                "POST",
                "/orders",
                Some((customer, Role::User)),
                Some(json!({
                    "items": [
                        { "product_id": widget, "quantity": 2 },
                        { "product_id": gadget, "quantity": 1 }
                    ]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{order}");
        assert_eq!(order["total"], 3500);
        assert_eq!(order["status"], "PENDING");
        assert_eq!(order["items"].as_array().unwrap().len(), 2);

        let (_, product) = app
            .send("GET", &format!("/products/{widget}"), None, None)
            .await;
        assert_eq!(product["stock"], 3);

        assert!(
            app.dispatcher
                .wait_for_attempts(2, Duration::from_secs(1))
                .await
        );

        let (status, mine) = app
            .send("GET", "/orders", Some((customer, Role::User)), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mine.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn first_time_caller_can_place_an_order() {
        let app = setup();
        let newcomer = UserId::new();
        let widget = app.product("N-1", 1200, 3).await;

        let (status, order) = app
            .send(
                "POST",
                "/orders",
                Some((newcomer, Role::User)),
                Some(json!({ "items": [{ "product_id": widget, "quantity": 1 }] })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{order}");
        assert_eq!(order["customer_id"], newcomer.to_string());
        assert_eq!(order["total"], 1200);

        let (status, me) = app
            .send("GET", "/users/me", Some((newcomer, Role::User)), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], format!("{newcomer}@example.com"));
        assert_eq!(me["role"], "USER");
        assert!(me["last_login_at"].is_string());
    }

    #[tokio::test]
    async fn unknown_caller_without_email_is_unauthorized() {
        let app = setup();
        let request = Request::builder()
            .method("GET")
            .uri("/orders")
            .header(USER_ID_HEADER, UserId::new().to_string())
            .body(Body::empty())
            .unwrap();

        let response = app.app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn insufficient_stock_conflicts_and_changes_nothing() {
        let app = setup();
        let customer = app.customer("grace@example.com").await;
        let plenty = app.product("P-1", 100, 50).await;
        let scarce = app.product("S-1", 100, 1).await;

        let (status, json) = app
            .send(
                "POST",
                "/orders",
                Some((customer, Role::User)),
                Some(json!({
                    "items": [
                        { "product_id": plenty, "quantity": 10 },
                        { "product_id": scarce, "quantity": 2 }
                    ]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(json["error"].as_str().unwrap().contains("Insufficient stock"));

        let (_, product) = app
            .send("GET", &format!("/products/{plenty}"), None, None)
            .await;
        assert_eq!(product["stock"], 50);
        let orders = app
            .state
            .orders
            .list_orders_for_user(&Identity::customer(customer))
            .await
            .unwrap();
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn empty_order_is_bad_request() {
        let app = setup();
        let customer = app.customer("empty@example.com").await;
        let (status, _) = app
            .send(
                "POST",
                "/orders",
                Some((customer, Role::User)),
                Some(json!({ "items": [] })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn other_customers_order_is_forbidden() {
        let app = setup();
        let owner = app.customer("owner@example.com").await;
        let stranger = app.customer("stranger@example.com").await;
        let product = app.product("O-1", 100, 5).await;

        let (_, order) = app
            .send(
                "POST",
                "/orders",
                Some((owner, Role::User)),
                Some(json!({ "items": [{ "product_id": product, "quantity": 1 }] })),
            )
            .await;
        let uri = format!("/orders/{}", order["id"].as_str().unwrap());

        let (status, _) = app
            .send("GET", &uri, Some((stranger, Role::User)), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app.send("GET", &uri, app.as_admin(), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, seen) = app.send("GET", &uri, Some((owner, Role::User)), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(seen["customer"]["email"], "owner@example.com");
    }
}

mod users {
    use super::*;

    #[tokio::test]
    async fn profile_round_trip() {
        let app = setup();
        let customer = app.customer("profile@example.com").await;

        let (status, json) = app
            .send(
                "PUT",
                "/users/me",
                Some((customer, Role::User)),
                Some(json!({ "country": "FR" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["country"], "FR");
        assert_eq!(json["phone_number"], "+15550100");
        assert!(json.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn password_reset_flow() {
        let app = setup();
        app.customer("reset@example.com").await;

        let (status, _) = app
            .send(
                "POST",
                "/password-reset",
                None,
                Some(json!({ "email": "reset@example.com" })),
            )
            .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(
            app.dispatcher
                .wait_for_attempts(1, Duration::from_secs(1))
                .await
        );

        let token = app
            .dispatcher
            .sent()
            .into_iter()
            .find_map(|message| match message {
                SentMessage::PasswordReset { token, .. } => Some(token),
                _ => None,
            })
            .unwrap();

        let confirm = json!({
            "token": token,
            "new_password": "correct horse battery",
            "confirm_password": "correct horse battery"
        });
        let (status, json) = app
            .send("POST", "/password-reset/confirm", None, Some(confirm.clone()))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "reset");

        // Tokens are single use.
        let (status, _) = app
            .send("POST", "/password-reset/confirm", None, Some(confirm))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn mismatched_confirmation_is_rejected() {
        let app = setup();
        let (status, json) = app
            .send(
                "POST",
                "/password-reset/confirm",
                None,
                Some(json!({
                    "token": "whatever",
                    "new_password": "one-password",
                    "confirm_password": "another-password"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }
}
