use utoipa_axum::router::OpenApiRouter;

use crate::app_state::AppState;

pub mod admin;
pub mod carts;
pub mod categories;
pub mod menu;
pub mod orders;
pub mod reviews;
pub mod uploads;
pub mod users;

/// Every REST route of the service, documented.
pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(users::routes_with_openapi(state.clone()))
        .merge(categories::routes_with_openapi(state.clone()))
        .merge(menu::routes_with_openapi(state.clone()))
        .merge(reviews::routes_with_openapi(state.clone()))
        .merge(carts::routes_with_openapi(state.clone()))
        .merge(orders::routes_with_openapi(state.clone()))
        .merge(uploads::routes_with_openapi(state.clone()))
        .merge(admin::routes_with_openapi(state))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{
        aliases::{DbConnectionManager, DbPool},
        config::{Config, DatabaseConfig, IdentityConfig, ImageHostConfig, ServerConfig},
        identity::testing::StaticIdentityProvider,
    };

    const NADIA: &str = "nadia-token";

    // Nothing listens on the database port, so any handler reaching the pool
    // fails after a short timeout.
    fn state() -> AppState {
        let config = Config {
            server: ServerConfig {
                port: 0,
                cors_allowed_origin: None,
            },
            database: DatabaseConfig {
                url: "postgres://bistro@127.0.0.1:1/bistro".into(),
                max_connections: 1,
            },
            identity: IdentityConfig {
                userinfo_url: "http://127.0.0.1:1/userinfo".into(),
            },
            image_host: ImageHostConfig {
                upload_url: "http://127.0.0.1:1/upload".into(),
                api_key: None,
            },
        };

        AppState {
            db_pool: DbPool::builder()
                .connection_timeout(Duration::from_millis(200))
                .build_unchecked(DbConnectionManager::new(&config.database.url)),
            http_client: reqwest::Client::new(),
            identity: Arc::new(
                StaticIdentityProvider::default().with(NADIA, "nadia@bistro.test"),
            ),
            config: Arc::new(config),
        }
    }

    fn app() -> Router {
        let state = state();
        Router::new()
            .merge(routes_with_openapi(state.clone()))
            .with_state(state)
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn status_of(req: Request<Body>) -> StatusCode {
        app().oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn cart_requires_a_token() {
        let status = status_of(request("GET", "/carts?email=nadia@bistro.test", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_token_is_unauthorized() {
        let req = request("GET", "/carts?email=nadia@bistro.test", Some("forged"), None);
        assert_eq!(status_of(req).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn another_customers_cart_is_forbidden() {
        let req = request("GET", "/carts?email=karim@bistro.test", Some(NADIA), None);
        assert_eq!(status_of(req).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_flag_of_someone_else_is_forbidden() {
        let req = request("GET", "/users/admin/karim@bistro.test", Some(NADIA), None);
        assert_eq!(status_of(req).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_routes_fail_closed_when_role_lookup_fails() {
        let req = request("GET", "/admin/admin-stats", Some(NADIA), None);
        assert_eq!(status_of(req).await, StatusCode::FORBIDDEN);

        let uri = "/menu/6f1c1c1e-8c3b-4a6e-9d1e-2f7f0b9a1c11";
        let req = request("DELETE", uri, Some(NADIA), None);
        assert_eq!(status_of(req).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn invalid_checkout_form_is_rejected_before_the_store() {
        let body = r#"{
            "customer": {
                "name": "",
                "email": "nadia@bistro.test",
                "phone_number": "01712345678",
                "division": "Dhaka",
                "house_address": "House 12"
            },
            "cart_item_ids": ["6f1c1c1e-8c3b-4a6e-9d1e-2f7f0b9a1c11"],
            "total": 10.0
        }"#;
        let response = app()
            .oneshot(request("POST", "/orders", Some(NADIA), Some(body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["data"]["name"], "Name is required");
    }

    #[tokio::test]
    async fn openapi_documents_every_area() {
        let openapi = routes_with_openapi(state()).get_openapi().clone();
        for path in [
            "/carts/{id}",
            "/orders/{id}",
            "/orders/user/{email}",
            "/users/admin/{user}",
            "/menu/{id}",
            "/categories/{id}",
            "/uploads/images",
            "/admin/admin-stats",
        ] {
            assert!(openapi.paths.paths.contains_key(path), "{path} missing");
        }
    }
}
