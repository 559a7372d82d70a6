use anyhow::{Context, Result};
use axum::{extract::State, response::IntoResponse};
use diesel::QueryDsl;
use diesel_async::RunQueryDsl;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    analytics::{AdminStats, CatalogCounts, compute_admin_stats},
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware,
    models::OrderEntity,
    schema::{categories, menu_items, orders, users},
    storefront::OrderRecord,
};

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/admin",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_admin_stats))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                middleware::admins_authorization,
            )),
    )
}

/// Dashboard figures over the whole order history.
#[utoipa::path(
    get,
    path = "/admin-stats",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Dashboard figures", body = StdResponse<AdminStats, String>)
    )
)]
async fn get_admin_stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let counts = CatalogCounts {
        users: users::table
            .count()
            .get_result(conn)
            .await
            .context("Failed to count users")?,
        menu_items: menu_items::table
            .count()
            .get_result(conn)
            .await
            .context("Failed to count menu items")?,
        categories: categories::table
            .count()
            .get_result(conn)
            .await
            .context("Failed to count categories")?,
    };

    let orders: Vec<OrderEntity> = orders::table
        .get_results(conn)
        .await
        .context("Failed to get orders")?;
    let orders = orders
        .into_iter()
        .map(OrderRecord::try_from)
        .collect::<Result<Vec<_>>>()?;

    Ok(StdResponse {
        data: Some(compute_admin_stats(&orders, counts)),
        message: Some("Get admin stats successfully"),
    })
}
