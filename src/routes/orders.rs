use std::collections::BTreeSet;

use anyhow::{Context, Result};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    identity::Identity,
    middleware,
    models::{CartItemEntity, CreateOrderEntity, OrderEntity},
    routes::users::find_role,
    schema::{cart_items, orders},
    storefront::{
        CartLineItem, OrderRecord, OrderStatus,
        checkout::{CreateOrderRequest, PAYMENT_METHOD, validate},
        pricing::PriceBreakdown,
    },
};

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    let customer_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_order))
        .routes(utoipa_axum::routes!(get_user_orders))
        .routes(utoipa_axum::routes!(cancel_order))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::customers_authorization,
        ));

    let admin_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_orders))
        .routes(utoipa_axum::routes!(update_order_status, delete_order))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::admins_authorization,
        ));

    utoipa_axum::router::OpenApiRouter::new()
        .nest("/orders", customer_routes.merge(admin_routes))
}

/// Drops repeated ids so a line listed twice is still one line.
fn unique_ids(ids: &[Uuid]) -> Vec<Uuid> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

fn to_records(orders: Vec<OrderEntity>) -> Result<Vec<OrderRecord>> {
    orders.into_iter().map(OrderRecord::try_from).collect()
}

/// Place an order for some of the caller's cart lines. The lines are priced
/// again from the cart store; a total that disagrees with the one the customer
/// saw is rejected. Ordered lines leave the cart.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Created order successfully", body = StdResponse<OrderRecord, String>),
        (status = 422, description = "Invalid shipping details", body = StdResponse<std::collections::BTreeMap<String, String>, String>)
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let errors = validate(&body.customer);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    if body.cart_item_ids.is_empty() {
        return Err(AppError::BadRequest(
            "Select at least one item to check out".into(),
        ));
    }

    let cart_item_ids = unique_ids(&body.cart_item_ids);

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let lines: Vec<CartItemEntity> = cart_items::table
                    .filter(cart_items::id.eq_any(&cart_item_ids))
                    .filter(cart_items::owner_email.eq(&identity.email))
                    .get_results(conn)
                    .await
                    .context("Failed to get cart items")?;

                if lines.len() != cart_item_ids.len() {
                    return Err(AppError::BadRequest(
                        "Some items are no longer in your cart".into(),
                    ));
                }

                let items: Vec<CartLineItem> =
                    lines.into_iter().map(CartLineItem::from).collect();
                let subtotal: f64 = items.iter().map(CartLineItem::line_total).sum();
                let price = PriceBreakdown::from_subtotal(subtotal);
                if !price.matches_total(body.total) {
                    return Err(AppError::BadRequest(
                        "Cart changed, please review your order".into(),
                    ));
                }

                let customer = &body.customer;
                let order: OrderEntity = diesel::insert_into(orders::table)
                    .values(CreateOrderEntity {
                        customer_name: customer.name.trim().to_string(),
                        customer_email: customer.email.trim().to_lowercase(),
                        customer_phone: customer.phone_number.clone(),
                        customer_address: customer.address(),
                        items: serde_json::to_value(&items)
                            .context("Failed to serialize order items")?,
                        subtotal: price.subtotal,
                        shipping: price.shipping,
                        tax: price.tax,
                        total: price.total,
                        payment_method: PAYMENT_METHOD.into(),
                        status: OrderStatus::Pending.as_str().into(),
                    })
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to create order")?;

                diesel::delete(
                    cart_items::table.filter(cart_items::id.eq_any(&cart_item_ids)),
                )
                .execute(conn)
                .await
                .context("Failed to clear ordered cart items")?;

                Ok::<OrderEntity, AppError>(order)
            })
        })
        .await?;

    info!("Order {} placed ({:.2})", order.id, order.total);

    Ok(StdResponse {
        data: Some(OrderRecord::try_from(order)?),
        message: Some("Create order successfully"),
    })
}

/// Order history of one customer, newest first. Customers may only read their
/// own history; admins may read anyone's.
#[utoipa::path(
    get,
    path = "/user/{email}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("email" = String, Path, description = "Customer email")
    ),
    responses(
        (status = 200, description = "List orders of a customer", body = StdResponse<Vec<OrderRecord>, String>)
    )
)]
async fn get_user_orders(
    Path(email): Path<String>,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, AppError> {
    if !identity.owns(&email) {
        let role = find_role(&state, &identity.email).await?;
        if !role.is_admin() {
            return Err(AppError::ForbiddenResource(
                "Cannot read another customer's orders".into(),
            ));
        }
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let orders: Vec<OrderEntity> = orders::table
        .filter(orders::customer_email.eq(email.to_lowercase()))
        .order_by(orders::order_date.desc())
        .get_results(conn)
        .await
        .context("Failed to get customer orders")?;

    Ok(StdResponse {
        data: Some(to_records(orders)?),
        message: Some("Get orders successfully"),
    })
}

/// Customers may cancel their own orders until they leave `pending`.
fn ensure_cancellable(identity: &Identity, order: &OrderEntity) -> Result<(), AppError> {
    if !identity.owns(&order.customer_email) {
        return Err(AppError::ForbiddenResource(
            "Cannot cancel another customer's order".into(),
        ));
    }
    if order.status != OrderStatus::Pending.as_str() {
        return Err(AppError::BadRequest(
            "Only pending orders can be canceled".into(),
        ));
    }
    Ok(())
}

/// Cancel one of the caller's pending orders.
#[utoipa::path(
    patch,
    path = "/cancel/{id}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Order ID to cancel")
    ),
    responses(
        (status = 200, description = "Canceled order successfully", body = StdResponse<OrderRecord, String>),
        (status = 400, description = "Order is no longer pending"),
        (status = 403, description = "Order belongs to another customer")
    )
)]
async fn cancel_order(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let order: OrderEntity = orders::table
                    .find(id)
                    .for_update()
                    .get_result(conn)
                    .await?;
                ensure_cancellable(&identity, &order)?;

                let order: OrderEntity = diesel::update(orders::table.find(order.id))
                    .set((
                        orders::status.eq(OrderStatus::Canceled.as_str()),
                        orders::updated_at.eq(diesel::dsl::now),
                    ))
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to cancel order")?;

                Ok::<OrderEntity, AppError>(order)
            })
        })
        .await?;

    info!("Order {} canceled by {}", order.id, order.customer_email);

    Ok(StdResponse {
        data: Some(OrderRecord::try_from(order)?),
        message: Some("Canceled order successfully"),
    })
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct OrdersQuery {
    /// Only orders with this status.
    status: Option<OrderStatus>,
    /// Case-insensitive match on order id, customer name, email or phone.
    search: Option<String>,
}

pub fn order_matches(order: &OrderRecord, search: &str) -> bool {
    let search = search.trim().to_lowercase();
    if search.is_empty() {
        return true;
    }

    [
        order.id.to_string(),
        order.customer.name.to_lowercase(),
        order.customer.email.to_lowercase(),
        order.customer.phone_number.to_lowercase(),
    ]
    .iter()
    .any(|field| field.contains(&search))
}

/// Fetch all orders, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(OrdersQuery),
    responses(
        (status = 200, description = "List all orders", body = StdResponse<Vec<OrderRecord>, String>)
    )
)]
async fn get_orders(
    Query(query): Query<OrdersQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut statement = orders::table.order_by(orders::order_date.desc()).into_boxed();
    if let Some(status) = query.status {
        statement = statement.filter(orders::status.eq(status.as_str()));
    }

    let orders: Vec<OrderEntity> = statement
        .get_results(conn)
        .await
        .context("Failed to get orders")?;

    let mut orders = to_records(orders)?;
    if let Some(search) = &query.search {
        orders.retain(|order| order_matches(order, search));
    }

    Ok(StdResponse {
        data: Some(orders),
        message: Some("Get orders successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateOrderStatusReq {
    status: OrderStatus,
}

/// Move an order to another status.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Order ID to update")
    ),
    request_body = UpdateOrderStatusReq,
    responses(
        (status = 200, description = "Updated order status successfully", body = StdResponse<OrderRecord, String>)
    )
)]
async fn update_order_status(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<UpdateOrderStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order: OrderEntity = diesel::update(orders::table.find(id))
        .set((
            orders::status.eq(body.status.as_str()),
            orders::updated_at.eq(diesel::dsl::now),
        ))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await?;

    info!("Order {} is now {}", order.id, body.status);

    Ok(StdResponse {
        data: Some(OrderRecord::try_from(order)?),
        message: Some("Updated order status successfully"),
    })
}

/// Delete an order for good.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Order ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted order successfully", body = StdResponse<OrderRecord, String>)
    )
)]
async fn delete_order(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order: OrderEntity = diesel::delete(orders::table.find(id))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await?;

    info!("Order {} deleted", order.id);

    Ok(StdResponse {
        data: Some(OrderRecord::try_from(order)?),
        message: Some("Deleted order successfully"),
    })
}
