use anyhow::{Context, Result};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use diesel::{
    ExpressionMethods, QueryDsl, SelectableHelper,
    result::DatabaseErrorKind,
    upsert::excluded,
};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    aliases::DieselError,
    app_error::{AppError, StdResponse},
    app_state::AppState,
    identity::Identity,
    middleware,
    models::{CartItemEntity, CreateCartItemEntity, MenuItemEntity},
    schema::{cart_items, menu_items},
    storefront::CartLineItem,
};

/// Cart routes; every one of them acts on the caller's own cart.
pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/carts",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_cart, add_to_cart))
            .routes(utoipa_axum::routes!(update_cart_item, delete_cart_item))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                middleware::customers_authorization,
            )),
    )
}

/// Most of one item a single cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 99;

fn check_quantity(quantity: i32) -> Result<(), AppError> {
    if quantity < 1 {
        return Err(AppError::BadRequest("Quantity must be at least 1".into()));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(AppError::BadRequest(format!(
            "Quantity cannot exceed {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(())
}

/// The table's CHECK keeps a merged line within bounds.
fn quantity_write_error(err: DieselError) -> AppError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, _) => AppError::BadRequest(
            format!("A cart line holds at most {MAX_LINE_QUANTITY} of an item"),
        ),
        err => err.into(),
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct CartQuery {
    email: String,
}

/// List the cart lines of the signed-in customer.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Carts"],
    security(("bearerAuth" = [])),
    params(CartQuery),
    responses(
        (status = 200, description = "List cart lines", body = StdResponse<Vec<CartLineItem>, String>)
    )
)]
async fn get_cart(
    Query(query): Query<CartQuery>,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, AppError> {
    if !identity.owns(&query.email) {
        return Err(AppError::ForbiddenResource(
            "Cannot read another customer's cart".into(),
        ));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let lines: Vec<CartItemEntity> = cart_items::table
        .filter(cart_items::owner_email.eq(&identity.email))
        .order_by(cart_items::created_at.asc())
        .get_results(conn)
        .await
        .context("Failed to get cart items")?;

    let lines: Vec<CartLineItem> = lines.into_iter().map(CartLineItem::from).collect();

    Ok(StdResponse {
        data: Some(lines),
        message: Some("Get cart successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct AddToCartReq {
    menu_item_id: Uuid,
    #[serde(default = "one")]
    quantity: i32,
}

fn one() -> i32 {
    1
}

/// Add a menu item to the cart. Adding an item already in the cart raises
/// that line's quantity instead of creating a second line.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Carts"],
    security(("bearerAuth" = [])),
    request_body = AddToCartReq,
    responses(
        (status = 200, description = "Added to cart successfully", body = StdResponse<CartLineItem, String>)
    )
)]
async fn add_to_cart(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<AddToCartReq>,
) -> Result<impl IntoResponse, AppError> {
    check_quantity(body.quantity)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let menu_item: MenuItemEntity = menu_items::table
        .find(body.menu_item_id)
        .get_result(conn)
        .await?;

    // One statement, so concurrent adds of the same item both land on the line.
    let line: CartItemEntity = diesel::insert_into(cart_items::table)
        .values(CreateCartItemEntity {
            menu_item_id: menu_item.id,
            owner_email: identity.email.clone(),
            name: menu_item.name,
            image: menu_item.image,
            price: menu_item.price,
            quantity: body.quantity,
            category: menu_item.category,
        })
        .on_conflict((cart_items::owner_email, cart_items::menu_item_id))
        .do_update()
        .set((
            cart_items::quantity.eq(cart_items::quantity + excluded(cart_items::quantity)),
            cart_items::updated_at.eq(diesel::dsl::now),
        ))
        .returning(CartItemEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(quantity_write_error)?;

    Ok(StdResponse {
        data: Some(CartLineItem::from(line)),
        message: Some("Added to cart successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateCartItemReq {
    quantity: i32,
}

/// Set the quantity of one of the caller's cart lines.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Carts"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Cart line ID to update")
    ),
    request_body = UpdateCartItemReq,
    responses(
        (status = 200, description = "Updated cart line successfully", body = StdResponse<CartLineItem, String>)
    )
)]
async fn update_cart_item(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<UpdateCartItemReq>,
) -> Result<impl IntoResponse, AppError> {
    check_quantity(body.quantity)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let line: CartItemEntity = diesel::update(
        cart_items::table
            .find(id)
            .filter(cart_items::owner_email.eq(&identity.email)),
    )
    .set((
        cart_items::quantity.eq(body.quantity),
        cart_items::updated_at.eq(diesel::dsl::now),
    ))
    .returning(CartItemEntity::as_returning())
    .get_result(conn)
    .await
    .map_err(quantity_write_error)?;

    Ok(StdResponse {
        data: Some(CartLineItem::from(line)),
        message: Some("Updated cart line successfully"),
    })
}

/// Remove one of the caller's cart lines.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Carts"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Cart line ID to remove")
    ),
    responses(
        (status = 200, description = "Removed cart line successfully", body = StdResponse<CartLineItem, String>)
    )
)]
async fn delete_cart_item(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let line: CartItemEntity = diesel::delete(
        cart_items::table
            .find(id)
            .filter(cart_items::owner_email.eq(&identity.email)),
    )
    .returning(CartItemEntity::as_returning())
    .get_result(conn)
    .await?;

    Ok(StdResponse {
        data: Some(CartLineItem::from(line)),
        message: Some("Removed cart line successfully"),
    })
}
