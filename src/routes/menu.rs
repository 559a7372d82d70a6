use anyhow::Context;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware,
    models::{CreateMenuItemEntity, MenuItemEntity},
    schema::menu_items,
    storefront::checkout::FieldErrors,
};

pub const MIN_RECIPE_LEN: usize = 20;

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    let public_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_menu))
        .routes(utoipa_axum::routes!(get_menu_item));

    let admin_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_menu_item))
        .routes(utoipa_axum::routes!(update_menu_item, delete_menu_item))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::admins_authorization,
        ));

    utoipa_axum::router::OpenApiRouter::new().nest("/menu", public_routes.merge(admin_routes))
}

#[derive(Deserialize, ToSchema)]
struct MenuItemReq {
    name: String,
    category: String,
    price: f64,
    recipe: String,
    #[serde(default)]
    image: String,
}

fn has_at_most_two_decimals(price: f64) -> bool {
    let cents = price * 100.0;
    (cents - cents.round()).abs() < 1e-6
}

impl MenuItemReq {
    fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.name.trim().is_empty() {
            errors.insert("name".into(), "Recipe name is required".into());
        }
        if self.category.trim().is_empty() {
            errors.insert("category".into(), "Category is required".into());
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            errors.insert("price".into(), "Price is required".into());
        } else if !has_at_most_two_decimals(self.price) {
            errors.insert("price".into(), "Invalid price format".into());
        }
        if self.recipe.trim().chars().count() < MIN_RECIPE_LEN {
            errors.insert(
                "recipe".into(),
                format!("Recipe should be at least {MIN_RECIPE_LEN} characters"),
            );
        }
        errors
    }

    fn into_entity(self) -> Result<CreateMenuItemEntity, AppError> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        Ok(CreateMenuItemEntity {
            name: self.name.trim().to_string(),
            recipe: self.recipe.trim().to_string(),
            image: self.image.trim().to_string(),
            category: self.category.trim().to_lowercase(),
            price: self.price,
        })
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct MenuQuery {
    /// Only items of this category.
    category: Option<String>,
}

/// Fetch the menu, optionally narrowed to one category.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Menu"],
    params(MenuQuery),
    responses(
        (status = 200, description = "List menu items", body = StdResponse<Vec<MenuItemEntity>, String>)
    )
)]
async fn get_menu(
    Query(query): Query<MenuQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut statement = menu_items::table
        .order_by(menu_items::created_at.asc())
        .into_boxed();
    if let Some(category) = query.category.filter(|c| !c.trim().is_empty()) {
        statement = statement.filter(menu_items::category.eq(category.trim().to_lowercase()));
    }

    let items: Vec<MenuItemEntity> = statement
        .get_results(conn)
        .await
        .context("Failed to get menu items")?;

    Ok(StdResponse {
        data: Some(items),
        message: Some("Get menu successfully"),
    })
}

#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Menu"],
    params(
        ("id" = Uuid, Path, description = "Menu item ID")
    ),
    responses(
        (status = 200, description = "Get menu item", body = StdResponse<MenuItemEntity, String>),
        (status = 404, description = "No such menu item")
    )
)]
async fn get_menu_item(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item: MenuItemEntity = menu_items::table.find(id).get_result(conn).await?;

    Ok(StdResponse {
        data: Some(item),
        message: Some("Get menu item successfully"),
    })
}

#[utoipa::path(
    post,
    path = "/",
    tags = ["Menu"],
    security(("bearerAuth" = [])),
    request_body = MenuItemReq,
    responses(
        (status = 200, description = "Created menu item successfully", body = StdResponse<MenuItemEntity, String>),
        (status = 422, description = "Invalid menu item")
    )
)]
async fn create_menu_item(
    State(state): State<AppState>,
    Json(body): Json<MenuItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let entity = body.into_entity()?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item: MenuItemEntity = diesel::insert_into(menu_items::table)
        .values(entity)
        .returning(MenuItemEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create menu item")?;

    info!("Added {} to the menu", item.name);

    Ok(StdResponse {
        data: Some(item),
        message: Some("Created menu item successfully"),
    })
}

/// Replace a menu item. Lines already in carts keep the price they were added
/// with.
#[utoipa::path(
    put,
    path = "/{id}",
    tags = ["Menu"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Menu item ID to update")
    ),
    request_body = MenuItemReq,
    responses(
        (status = 200, description = "Updated menu item successfully", body = StdResponse<MenuItemEntity, String>)
    )
)]
async fn update_menu_item(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<MenuItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let entity = body.into_entity()?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item: MenuItemEntity = diesel::update(menu_items::table.find(id))
        .set((entity, menu_items::updated_at.eq(diesel::dsl::now)))
        .returning(MenuItemEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(item),
        message: Some("Updated menu item successfully"),
    })
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Menu"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Menu item ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted menu item successfully", body = StdResponse<MenuItemEntity, String>)
    )
)]
async fn delete_menu_item(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item: MenuItemEntity = diesel::delete(menu_items::table.find(id))
        .returning(MenuItemEntity::as_returning())
        .get_result(conn)
        .await?;

    info!("Removed {} from the menu", item.name);

    Ok(StdResponse {
        data: Some(item),
        message: Some("Deleted menu item successfully"),
    })
}
