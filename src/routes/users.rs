use std::collections::HashMap;

use anyhow::{Context, Result};
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    identity::Identity,
    middleware,
    models::{CreateUserEntity, UserEntity},
    schema::{orders, users},
    storefront::role_guard::Role,
};

// `{user}` is an email on GET routes and an id on the admin mutations; the
// router needs one parameter name per path.
pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    let public_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_user))
        .routes(utoipa_axum::routes!(get_user));

    let customer_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(check_admin))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::customers_authorization,
        ));

    let admin_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_users))
        .routes(utoipa_axum::routes!(make_admin))
        .routes(utoipa_axum::routes!(delete_user))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::admins_authorization,
        ));

    utoipa_axum::router::OpenApiRouter::new().nest(
        "/users",
        public_routes.merge(customer_routes).merge(admin_routes),
    )
}

/// Role of the user registered under `email`. Unknown users are customers.
pub async fn find_role(state: &AppState, email: &str) -> Result<Role> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let role: Option<String> = users::table
        .filter(users::email.eq(email.to_lowercase()))
        .select(users::role)
        .get_result(conn)
        .await
        .optional()
        .context("Failed to look up user role")?;

    Ok(Role::from_admin_flag(
        role.as_deref() == Some(Role::Admin.as_str()),
    ))
}

#[derive(Serialize, ToSchema)]
pub struct UserSummary {
    #[serde(flatten)]
    user: UserEntity,
    orders_placed: i64,
}

/// Joins each user with the number of orders placed under their email.
fn with_order_counts(users: Vec<UserEntity>, counts: &HashMap<String, i64>) -> Vec<UserSummary> {
    users
        .into_iter()
        .map(|user| UserSummary {
            orders_placed: counts
                .get(&user.email.to_lowercase())
                .copied()
                .unwrap_or(0),
            user,
        })
        .collect()
}

/// List every registered user with their order count.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Users"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List users", body = StdResponse<Vec<UserSummary>, String>)
    )
)]
async fn get_users(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let users: Vec<UserEntity> = users::table
        .order_by(users::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get users")?;

    let counts: Vec<(String, i64)> = orders::table
        .group_by(orders::customer_email)
        .select((orders::customer_email, diesel::dsl::count_star()))
        .get_results(conn)
        .await
        .context("Failed to count orders per customer")?;

    let mut by_email = HashMap::new();
    for (email, count) in counts {
        *by_email.entry(email.to_lowercase()).or_insert(0) += count;
    }

    Ok(StdResponse {
        data: Some(with_order_counts(users, &by_email)),
        message: Some("Get users successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct CreateUserReq {
    name: String,
    email: String,
    #[serde(default)]
    image: String,
}

#[derive(Serialize, ToSchema)]
struct CreateUserRes {
    inserted_id: Option<Uuid>,
}

/// Register a user after sign-up. Registering a known email is a no-op.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Users"],
    request_body = CreateUserReq,
    responses(
        (status = 200, description = "User registered or already known", body = StdResponse<CreateUserRes, String>)
    )
)]
async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserReq>,
) -> Result<impl IntoResponse, AppError> {
    let email = body.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::BadRequest("Email is required".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let inserted: Option<UserEntity> = diesel::insert_into(users::table)
        .values(CreateUserEntity {
            name: body.name.trim().to_string(),
            email,
            image: body.image,
            role: Role::Customer.as_str().into(),
        })
        .on_conflict(users::email)
        .do_nothing()
        .returning(UserEntity::as_returning())
        .get_result(conn)
        .await
        .optional()
        .context("Failed to create user")?;

    let message = match &inserted {
        Some(user) => {
            info!("Registered user {}", user.email);
            "Created user successfully"
        }
        None => "User already exists",
    };

    Ok(StdResponse {
        data: Some(CreateUserRes {
            inserted_id: inserted.map(|user| user.id),
        }),
        message: Some(message),
    })
}

/// Look a user up by email.
#[utoipa::path(
    get,
    path = "/{user}",
    tags = ["Users"],
    params(
        ("user" = String, Path, description = "User email")
    ),
    responses(
        (status = 200, description = "Get user", body = StdResponse<UserEntity, String>),
        (status = 404, description = "No such user")
    )
)]
async fn get_user(
    Path(email): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let user: UserEntity = users::table
        .filter(users::email.eq(email.trim().to_lowercase()))
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(user),
        message: Some("Get user successfully"),
    })
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AdminFlag {
    pub admin: bool,
}

/// Whether the signed-in user is an admin. Callers may only ask about
/// themselves.
#[utoipa::path(
    get,
    path = "/admin/{user}",
    tags = ["Users"],
    security(("bearerAuth" = [])),
    params(
        ("user" = String, Path, description = "Email of the signed-in user")
    ),
    responses(
        (status = 200, description = "Admin flag", body = StdResponse<AdminFlag, String>)
    )
)]
async fn check_admin(
    Path(email): Path<String>,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, AppError> {
    if !identity.owns(&email) {
        return Err(AppError::ForbiddenResource(
            "Cannot read another user's role".into(),
        ));
    }

    let role = find_role(&state, &identity.email).await?;

    Ok(StdResponse {
        data: Some(AdminFlag {
            admin: role.is_admin(),
        }),
        message: Some("Get admin flag successfully"),
    })
}

/// Promote a user to admin.
#[utoipa::path(
    patch,
    path = "/admin/{user}",
    tags = ["Users"],
    security(("bearerAuth" = [])),
    params(
        ("user" = Uuid, Path, description = "User ID to promote")
    ),
    responses(
        (status = 200, description = "Promoted user successfully", body = StdResponse<UserEntity, String>)
    )
)]
async fn make_admin(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let user: UserEntity = diesel::update(users::table.find(id))
        .set(users::role.eq(Role::Admin.as_str()))
        .returning(UserEntity::as_returning())
        .get_result(conn)
        .await?;

    info!("{} is now an admin", user.email);

    Ok(StdResponse {
        data: Some(user),
        message: Some("Promoted user successfully"),
    })
}

/// Delete a user.
#[utoipa::path(
    delete,
    path = "/{user}",
    tags = ["Users"],
    security(("bearerAuth" = [])),
    params(
        ("user" = Uuid, Path, description = "User ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted user successfully", body = StdResponse<UserEntity, String>)
    )
)]
async fn delete_user(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let user: UserEntity = diesel::delete(users::table.find(id))
        .returning(UserEntity::as_returning())
        .get_result(conn)
        .await?;

    info!("Deleted user {}", user.email);

    Ok(StdResponse {
        data: Some(user),
        message: Some("Deleted user successfully"),
    })
}
