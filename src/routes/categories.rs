use anyhow::Context;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper, result::DatabaseErrorKind};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    aliases::DieselError,
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware,
    models::{CategoryEntity, CreateCategoryEntity, UpdateCategoryEntity},
    schema::categories,
    storefront::checkout::FieldErrors,
};

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    let public_routes = OpenApiRouter::new().routes(utoipa_axum::routes!(get_categories));

    let admin_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_category))
        .routes(utoipa_axum::routes!(update_category, delete_category))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::admins_authorization,
        ));

    utoipa_axum::router::OpenApiRouter::new()
        .nest("/categories", public_routes.merge(admin_routes))
}

#[derive(Deserialize, ToSchema)]
struct CategoryReq {
    name: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl CategoryReq {
    fn validate(&self, image_required: bool) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        if self.name.trim().is_empty() {
            errors.insert("name".into(), "Category name is required".into());
        }
        if image_required && non_blank(self.image.clone()).is_none() {
            errors.insert("image".into(), "Category image is required".into());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

/// Category names are unique.
fn category_write_error(err: DieselError) -> AppError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            AppError::BadRequest("Category already exists".into())
        }
        err => err.into(),
    }
}

/// Fetch all categories by name.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Categories"],
    responses(
        (status = 200, description = "List categories", body = StdResponse<Vec<CategoryEntity>, String>)
    )
)]
async fn get_categories(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let categories: Vec<CategoryEntity> = categories::table
        .order_by(categories::name.asc())
        .get_results(conn)
        .await
        .context("Failed to get categories")?;

    Ok(StdResponse {
        data: Some(categories),
        message: Some("Get categories successfully"),
    })
}

#[utoipa::path(
    post,
    path = "/",
    tags = ["Categories"],
    security(("bearerAuth" = [])),
    request_body = CategoryReq,
    responses(
        (status = 200, description = "Created category successfully", body = StdResponse<CategoryEntity, String>)
    )
)]
async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<CategoryReq>,
) -> Result<impl IntoResponse, AppError> {
    body.validate(true)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category: CategoryEntity = diesel::insert_into(categories::table)
        .values(CreateCategoryEntity {
            name: body.name.trim().to_string(),
            image: non_blank(body.image).unwrap_or_default(),
            description: non_blank(body.description).unwrap_or_default(),
        })
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(category_write_error)?;

    info!("Created category {}", category.name);

    Ok(StdResponse {
        data: Some(category),
        message: Some("Created category successfully"),
    })
}

/// Rename or re-describe a category. A missing image keeps the current one.
#[utoipa::path(
    put,
    path = "/{id}",
    tags = ["Categories"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Category ID to update")
    ),
    request_body = CategoryReq,
    responses(
        (status = 200, description = "Updated category successfully", body = StdResponse<CategoryEntity, String>)
    )
)]
async fn update_category(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<CategoryReq>,
) -> Result<impl IntoResponse, AppError> {
    body.validate(false)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category: CategoryEntity = diesel::update(categories::table.find(id))
        .set((
            UpdateCategoryEntity {
                name: body.name.trim().to_string(),
                image: non_blank(body.image),
                description: body.description.map(|value| value.trim().to_string()),
            },
            categories::updated_at.eq(diesel::dsl::now),
        ))
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(category_write_error)?;

    Ok(StdResponse {
        data: Some(category),
        message: Some("Updated category successfully"),
    })
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Categories"],
    security(("bearerAuth" = [])),
    params(
        ("id" = Uuid, Path, description = "Category ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted category successfully", body = StdResponse<CategoryEntity, String>)
    )
)]
async fn delete_category(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category: CategoryEntity = diesel::delete(categories::table.find(id))
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await?;

    info!("Deleted category {}", category.name);

    Ok(StdResponse {
        data: Some(category),
        message: Some("Deleted category successfully"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(name: &str, image: Option<&str>) -> CategoryReq {
        CategoryReq {
            name: name.into(),
            image: image.map(str::to_string),
            description: None,
        }
    }

    fn field_errors(result: Result<(), AppError>) -> FieldErrors {
        match result {
            Err(AppError::Validation(errors)) => errors,
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn create_requires_name_and_image() {
        let errors = field_errors(req("  ", Some(" ")).validate(true));
        assert_eq!(errors["name"], "Category name is required");
        assert_eq!(errors["image"], "Category image is required");
    }

    #[test]
    fn update_keeps_image_optional() {
        assert!(req("Desserts", None).validate(false).is_ok());
    }

    #[test]
    fn duplicate_category_name_is_a_bad_request() {
        let err = category_write_error(DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new(String::from("duplicate key value violates unique constraint")),
        ));
        match err {
            AppError::BadRequest(message) => assert_eq!(message, "Category already exists"),
            other => panic!("expected a bad request, got {other:?}"),
        }
    }

    #[test]
    fn unknown_category_stays_not_found() {
        assert!(matches!(
            category_write_error(DieselError::NotFound),
            AppError::NotFound
        ));
    }
}
