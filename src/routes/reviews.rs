use anyhow::Context;
use axum::{Json, extract::State, response::IntoResponse};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware,
    models::{CreateReviewEntity, ReviewEntity},
    schema::reviews,
    storefront::checkout::FieldErrors,
};

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    let public_routes = OpenApiRouter::new().routes(utoipa_axum::routes!(get_reviews));

    let customer_routes = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_review))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::customers_authorization,
        ));

    utoipa_axum::router::OpenApiRouter::new()
        .nest("/reviews", public_routes.merge(customer_routes))
}

fn validate(review: &CreateReviewEntity) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if review.name.trim().is_empty() {
        errors.insert("name".into(), "Name is required".into());
    }
    if review.details.trim().is_empty() {
        errors.insert("details".into(), "Review details are required".into());
    }
    if !(1..=5).contains(&review.rating) {
        errors.insert("rating".into(), "Select a rating from 1 to 5".into());
    }
    errors
}

/// Testimonials, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Reviews"],
    responses(
        (status = 200, description = "List reviews", body = StdResponse<Vec<ReviewEntity>, String>)
    )
)]
async fn get_reviews(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let reviews: Vec<ReviewEntity> = reviews::table
        .order_by(reviews::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get reviews")?;

    Ok(StdResponse {
        data: Some(reviews),
        message: Some("Get reviews successfully"),
    })
}

#[utoipa::path(
    post,
    path = "/",
    tags = ["Reviews"],
    security(("bearerAuth" = [])),
    request_body = CreateReviewEntity,
    responses(
        (status = 200, description = "Created review successfully", body = StdResponse<ReviewEntity, String>),
        (status = 422, description = "Missing fields or rating")
    )
)]
async fn create_review(
    State(state): State<AppState>,
    Json(body): Json<CreateReviewEntity>,
) -> Result<impl IntoResponse, AppError> {
    let errors = validate(&body);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let review: ReviewEntity = diesel::insert_into(reviews::table)
        .values(CreateReviewEntity {
            name: body.name.trim().to_string(),
            details: body.details.trim().to_string(),
            rating: body.rating,
        })
        .returning(ReviewEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create review")?;

    Ok(StdResponse {
        data: Some(review),
        message: Some("Created review successfully"),
    })
}
