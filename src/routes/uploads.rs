use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, header},
    response::IntoResponse,
};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    api::images::upload_image,
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware,
};

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/uploads",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(upload_menu_image))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                middleware::admins_authorization,
            )),
    )
}

#[derive(Serialize, ToSchema)]
struct UploadedImage {
    url: String,
}

/// Name sent to the image host, derived from the request content type.
fn file_name_for(content_type: Option<&str>) -> String {
    let extension = match content_type {
        Some("image/png") => "png",
        Some("image/webp") => "webp",
        Some("image/gif") => "gif",
        _ => "jpg",
    };
    format!("upload.{extension}")
}

/// Forward the raw request body to the image host and return where the image
/// is served from.
#[utoipa::path(
    post,
    path = "/images",
    tags = ["Uploads"],
    security(("bearerAuth" = [])),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Uploaded image successfully", body = StdResponse<UploadedImage, String>),
        (status = 502, description = "Image host unreachable")
    )
)]
async fn upload_menu_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest("Image body is empty".into()));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    let url = upload_image(
        &state.http_client,
        &state.config.image_host,
        file_name_for(content_type),
        body.to_vec(),
    )
    .await?;

    info!("Uploaded image to {url}");

    Ok(StdResponse {
        data: Some(UploadedImage { url }),
        message: Some("Uploaded image successfully"),
    })
}
