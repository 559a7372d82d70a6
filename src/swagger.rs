use anyhow::Result;
use axum::Router;
use utoipa::openapi::{
    OpenApi,
    security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::app_state::AppState;

/// Swagger UI at `/swagger-ui`, OpenAPI document at `/api-docs/openapi.json`.
pub fn create_swagger_ui(mut openapi: OpenApi) -> Result<Router<AppState>> {
    let components = openapi.components.get_or_insert_with(Default::default);
    components.add_security_scheme(
        "bearerAuth",
        SecurityScheme::Http(
            HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("JWT")
                .build(),
        ),
    );

    Ok(Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi)))
}
