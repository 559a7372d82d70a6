use anyhow::Result;
use axum::Router;
use bistro_storefront::{bootstrap, config, db, routes, swagger};
use diesel_migrations::{EmbeddedMigrations, embed_migrations};

/// Migrations embedded into the binary so images ship without the SQL files
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    bootstrap::init_env();

    let config = config::load()?;

    tracing::info!("Running migrations...");
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    tracing::info!("Bootstrapping...");
    let state = bootstrap::init_state(config.clone()).await?;
    let routes = routes::routes_with_openapi(state.clone());

    let mut openapi = routes.get_openapi().clone();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("Bistro Storefront API")
        .version("1.0.0")
        .build();
    let swagger_ui = swagger::create_swagger_ui(openapi)?;

    let app: Router = Router::new()
        .merge(routes)
        .merge(swagger_ui)
        .with_state(state);

    bootstrap::serve("StorefrontService", app, &config).await
}
