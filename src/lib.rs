//! Restaurant storefront: the REST service (carts, orders, catalog, users and
//! admin analytics) together with the client-side storefront core it serves.

pub mod aliases;
pub mod analytics;
pub mod api;
pub mod app_error;
pub mod app_state;
pub mod bootstrap;
pub mod client;
pub mod config;
pub mod db;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod schema;
pub mod storefront;
pub mod swagger;
