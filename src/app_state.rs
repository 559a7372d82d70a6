use std::sync::Arc;

use reqwest::Client;

use crate::{aliases::DbPool, config::Config, identity::IdentityProvider};

/// Shared handles every handler and middleware can reach.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub http_client: Client,
    pub identity: Arc<dyn IdentityProvider>,
    pub config: Arc<Config>,
}
