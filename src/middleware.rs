use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{
    app_error::AppError,
    app_state::AppState,
    identity::Identity,
    routes::users::find_role,
    storefront::role_guard::GuardState,
};

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
}

// Takes the token by value: the request body is not `Sync`, so the request
// cannot be borrowed across the provider call.
async fn authenticate(state: &AppState, token: Option<String>) -> Result<Identity, AppError> {
    let token = token.ok_or(AppError::Unauthorized)?;
    state
        .identity
        .resolve(&token)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// Requires a signed-in customer and exposes it as `Extension<Identity>`.
pub async fn customers_authorization(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = authenticate(&state, bearer_token(&req)).await?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Requires a signed-in admin. Any failure while looking up the role denies
/// access.
pub async fn admins_authorization(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = authenticate(&state, bearer_token(&req)).await?;

    match GuardState::from_lookup(find_role(&state, &identity.email).await) {
        GuardState::Authorized => {
            req.extensions_mut().insert(identity);
            Ok(next.run(req).await)
        }
        _ => {
            warn!("{} was denied an admin route", identity.email);
            Err(AppError::ForbiddenResource("Admin access required".into()))
        }
    }
}
