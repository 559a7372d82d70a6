use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::ports::{RoleSource, StoreError};

/// Where an unauthorized visitor of an admin route is sent.
pub const PUBLIC_HOME_ROUTE: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(rename = "user")]
    Customer,
    Admin,
}

impl Role {
    pub fn from_admin_flag(is_admin: bool) -> Self {
        if is_admin { Role::Admin } else { Role::Customer }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "user",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardState {
    #[default]
    Loading,
    Authorized,
    Unauthorized,
}

/// What the view layer should do for an admin-only route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Wait,
    Render,
    Redirect(&'static str),
}

impl GuardState {
    /// Lookup errors deny access.
    pub fn from_lookup<E>(result: Result<Role, E>) -> Self {
        match result {
            Ok(Role::Admin) => GuardState::Authorized,
            Ok(Role::Customer) | Err(_) => GuardState::Unauthorized,
        }
    }

    pub fn decision(&self) -> RouteDecision {
        match self {
            GuardState::Loading => RouteDecision::Wait,
            GuardState::Authorized => RouteDecision::Render,
            GuardState::Unauthorized => RouteDecision::Redirect(PUBLIC_HOME_ROUTE),
        }
    }
}

/// Resolves the signed-in user's role once and remembers it until
/// [`RoleGuard::invalidate`] is called on login or logout.
pub struct RoleGuard<S> {
    source: S,
    cached: Mutex<Option<(String, Role)>>,
}

impl<S: RoleSource> RoleGuard<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    pub fn cached_role(&self, email: &str) -> Option<Role> {
        let cached = self.cached.lock().ok()?;
        cached
            .as_ref()
            .filter(|(owner, _)| owner.eq_ignore_ascii_case(email))
            .map(|(_, role)| *role)
    }

    pub fn invalidate(&self) {
        if let Ok(mut cached) = self.cached.lock() {
            *cached = None;
        }
    }

    pub async fn resolve_role(&self, email: &str) -> Result<Role, StoreError> {
        if let Some(role) = self.cached_role(email) {
            return Ok(role);
        }

        let role = Role::from_admin_flag(self.source.is_admin(email).await?);
        if let Ok(mut cached) = self.cached.lock() {
            *cached = Some((email.to_string(), role));
        }
        Ok(role)
    }

    /// Settles the guard for `email`; never stays in `Loading`.
    pub async fn check(&self, email: &str) -> GuardState {
        let result = self.resolve_role(email).await;
        if let Err(e) = &result {
            warn!("Admin check for {email} failed, denying access: {e}");
        }
        GuardState::from_lookup(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::BoxFuture;

    use super::*;

    struct FixedFlag {
        answer: Result<bool, StoreError>,
        calls: AtomicUsize,
    }

    impl FixedFlag {
        fn new(answer: Result<bool, StoreError>) -> Self {
            Self {
                answer,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl RoleSource for FixedFlag {
        fn is_admin<'a>(&'a self, _email: &'a str) -> BoxFuture<'a, Result<bool, StoreError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let answer = self.answer.clone();
            Box::pin(async move { answer })
        }
    }

    #[test]
    fn guard_starts_loading() {
        assert_eq!(GuardState::default(), GuardState::Loading);
        assert_eq!(GuardState::Loading.decision(), RouteDecision::Wait);
    }

    #[tokio::test]
    async fn non_admin_is_redirected_home() {
        let guard = RoleGuard::new(FixedFlag::new(Ok(false)));
        let state = guard.check("guest@bistro.test").await;
        assert_eq!(state, GuardState::Unauthorized);
        assert_eq!(state.decision(), RouteDecision::Redirect("/"));
    }

    #[tokio::test]
    async fn admin_renders_protected_content() {
        let guard = RoleGuard::new(FixedFlag::new(Ok(true)));
        let state = guard.check("chef@bistro.test").await;
        assert_eq!(state.decision(), RouteDecision::Render);
    }

    #[tokio::test]
    async fn lookup_failure_fails_closed() {
        let guard = RoleGuard::new(FixedFlag::new(Err(StoreError::Transport(
            "connection reset".into(),
        ))));
        assert_eq!(guard.check("chef@bistro.test").await, GuardState::Unauthorized);
        assert_eq!(guard.cached_role("chef@bistro.test"), None);
    }

    #[tokio::test]
    async fn role_is_cached_until_invalidated() {
        let guard = RoleGuard::new(FixedFlag::new(Ok(true)));
        guard.check("chef@bistro.test").await;
        guard.check("chef@bistro.test").await;
        assert_eq!(guard.source.calls.load(Ordering::SeqCst), 1);

        guard.invalidate();
        guard.check("chef@bistro.test").await;
        assert_eq!(guard.source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cache_is_per_email() {
        let guard = RoleGuard::new(FixedFlag::new(Ok(false)));
        guard.check("a@bistro.test").await;
        assert_eq!(guard.cached_role("b@bistro.test"), None);
    }
}
