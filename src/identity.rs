use anyhow::{Context, Result};
use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::app_error::AppError;

/// The caller as vouched for by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Identity {
    pub fn owns(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email)
    }
}

/// Resolves bearer tokens issued by the external identity provider.
pub trait IdentityProvider: Send + Sync {
    /// Returns `Ok(None)` when the provider rejects the token.
    fn resolve<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<Option<Identity>>>;
}

/// Asks the provider's userinfo endpoint who the token belongs to.
pub struct HttpIdentityProvider {
    client: Client,
    userinfo_url: String,
}

impl HttpIdentityProvider {
    pub fn new(client: Client, userinfo_url: impl Into<String>) -> Self {
        Self {
            client,
            userinfo_url: userinfo_url.into(),
        }
    }
}

impl IdentityProvider for HttpIdentityProvider {
    fn resolve<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<Option<Identity>>> {
        Box::pin(async move {
            let response = self
                .client
                .get(&self.userinfo_url)
                .bearer_auth(token)
                .send()
                .await
                .map_err(|_| AppError::ServiceUnreachable("IdentityProvider".into()))?;

            match response.status() {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
                status if status.is_success() => {
                    let identity: Identity = response
                        .json()
                        .await
                        .context("Failed to parse identity claims")?;
                    Ok(Some(identity))
                }
                status => Err(anyhow::anyhow!(
                    "Identity provider answered with unexpected status {status}"
                )),
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use super::*;

    /// Maps fixed tokens to identities.
    #[derive(Default)]
    pub struct StaticIdentityProvider {
        tokens: HashMap<String, Identity>,
    }

    impl StaticIdentityProvider {
        pub fn with(mut self, token: &str, email: &str) -> Self {
            self.tokens.insert(
                token.to_string(),
                Identity {
                    email: email.to_string(),
                    name: None,
                },
            );
            self
        }
    }

    impl IdentityProvider for StaticIdentityProvider {
        fn resolve<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<Option<Identity>>> {
            Box::pin(async move { Ok(self.tokens.get(token).cloned()) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_ignores_ascii_case() {
        let identity = Identity {
            email: "Guest@Bistro.test".into(),
            name: None,
        };
        assert!(identity.owns("guest@bistro.test"));
        assert!(!identity.owns("other@bistro.test"));
    }
}
