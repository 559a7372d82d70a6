//! HTTP implementation of the storefront ports, speaking to this service's
//! REST API the way the web client does.

use reqwest::{Client, Method, RequestBuilder, Url};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use uuid::Uuid;

use crate::{
    app_error::StdResponse,
    routes::users::AdminFlag,
    storefront::{
        CartLineItem, OrderRecord,
        checkout::CreateOrderRequest,
        ports::{CartStore, OrderStore, RoleSource, StoreError, StoreResult},
    },
};

/// Talks to the storefront API on behalf of one signed-in user.
#[derive(Clone)]
pub struct StorefrontClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl StorefrontClient {
    pub fn new(http: Client, base_url: &str) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::Transport(format!("invalid base url: {e}")))?;
        Ok(Self {
            http,
            base_url,
            token: None,
        })
    }

    /// Attaches the bearer token issued by the identity provider.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Transport("base url cannot have a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, StoreError> {
        let builder = self.http.request(method, self.endpoint(segments)?);
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, StoreError> {
        let response = builder
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        read_envelope(status, &body)
    }

    async fn call_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<T, StoreError> {
        self.call(self.request(method, segments)?.json(body)).await
    }

    /// Uploads an image through the admin upload endpoint and returns its URL.
    pub async fn upload_image(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        #[derive(serde::Deserialize)]
        struct Uploaded {
            url: String,
        }

        let builder = self
            .request(Method::POST, &["uploads", "images"])?
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        let uploaded: Uploaded = self.call(builder).await?;
        Ok(uploaded.url)
    }
}

/// Unwraps the `{ data, message }` envelope. Non-2xx answers become
/// [`StoreError::Rejected`] carrying the server's message when it sent one.
fn read_envelope<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<T, StoreError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_slice::<StdResponse<serde_json::Value, String>>(body)
            .ok()
            .and_then(|envelope| envelope.message)
            .filter(|message| !message.trim().is_empty());
        return Err(StoreError::Rejected { status, message });
    }

    let envelope: StdResponse<T, String> = serde_json::from_slice(body)
        .map_err(|e| StoreError::Transport(format!("malformed response: {e}")))?;
    envelope
        .data
        .ok_or_else(|| StoreError::Transport("response carried no data".into()))
}

impl CartStore for StorefrontClient {
    fn list<'a>(&'a self, owner_email: &'a str) -> StoreResult<'a, Vec<CartLineItem>> {
        Box::pin(async move {
            let builder = self
                .request(Method::GET, &["carts"])?
                .query(&[("email", owner_email)]);
            self.call(builder).await
        })
    }

    fn add<'a>(&'a self, menu_item_id: Uuid, quantity: i32) -> StoreResult<'a, CartLineItem> {
        Box::pin(async move {
            let body = json!({ "menu_item_id": menu_item_id, "quantity": quantity });
            self.call_json(Method::POST, &["carts"], &body).await
        })
    }

    fn set_quantity<'a>(&'a self, id: Uuid, quantity: i32) -> StoreResult<'a, CartLineItem> {
        Box::pin(async move {
            let id = id.to_string();
            let body = json!({ "quantity": quantity });
            self.call_json(Method::PATCH, &["carts", &id], &body).await
        })
    }

    fn remove<'a>(&'a self, id: Uuid) -> StoreResult<'a, ()> {
        Box::pin(async move {
            let id = id.to_string();
            let _: CartLineItem = self
                .call(self.request(Method::DELETE, &["carts", &id])?)
                .await?;
            Ok(())
        })
    }
}

impl OrderStore for StorefrontClient {
    fn create<'a>(&'a self, request: &'a CreateOrderRequest) -> StoreResult<'a, OrderRecord> {
        Box::pin(async move { self.call_json(Method::POST, &["orders"], request).await })
    }

    fn list_for<'a>(&'a self, email: &'a str) -> StoreResult<'a, Vec<OrderRecord>> {
        Box::pin(async move {
            self.call(self.request(Method::GET, &["orders", "user", email])?)
                .await
        })
    }

    fn cancel<'a>(&'a self, id: Uuid) -> StoreResult<'a, OrderRecord> {
        Box::pin(async move {
            let id = id.to_string();
            self.call(self.request(Method::PATCH, &["orders", "cancel", &id])?)
                .await
        })
    }
}

impl RoleSource for StorefrontClient {
    fn is_admin<'a>(&'a self, email: &'a str) -> StoreResult<'a, bool> {
        Box::pin(async move {
            let flag: AdminFlag = self
                .call(self.request(Method::GET, &["users", "admin", email])?)
                .await?;
            Ok(flag.admin)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> StorefrontClient {
        StorefrontClient::new(Client::new(), base).unwrap()
    }

    #[test]
    fn endpoints_escape_path_segments() {
        let url = client("http://localhost:5000/api/")
            .endpoint(&["users", "admin", "a b@bistro.test"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5000/api/users/admin/a%20b@bistro.test"
        );
    }

    #[test]
    fn collection_endpoints_have_no_trailing_slash() {
        let url = client("http://localhost:5000").endpoint(&["carts"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/carts");
    }

    #[test]
    fn cancel_targets_the_customer_cancel_route() {
        let id = Uuid::nil();
        let url = client("http://localhost:5000")
            .endpoint(&["orders", "cancel", &id.to_string()])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5000/orders/cancel/00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn rejection_carries_server_message() {
        let body = br#"{"data":null,"message":"Cart changed, please review your order"}"#;
        let err = read_envelope::<OrderRecord>(400, body).unwrap_err();
        assert_eq!(
            err.server_message(),
            Some("Cart changed, please review your order")
        );
    }

    #[test]
    fn rejection_without_envelope_has_no_message() {
        let err = read_envelope::<OrderRecord>(502, b"Bad Gateway").unwrap_err();
        assert_eq!(
            err,
            StoreError::Rejected {
                status: 502,
                message: None
            }
        );
    }

    #[test]
    fn success_unwraps_data() {
        let body = br#"{"data":{"admin":true},"message":"ok"}"#;
        let flag: AdminFlag = read_envelope(200, body).unwrap();
        assert!(flag.admin);
    }
}
