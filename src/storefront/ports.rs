//! Interfaces the storefront session depends on. The HTTP client in
//! [`crate::client`] implements them against the service; tests use in-memory
//! fakes.

use futures::future::BoxFuture;
use thiserror::Error;
use uuid::Uuid;

use super::{CartLineItem, OrderRecord, abort::Aborted, checkout::CreateOrderRequest};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The server answered with an error; `message` is its explanation, if any.
    #[error("request rejected ({status})")]
    Rejected { status: u16, message: Option<String> },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error(transparent)]
    Aborted(#[from] Aborted),
}

impl StoreError {
    /// The server's own message, when it sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            StoreError::Rejected { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

pub type StoreResult<'a, T> = BoxFuture<'a, Result<T, StoreError>>;

pub trait CartStore: Send + Sync {
    fn list<'a>(&'a self, owner_email: &'a str) -> StoreResult<'a, Vec<CartLineItem>>;
    fn add<'a>(&'a self, menu_item_id: Uuid, quantity: i32) -> StoreResult<'a, CartLineItem>;
    fn set_quantity<'a>(&'a self, id: Uuid, quantity: i32) -> StoreResult<'a, CartLineItem>;
    fn remove<'a>(&'a self, id: Uuid) -> StoreResult<'a, ()>;
}

pub trait OrderStore: Send + Sync {
    fn create<'a>(&'a self, request: &'a CreateOrderRequest) -> StoreResult<'a, OrderRecord>;
    fn list_for<'a>(&'a self, email: &'a str) -> StoreResult<'a, Vec<OrderRecord>>;
    /// Cancels one of the caller's own pending orders.
    fn cancel<'a>(&'a self, id: Uuid) -> StoreResult<'a, OrderRecord>;
}

pub trait RoleSource: Send + Sync {
    fn is_admin<'a>(&'a self, email: &'a str) -> StoreResult<'a, bool>;
}
