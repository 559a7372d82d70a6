//! Storefront logic shared by the service and its clients: which cart lines
//! are selected for checkout, how a selection is priced, how the shipping form
//! is validated, and who may open the admin dashboard.
//!
//! Everything here apart from [`session`] is synchronous and free of I/O.

pub mod abort;
pub mod checkout;
pub mod ports;
pub mod pricing;
pub mod regions;
pub mod role_guard;
pub mod selection;
pub mod session;

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One menu item in a customer's cart, with the price captured when it was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartLineItem {
    pub id: Uuid,
    pub menu_item_id: Uuid,
    pub owner_email: String,
    pub name: String,
    pub image: String,
    pub price: f64,
    pub quantity: i32,
    pub category: String,
}

impl CartLineItem {
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Shipping,
    Delivered,
    Canceled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Shipping,
        OrderStatus::Delivered,
        OrderStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Shipping => "shipping",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0} is not a valid order status")]
pub struct UnknownOrderStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownOrderStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderCustomer {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub address: String,
}

/// A placed order as returned by the order store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderRecord {
    pub id: Uuid,
    pub customer: OrderCustomer,
    pub items: Vec<CartLineItem>,
    pub subtotal: f64,
    pub shipping: f64,
    pub tax: f64,
    pub total: f64,
    pub payment_method: String,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
}
