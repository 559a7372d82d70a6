use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Orders strictly above this subtotal ship for free.
pub const FREE_SHIPPING_THRESHOLD: f64 = 50.0;
pub const SHIPPING_FEE: f64 = 5.99;
pub const TAX_RATE: f64 = 0.08;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PriceBreakdown {
    pub subtotal: f64,
    pub shipping: f64,
    pub tax: f64,
    pub total: f64,
}

impl PriceBreakdown {
    pub fn from_subtotal(subtotal: f64) -> Self {
        let shipping = if subtotal > FREE_SHIPPING_THRESHOLD {
            0.0
        } else {
            SHIPPING_FEE
        };
        let tax = subtotal * TAX_RATE;

        Self {
            subtotal,
            shipping,
            tax,
            total: round_cents(subtotal + shipping + tax),
        }
    }

    /// True when `total` is within half a cent of the computed total.
    pub fn matches_total(&self, total: f64) -> bool {
        (self.total - total).abs() < 0.005
    }
}

pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
