use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    OrderRecord,
    pricing::PriceBreakdown,
    regions::{districts_of, is_division, upazilas_of},
    selection::SelectionModel,
};

pub const PAYMENT_METHOD: &str = "cash_on_delivery";
pub const ORDER_FAILED_FALLBACK: &str = "Failed to place order. Please try again.";
/// Where the storefront returns after a successful checkout.
pub const AFTER_CHECKOUT_ROUTE: &str = "/dashboard/cart";

pub const MIN_PHONE_DIGITS: usize = 10;

/// Field name → message. Empty means the form may be submitted.
pub type FieldErrors = BTreeMap<String, String>;

/// Shipping details entered on the checkout screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CheckoutForm {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub division: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub upazila: String,
    pub house_address: String,
}

impl CheckoutForm {
    pub fn address(&self) -> String {
        format!(
            "Division: {}, District: {}, Upazila: {}, House Address: {}",
            self.division, self.district, self.upazila, self.house_address
        )
    }
}

/// Something shaped like `local@domain.tld` somewhere in the input.
fn looks_like_email(input: &str) -> bool {
    input.split_whitespace().any(|token| {
        let Some(at) = token.char_indices().skip(1).find(|(_, c)| *c == '@') else {
            return false;
        };
        let domain = &token[at.0 + 1..];
        domain
            .char_indices()
            .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
    })
}

fn looks_like_phone(input: &str) -> bool {
    input.len() >= MIN_PHONE_DIGITS && input.bytes().all(|b| b.is_ascii_digit())
}

pub fn validate(form: &CheckoutForm) -> FieldErrors {
    let mut errors = FieldErrors::new();
    let mut fail = |field: &str, message: &str| {
        errors.insert(field.to_string(), message.to_string());
    };

    if form.name.trim().is_empty() {
        fail("name", "Name is required");
    }

    if form.email.trim().is_empty() {
        fail("email", "Email is required");
    } else if !looks_like_email(&form.email) {
        fail("email", "Invalid email format");
    }

    if form.phone_number.trim().is_empty() {
        fail("phone_number", "Phone number is required");
    } else if !looks_like_phone(&form.phone_number) {
        fail("phone_number", "Invalid phone number");
    }

    if form.division.is_empty() {
        fail("division", "Division is required");
    } else if !is_division(&form.division) {
        fail("division", "Unknown division");
    } else if !form.district.is_empty()
        && !districts_of(&form.division).contains(&form.district.as_str())
    {
        fail("district", "District does not belong to the selected division");
    } else if !form.upazila.is_empty()
        && !upazilas_of(&form.district).contains(&form.upazila.as_str())
    {
        fail("upazila", "Upazila does not belong to the selected district");
    }

    if form.house_address.trim().is_empty() {
        fail("house_address", "House address is required");
    }

    errors
}

/// Body of `POST /orders`: the selected cart lines plus the total the
/// customer was shown, which the order store re-checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub customer: CheckoutForm,
    pub cart_item_ids: Vec<Uuid>,
    pub total: f64,
}

impl CreateOrderRequest {
    pub fn from_selection(selection: &SelectionModel, customer: CheckoutForm) -> Self {
        let price = PriceBreakdown::from_subtotal(selection.compute_subtotal());
        Self {
            customer,
            cart_item_ids: selection
                .selected_items()
                .iter()
                .map(|item| item.id)
                .collect(),
            total: price.total,
        }
    }
}

/// A successful checkout and where to go next.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub order: OrderRecord,
    pub redirect_to: &'static str,
}

#[derive(Debug, Error, PartialEq)]
pub enum CheckoutError {
    #[error("Please correct the highlighted fields")]
    Invalid(FieldErrors),

    #[error("Select at least one item to check out")]
    EmptySelection,

    #[error("{0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storefront::fixtures::valid_form;

    #[test]
    fn complete_form_is_valid() {
        assert!(validate(&valid_form()).is_empty());
    }

    #[test]
    fn empty_name_is_required() {
        let form = CheckoutForm {
            name: "   ".into(),
            ..valid_form()
        };
        let errors = validate(&form);
        assert_eq!(errors.get("name").map(String::as_str), Some("Name is required"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn malformed_email_and_phone_are_reported() {
        let form = CheckoutForm {
            email: "nadia-at-bistro".into(),
            phone_number: "12345".into(),
            ..valid_form()
        };
        let errors = validate(&form);
        assert_eq!(errors["email"], "Invalid email format");
        assert_eq!(errors["phone_number"], "Invalid phone number");
    }

    #[test]
    fn email_shape_needs_local_part_and_dotted_domain() {
        assert!(looks_like_email("nadia@bistro.test"));
        assert!(!looks_like_email("@bistro.test"));
        assert!(!looks_like_email("nadia@.test"));
        assert!(!looks_like_email("nadia@bistro."));
    }

    #[test]
    fn phone_must_be_digits_only() {
        let form = CheckoutForm {
            phone_number: "+8801712345678".into(),
            ..valid_form()
        };
        assert!(validate(&form).contains_key("phone_number"));
    }

    #[test]
    fn empty_form_reports_every_required_field() {
        let errors = validate(&CheckoutForm::default());
        for field in ["name", "email", "phone_number", "division", "house_address"] {
            assert!(errors.contains_key(field), "missing error for {field}");
        }
    }

    #[test]
    fn district_must_match_division() {
        let form = CheckoutForm {
            division: "Khulna".into(),
            upazila: String::new(),
            ..valid_form()
        };
        assert_eq!(
            validate(&form)["district"],
            "District does not belong to the selected division"
        );
    }

    #[test]
    fn district_and_upazila_are_optional() {
        let form = CheckoutForm {
            district: String::new(),
            upazila: String::new(),
            ..valid_form()
        };
        assert!(validate(&form).is_empty());
    }

    #[test]
    fn address_renders_all_parts() {
        assert_eq!(
            valid_form().address(),
            "Division: Dhaka, District: Gazipur, Upazila: Kapasia, House Address: House 12, Road 4"
        );
    }
}
