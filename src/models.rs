use anyhow::Context;
use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{AsChangeset, Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::storefront::{CartLineItem, OrderCustomer, OrderRecord};

// Users

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserEntity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::users)]
pub struct CreateUserEntity {
    pub name: String,
    pub email: String,
    pub image: String,
    pub role: String,
}

// Catalog

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CategoryEntity {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::categories)]
pub struct CreateCategoryEntity {
    pub name: String,
    pub image: String,
    pub description: String,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::schema::categories)]
pub struct UpdateCategoryEntity {
    pub name: String,
    pub image: Option<String>,
    pub description: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::menu_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MenuItemEntity {
    pub id: Uuid,
    pub name: String,
    pub recipe: String,
    pub image: String,
    pub category: String,
    pub price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = crate::schema::menu_items)]
pub struct CreateMenuItemEntity {
    pub name: String,
    pub recipe: String,
    pub image: String,
    pub category: String,
    pub price: f64,
}

// Carts

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::cart_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CartItemEntity {
    pub id: Uuid,
    pub menu_item_id: Uuid,
    pub owner_email: String,
    pub name: String,
    pub image: String,
    pub price: f64,
    pub quantity: i32,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::cart_items)]
pub struct CreateCartItemEntity {
    pub menu_item_id: Uuid,
    pub owner_email: String,
    pub name: String,
    pub image: String,
    pub price: f64,
    pub quantity: i32,
    pub category: String,
}

impl From<CartItemEntity> for CartLineItem {
    fn from(entity: CartItemEntity) -> Self {
        Self {
            id: entity.id,
            menu_item_id: entity.menu_item_id,
            owner_email: entity.owner_email,
            name: entity.name,
            image: entity.image,
            price: entity.price,
            quantity: entity.quantity,
            category: entity.category,
        }
    }
}

// Orders

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub customer_address: String,
    pub items: Value,
    pub subtotal: f64,
    pub shipping: f64,
    pub tax: f64,
    pub total: f64,
    pub payment_method: String,
    pub status: String,
    pub order_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::orders)]
pub struct CreateOrderEntity {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub customer_address: String,
    pub items: Value,
    pub subtotal: f64,
    pub shipping: f64,
    pub tax: f64,
    pub total: f64,
    pub payment_method: String,
    pub status: String,
}

impl TryFrom<OrderEntity> for OrderRecord {
    type Error = anyhow::Error;

    fn try_from(entity: OrderEntity) -> Result<Self, Self::Error> {
        let items: Vec<CartLineItem> = serde_json::from_value(entity.items)
            .with_context(|| format!("Order {} has malformed items", entity.id))?;

        Ok(Self {
            id: entity.id,
            customer: OrderCustomer {
                name: entity.customer_name,
                email: entity.customer_email,
                phone_number: entity.customer_phone,
                address: entity.customer_address,
            },
            items,
            subtotal: entity.subtotal,
            shipping: entity.shipping,
            tax: entity.tax,
            total: entity.total,
            payment_method: entity.payment_method,
            order_date: entity.order_date,
            status: entity.status.parse()?,
        })
    }
}

// Reviews

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::reviews)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ReviewEntity {
    pub id: Uuid,
    pub name: String,
    pub details: String,
    pub rating: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::reviews)]
pub struct CreateReviewEntity {
    pub name: String,
    pub details: String,
    pub rating: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storefront::{OrderStatus, fixtures::line};

    fn order_entity(items: Value, status: &str) -> OrderEntity {
        OrderEntity {
            id: Uuid::new_v4(),
            customer_name: "Nadia Rahman".into(),
            customer_email: "nadia@bistro.test".into(),
            customer_phone: "01712345678".into(),
            customer_address: "Division: Dhaka, District: , Upazila: , House Address: 12".into(),
            items,
            subtotal: 20.0,
            shipping: 5.99,
            tax: 1.6,
            total: 27.59,
            payment_method: "cash_on_delivery".into(),
            status: status.into(),
            order_date: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn order_entity_converts_to_record() {
        let items = serde_json::to_value(vec![line(10.0, 2)]).unwrap();
        let record = OrderRecord::try_from(order_entity(items, "shipping")).unwrap();
        assert_eq!(record.status, OrderStatus::Shipping);
        assert_eq!(record.items.len(), 1);
        assert_eq!(record.customer.phone_number, "01712345678");
    }

    #[test]
    fn unknown_status_is_rejected() {
        let items = serde_json::to_value(Vec::<CartLineItem>::new()).unwrap();
        assert!(OrderRecord::try_from(order_entity(items, "lost")).is_err());
    }
}
