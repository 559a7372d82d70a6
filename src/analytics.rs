//! Figures shown on the admin dashboard, computed from the order history.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::storefront::{OrderRecord, OrderStatus, pricing::round_cents};

pub const TOP_LIMIT: usize = 5;
pub const RECENT_LIMIT: usize = 5;

/// Row counts that do not come from the orders themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogCounts {
    pub users: i64,
    pub menu_items: i64,
    pub categories: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct StatusFigures {
    pub count: usize,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub revenue: f64,
    pub orders: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RankedSales {
    pub name: String,
    pub quantity: i64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RecentOrder {
    pub id: Uuid,
    pub customer_name: String,
    pub total: f64,
    pub status: OrderStatus,
    pub order_date: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AdminStats {
    pub users: i64,
    pub menu_items: i64,
    pub categories: i64,
    pub orders: usize,
    /// Sum of order totals, canceled orders excluded.
    pub revenue: f64,
    pub order_status: BTreeMap<OrderStatus, StatusFigures>,
    pub revenue_trend: Vec<DailyRevenue>,
    pub top_categories: Vec<RankedSales>,
    pub top_items: Vec<RankedSales>,
    pub recent_orders: Vec<RecentOrder>,
}

#[derive(Default)]
struct Tally {
    quantity: i64,
    revenue: f64,
}

fn ranked(tallies: HashMap<String, Tally>) -> Vec<RankedSales> {
    let mut ranked: Vec<RankedSales> = tallies
        .into_iter()
        .map(|(name, tally)| RankedSales {
            name,
            quantity: tally.quantity,
            revenue: round_cents(tally.revenue),
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.quantity
            .cmp(&a.quantity)
            .then(b.revenue.total_cmp(&a.revenue))
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(TOP_LIMIT);
    ranked
}

pub fn compute_admin_stats(orders: &[OrderRecord], counts: CatalogCounts) -> AdminStats {
    let mut order_status: BTreeMap<OrderStatus, StatusFigures> = OrderStatus::ALL
        .iter()
        .map(|status| (*status, StatusFigures::default()))
        .collect();
    let mut trend: BTreeMap<NaiveDate, DailyRevenue> = BTreeMap::new();
    let mut categories: HashMap<String, Tally> = HashMap::new();
    let mut items: HashMap<String, Tally> = HashMap::new();
    let mut revenue = 0.0;

    for order in orders {
        let figures = order_status.entry(order.status).or_default();
        figures.count += 1;
        figures.revenue += order.total;

        if order.status == OrderStatus::Canceled {
            continue;
        }
        revenue += order.total;

        let date = order.order_date.date_naive();
        let day = trend.entry(date).or_insert(DailyRevenue {
            date,
            revenue: 0.0,
            orders: 0,
        });
        day.revenue += order.total;
        day.orders += 1;

        for line in &order.items {
            let quantity = i64::from(line.quantity);
            let line_revenue = line.line_total();

            let category = categories.entry(line.category.clone()).or_default();
            category.quantity += quantity;
            category.revenue += line_revenue;

            let item = items.entry(line.name.clone()).or_default();
            item.quantity += quantity;
            item.revenue += line_revenue;
        }
    }

    for figures in order_status.values_mut() {
        figures.revenue = round_cents(figures.revenue);
    }

    let mut recent: Vec<&OrderRecord> = orders.iter().collect();
    recent.sort_by(|a, b| b.order_date.cmp(&a.order_date));

    AdminStats {
        users: counts.users,
        menu_items: counts.menu_items,
        categories: counts.categories,
        orders: orders.len(),
        revenue: round_cents(revenue),
        order_status,
        revenue_trend: trend
            .into_values()
            .map(|day| DailyRevenue {
                revenue: round_cents(day.revenue),
                ..day
            })
            .collect(),
        top_categories: ranked(categories),
        top_items: ranked(items),
        recent_orders: recent
            .into_iter()
            .take(RECENT_LIMIT)
            .map(|order| RecentOrder {
                id: order.id,
                customer_name: order.customer.name.clone(),
                total: order.total,
                status: order.status,
                order_date: order.order_date,
            })
            .collect(),
    }
}
