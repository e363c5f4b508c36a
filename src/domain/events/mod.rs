//! Domain events
use crate::domain::aggregates::OrderStatus;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, customer_name: String, total: Decimal },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
}

impl OrderEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Placed { .. } => "storefront.orders.placed",
            Self::StatusChanged { .. } => "storefront.orders.status_changed",
        }
    }

    pub fn order_id(&self) -> Uuid {
        match self { Self::Placed { order_id, .. } | Self::StatusChanged { order_id, .. } => *order_id }
    }
}
