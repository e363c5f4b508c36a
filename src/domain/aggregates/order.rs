//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::events::OrderEvent;
use crate::domain::fingerprint::FingerprintToken;
use crate::domain::value_objects::{Coordinate, ParseError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer: Customer,
    pub items: Vec<LineItem>,
    pub total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    /// Raw `"lat,lng"` as captured by the storefront.
    pub geolocation: Option<String>,
    pub notes: Option<String>,
    pub ip_address: Option<String>,
    pub fingerprint: Option<FingerprintToken>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer { pub name: String, pub email: String, pub phone: String, pub address: String }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: String,
    pub title: String,
    pub title_ar: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Display language for bilingual item titles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale { #[default] En, Ar }

impl LineItem {
    /// `None` when `price * quantity` does not fit in a `Decimal`.
    pub fn line_total(&self) -> Option<Decimal> { self.price.checked_mul(Decimal::from(self.quantity)) }
    pub fn title_for(&self, locale: Locale) -> &str {
        match locale { Locale::Ar if !self.title_ar.is_empty() => &self.title_ar, _ => &self.title }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] New, Processing, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
    pub fn is_terminal(&self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

/// What the storefront submits at checkout.
#[derive(Clone, Debug, Default)]
pub struct Checkout {
    pub customer: Customer,
    pub items: Vec<LineItem>,
    pub notes: Option<String>,
    pub geolocation: Option<String>,
    pub fingerprint: Option<FingerprintToken>,
    pub ip_address: Option<String>,
}

impl Order {
    pub fn place(checkout: Checkout) -> Result<(Self, OrderEvent), OrderError> {
        if checkout.items.is_empty() { return Err(OrderError::NoItems); }
        if let Some(item) = checkout.items.iter().find(|i| i.quantity == 0) {
            return Err(OrderError::ZeroQuantity(item.product_id.clone()));
        }
        if let Some(item) = checkout.items.iter().find(|i| i.price < Decimal::ZERO) {
            return Err(OrderError::NegativePrice(item.product_id.clone()));
        }
        let total = checkout
            .items
            .iter()
            .try_fold(Decimal::ZERO, |sum, item| item.line_total().and_then(|line| sum.checked_add(line)))
            .ok_or(OrderError::TotalOverflow)?;
        let order = Self {
            id: Uuid::now_v7(), customer: checkout.customer, items: checkout.items, total,
            status: OrderStatus::New, created_at: Utc::now(), geolocation: checkout.geolocation,
            notes: checkout.notes, ip_address: checkout.ip_address, fingerprint: checkout.fingerprint,
        };
        let event = OrderEvent::Placed { order_id: order.id, customer_name: order.customer.name.clone(), total };
        Ok((order, event))
    }

    /// Admin status change. Delivered and cancelled orders are final.
    pub fn set_status(&mut self, to: OrderStatus) -> Result<OrderEvent, OrderError> {
        if self.status.is_terminal() && self.status != to {
            return Err(OrderError::InvalidTransition { from: self.status, to });
        }
        let from = std::mem::replace(&mut self.status, to);
        Ok(OrderEvent::StatusChanged { order_id: self.id, from, to })
    }

    pub fn location(&self) -> Option<Result<Coordinate, ParseError>> {
        self.geolocation.as_deref().map(Coordinate::parse)
    }

    pub fn item_count(&self) -> u32 { self.items.iter().fold(0, |n, i| n.saturating_add(i.quantity)) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    NoItems,
    ZeroQuantity(String),
    NegativePrice(String),
    TotalOverflow,
    UnknownStatus(String),
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}
impl std::error::Error for OrderError {}
impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoItems => write!(f, "No items"),
            Self::ZeroQuantity(product) => write!(f, "Zero quantity for product {product}"),
            Self::NegativePrice(product) => write!(f, "Negative price for product {product}"),
            Self::TotalOverflow => write!(f, "Order total is too large"),
            Self::UnknownStatus(s) => write!(f, "Unknown order status {s:?}"),
            Self::InvalidTransition { from, to } => write!(f, "Cannot move order from {from} to {to}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: i64, quantity: u32) -> LineItem {
        LineItem { product_id: "P1".into(), title: "Seat cover".into(), title_ar: "غطاء مقعد".into(), price: Decimal::new(price, 0), quantity, image_url: None }
    }

    fn checkout() -> Checkout {
        Checkout {
            customer: Customer { name: "Omar".into(), email: "omar@example.com".into(), phone: "0100".into(), address: "Cairo".into() },
            items: vec![item(250, 2), item(100, 1)],
            ..Default::default()
        }
    }

    #[test]
    fn test_place_order() {
        let (order, event) = Order::place(checkout()).unwrap();
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.total, Decimal::new(600, 0));
        assert_eq!(order.item_count(), 3);
        assert!(matches!(event, OrderEvent::Placed { order_id, .. } if order_id == order.id));
    }

    #[test]
    fn test_place_rejects_bad_items() {
        assert_eq!(Order::place(Checkout { items: vec![], ..checkout() }), Err(OrderError::NoItems));
        assert_eq!(Order::place(Checkout { items: vec![item(10, 0)], ..checkout() }), Err(OrderError::ZeroQuantity("P1".into())));
        assert_eq!(Order::place(Checkout { items: vec![item(100, 1), item(-500, 1)], ..checkout() }), Err(OrderError::NegativePrice("P1".into())));
        assert!(Order::place(Checkout { items: vec![item(0, 3)], ..checkout() }).is_ok());
    }

    #[test]
    fn test_place_rejects_overflowing_total() {
        let huge = LineItem { price: Decimal::MAX, ..item(0, 2) };
        assert_eq!(huge.line_total(), None);
        assert_eq!(Order::place(Checkout { items: vec![huge], ..checkout() }), Err(OrderError::TotalOverflow));

        // each line fits, the sum does not
        let half = LineItem { price: Decimal::MAX, ..item(0, 1) };
        assert_eq!(Order::place(Checkout { items: vec![half.clone(), half], ..checkout() }), Err(OrderError::TotalOverflow));
    }

    #[test]
    fn test_status_workflow() {
        let (mut order, _) = Order::place(checkout()).unwrap();
        order.set_status(OrderStatus::Processing).unwrap();
        order.set_status(OrderStatus::Shipped).unwrap();
        let event = order.set_status(OrderStatus::Delivered).unwrap();
        assert_eq!(event, OrderEvent::StatusChanged { order_id: order.id, from: OrderStatus::Shipped, to: OrderStatus::Delivered });
        assert_eq!(order.set_status(OrderStatus::Cancelled), Err(OrderError::InvalidTransition { from: OrderStatus::Delivered, to: OrderStatus::Cancelled }));
        assert!(order.set_status(OrderStatus::Delivered).is_ok());
    }

    #[test]
    fn test_status_strings() {
        for status in [OrderStatus::New, OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered, OrderStatus::Cancelled] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("pending".parse::<OrderStatus>().is_err());
        assert_eq!(serde_json::to_string(&OrderStatus::Shipped).unwrap(), "\"shipped\"");
    }

    #[test]
    fn test_title_for_locale() {
        let mut i = item(1, 1);
        assert_eq!(i.title_for(Locale::Ar), "غطاء مقعد");
        assert_eq!(i.title_for(Locale::En), "Seat cover");
        i.title_ar.clear();
        assert_eq!(i.title_for(Locale::Ar), "Seat cover");
        assert_eq!(serde_json::from_str::<Locale>("\"ar\"").unwrap(), Locale::Ar);
    }
}
