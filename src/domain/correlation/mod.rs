//! Duplicate-order signals
//!
//! Compares one order against the rest of the order book on three independent
//! signals: identical fingerprint token, identical IP address, and delivery
//! coordinates within [`GEO_MATCH_RADIUS_M`]. Each signal reports the first
//! qualifying candidate in the order given (the admin view passes newest
//! first), not the best one.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::Order;
use crate::domain::value_objects::Coordinate;

pub const GEO_MATCH_RADIUS_M: f64 = 200.0;

/// Enough of a matching order to link to its detail view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderRef { pub id: Uuid, pub created_at: DateTime<Utc>, pub customer_name: String }

impl From<&Order> for OrderRef {
    fn from(order: &Order) -> Self {
        Self { id: order.id, created_at: order.created_at, customer_name: order.customer.name.clone() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OrderMatches {
    pub fingerprint: Option<OrderRef>,
    pub ip: Option<OrderRef>,
    pub geo: Option<OrderRef>,
}

impl OrderMatches {
    pub fn is_empty(&self) -> bool { self.fingerprint.is_none() && self.ip.is_none() && self.geo.is_none() }
}

pub fn find_matches(target: &Order, candidates: &[Order]) -> OrderMatches {
    let fingerprint = non_empty(target.fingerprint.as_ref().map(|f| f.as_str())).and_then(|fp| {
        others(target, candidates).find(|c| c.fingerprint.as_ref().is_some_and(|other| other.as_str() == fp))
    });

    let ip = non_empty(target.ip_address.as_deref())
        .and_then(|ip| others(target, candidates).find(|c| c.ip_address.as_deref() == Some(ip)));

    let geo = target_location(target).and_then(|here| {
        others(target, candidates).find(|c| {
            c.location()
                .and_then(Result::ok)
                .is_some_and(|there| here.distance_to(&there) <= GEO_MATCH_RADIUS_M)
        })
    });

    let matches = OrderMatches { fingerprint: fingerprint.map(OrderRef::from), ip: ip.map(OrderRef::from), geo: geo.map(OrderRef::from) };
    if !matches.is_empty() {
        tracing::debug!(
            order_id = %target.id,
            fingerprint = ?matches.fingerprint.as_ref().map(|m| m.id),
            ip = ?matches.ip.as_ref().map(|m| m.id),
            geo = ?matches.geo.as_ref().map(|m| m.id),
            "duplicate signals found"
        );
    }
    matches
}

fn others<'a>(target: &'a Order, candidates: &'a [Order]) -> impl Iterator<Item = &'a Order> + 'a {
    candidates.iter().filter(move |c| c.id != target.id)
}

fn non_empty(value: Option<&str>) -> Option<&str> { value.filter(|v| !v.is_empty()) }

fn target_location(target: &Order) -> Option<Coordinate> {
    match target.location()? {
        Ok(c) => Some(c),
        Err(e) => {
            tracing::debug!(order_id = %target.id, error = %e, "order geolocation unusable");
            None
        }
    }
}
