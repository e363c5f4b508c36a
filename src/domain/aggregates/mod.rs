//! Aggregates module
pub mod order;

pub use order::{Checkout, Customer, LineItem, Locale, Order, OrderError, OrderStatus};
