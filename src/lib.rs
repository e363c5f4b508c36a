//! Souq Orders
//!
//! Order back end for a bilingual (English/Arabic) car-accessories storefront.
//!
//! ## Features
//! - Checkout order placement with client IP, geolocation and browser
//!   fingerprint capture
//! - Admin sessions, order list, detail and status changes
//! - Duplicate-order signals: same fingerprint, same IP, or delivery point
//!   within 200 m of another order

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod publisher;
pub mod store;

use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::OrderError;

pub use crate::config::{ConfigError, StoreConfig};
pub use crate::domain::correlation::{find_matches, OrderMatches, OrderRef};
pub use crate::domain::fingerprint::{DecodeError, FingerprintPayload, FingerprintToken};
pub use crate::domain::value_objects::{distance, Coordinate, ParseError};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Order not found")]
    OrderNotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Order {id} was changed by another request")]
    StatusConflict { id: Uuid },

    #[error("Order {id} is unreadable: {reason}")]
    CorruptRecord { id: Uuid, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
