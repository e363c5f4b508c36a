//! Order domain: the order aggregate, its events, and the duplicate-order
//! heuristics (fingerprint token, geolocation, correlation scan).
pub mod aggregates;
pub mod correlation;
pub mod events;
pub mod fingerprint;
pub mod value_objects;
