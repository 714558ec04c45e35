//! # domains
//!
//! Entities, policies and port traits for the error-report desk.
//! Nothing in this crate performs I/O; adapters implement the ports.

pub mod access;
pub mod clock;
pub mod errors;
pub mod live;
pub mod models;
pub mod policy;
pub mod ports;

// Re-exporting for easier access in other crates
pub use access::*;
pub use clock::MonotonicClock;
pub use errors::*;
pub use live::{sort_for_listing, LiveQueryHub, ReportSnapshot, ReportSubscription};
pub use models::*;
pub use policy::*;
pub use ports::*;
