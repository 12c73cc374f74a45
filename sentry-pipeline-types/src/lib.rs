//! This crate provides the protocol types consumed by the sentry capture
//! pipeline.  It's used by `sentry-pipeline` to represent events while they
//! are being normalized, filtered and handed off for delivery.
//!
//! The types are serializable to the JSON shape the Sentry server expects.
//! Only the parts of the protocol the pipeline reasons about are modelled:
//! messages, exception chains, stacktraces, breadcrumbs and the scope-level
//! context maps.
//!
//! ## API Concepts
//!
//! Most types implement `Default` so that objects can be created
//! conveniently and missing attributes can be filled in:
//!
//! ```rust
//! use sentry_pipeline_types::protocol::v7;
//!
//! let event = v7::Event {
//!     message: Some("Hello World!".to_string()),
//!     level: v7::Level::Info,
//!     ..Default::default()
//! };
//! assert!(event.exception.is_empty());
//! ```
#![warn(missing_docs)]

#[macro_use]
mod macros;

pub mod protocol;
mod utils;

pub use crate::utils::{datetime_to_timestamp, timestamp_to_datetime, to_rfc3339};

// Re-export external types for convenience
pub use uuid::Uuid;

/// Generates a random event id.
pub fn random_uuid() -> Uuid {
    Uuid::new_v4()
}
