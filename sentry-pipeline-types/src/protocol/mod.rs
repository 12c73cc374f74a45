//! Event payload types.
//!
//! Only version 7 of the event protocol is modelled; `latest` always points
//! at it so callers don't have to track the version.

#[cfg(feature = "protocol")]
pub mod v7;

/// The protocol version emitted by the pipeline.
pub const LATEST: u16 = 7;

/// Alias for the protocol version the pipeline emits.
#[cfg(feature = "protocol")]
pub mod latest {
    pub use super::v7::*;
}
