//! This crate provides the capture pipeline of a [Sentry] SDK: the part that
//! sits between "something happened in the application" and "a delivery was
//! handed to the network layer".
//!
//! # Core Concepts
//!
//! The [`Client`] is the pipeline.  It asks a [`Backend`] to turn errors and
//! messages into events, merges a [`Scope`] into them, samples them, runs the
//! user's `before_send` hook, discards noise through the [`InboundFilters`]
//! and finally submits survivors through the backend's [`DeliveryBuffer`],
//! which bounds how many deliveries are in flight at once.
//!
//! A [`Hub`] binds a client to a stack of scopes for convenient use from
//! application code.  Extension points are the [`Integration`], [`Backend`],
//! [`Transport`] and [`TransportFactory`] traits.
//!
//! # Async
//!
//! Capture calls are `async` and run on [tokio].  Deliveries are spawned on
//! the current runtime, so the client has to be used from within one.
//!
//! ```rust
//! use std::time::Duration;
//! use sentry_pipeline::{Client, ClientOptions, Level};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let client = Client::from(ClientOptions {
//!     ignore_errors: vec!["ResizeObserver loop".into()],
//!     ..Default::default()
//! });
//! client.install();
//!
//! let response = client
//!     .capture_message("ResizeObserver loop limit exceeded", Level::Error, None, None)
//!     .await
//!     .unwrap();
//! assert!(response.is_skipped());
//!
//! assert!(client.close(Some(Duration::from_secs(2))).await);
//! # }
//! ```
//!
//! # Logging
//!
//! Every decision the pipeline takes is logged through the [`log`] crate on
//! the `sentry` target at debug level.
//!
//! # Features
//!
//! - `feature = "test"`: Activates the [`test`] module, which can be used to
//!   write integration tests. It comes with a test transport and a test
//!   backend which record everything the pipeline hands them.
//!
//! [Sentry]: https://sentry.io/
//! [tokio]: https://tokio.rs/
//! [`log`]: https://docs.rs/log
//! [`test`]: test/index.html

#![doc(html_favicon_url = "https://sentry-brand.storage.googleapis.com/favicon.ico")]
#![doc(html_logo_url = "https://sentry-brand.storage.googleapis.com/sentry-glyph-black.png")]
#![warn(missing_docs)]

// macros; these need to be first to be used by other modules
#[macro_use]
mod macros;

mod backend;
mod buffer;
mod client;
mod clientoptions;
mod constants;
mod defaults;
mod error;
pub mod filters;
mod hint;
mod hub;
mod integration;
mod scope;
mod stack;
mod transport;

// public api or exports from this crate
pub use crate::backend::{Backend, StdBackend};
pub use crate::buffer::{Delivery, DeliveryBuffer};
pub use crate::client::Client;
pub use crate::clientoptions::{BeforeBreadcrumbCallback, BeforeSendCallback, ClientOptions};
pub use crate::constants::{MAX_BREADCRUMBS, VERSION};
pub use crate::defaults::{apply_defaults, server_name};
pub use crate::error::{event_from_error, parse_type_from_debug, BoxError, CaptureError};
pub use crate::filters::{FilterOptions, FilterReason, InboundFilters, Pattern};
pub use crate::hint::{BreadcrumbHint, EventHint};
pub use crate::hub::{Hub, ScopeGuard};
pub use crate::integration::Integration;
pub use crate::scope::{EventProcessor, Scope};
pub use crate::transport::{DropReason, Response, Status, Transport, TransportFactory};


// public api from other crates
#[doc(inline)]
pub use sentry_pipeline_types as types;
pub use sentry_pipeline_types::protocol::v7 as protocol;
pub use sentry_pipeline_types::protocol::v7::{Breadcrumb, Event, Level, User};
