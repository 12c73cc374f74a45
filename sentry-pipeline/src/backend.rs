use std::error::Error;
use std::fmt;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};

use crate::filters::Pattern;
use crate::protocol::{Breadcrumb, Event, Level};
use crate::{
    event_from_error, CaptureError, ClientOptions, DeliveryBuffer, EventHint, Response, Scope,
    Status, Transport,
};

/// The platform specific half of a client.
///
/// A backend turns raw inputs into events and submits events to a
/// transport.  The [`Client`](crate::Client) drives it and decides what to
/// send; the backend decides how.
pub trait Backend: Send + Sync + 'static {
    /// Creates an event from an error.
    fn event_from_exception<'a>(
        &'a self,
        exception: &'a (dyn Error + Send + Sync + 'a),
        hint: Option<&'a EventHint>,
    ) -> BoxFuture<'a, Result<Event<'static>, CaptureError>>;

    /// Creates an event from a plain message.
    fn event_from_message<'a>(
        &'a self,
        message: &'a str,
        level: Level,
        hint: Option<&'a EventHint>,
    ) -> BoxFuture<'a, Result<Event<'static>, CaptureError>>;

    /// Submits an event.
    ///
    /// The returned future is run inside the backend's [`buffer`].
    ///
    /// [`buffer`]: Backend::buffer
    fn send_event(
        &self,
        event: Event<'static>,
    ) -> BoxFuture<'static, Result<Response, CaptureError>>;

    /// Called before a breadcrumb is recorded on a scope.
    ///
    /// Returning `false` keeps the breadcrumb off the scope, for backends
    /// that manage their own breadcrumb history.
    fn store_breadcrumb(&self, breadcrumb: &Breadcrumb) -> bool {
        let _ = breadcrumb;
        true
    }

    /// Called whenever a hub's scope changed.
    fn store_scope(&self, scope: &Scope) {
        let _ = scope;
    }

    /// The buffer deliveries of this backend run in.
    fn buffer(&self) -> &DeliveryBuffer<Response>;

    /// One time setup of the environment, called from `Client::install`.
    ///
    /// Returns whether setup succeeded.
    fn install(&self) -> bool {
        true
    }

    /// Ignore patterns that are merged in front of the user's `ignore_errors`.
    fn default_ignore_errors(&self) -> Vec<Pattern> {
        vec![]
    }
}

/// The generic backend for `std::error::Error` based applications.
///
/// Errors are converted with [`event_from_error`] and events are handed to
/// the transport configured on the [`ClientOptions`].  Without a transport
/// every event resolves as skipped.
pub struct StdBackend {
    transport: Option<Arc<dyn Transport>>,
    buffer: DeliveryBuffer<Response>,
}

impl fmt::Debug for StdBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdBackend")
            .field("transport", &self.transport.as_ref().map(|_| "Transport"))
            .field("buffer", &self.buffer)
            .finish()
    }
}

impl StdBackend {
    /// Creates the backend, constructing the transport from the options.
    pub fn new(options: &ClientOptions) -> StdBackend {
        let transport = options
            .transport
            .as_ref()
            .map(|factory| factory.create_transport(options));
        if transport.is_none() {
            sentry_debug!("[StdBackend] No transport configured, events will be skipped");
        }
        StdBackend {
            transport,
            buffer: DeliveryBuffer::new(options.buffer_size),
        }
    }
}

impl Backend for StdBackend {
    fn event_from_exception<'a>(
        &'a self,
        exception: &'a (dyn Error + Send + Sync + 'a),
        _hint: Option<&'a EventHint>,
    ) -> BoxFuture<'a, Result<Event<'static>, CaptureError>> {
        future::ready(Ok(event_from_error(exception))).boxed()
    }

    fn event_from_message<'a>(
        &'a self,
        message: &'a str,
        level: Level,
        _hint: Option<&'a EventHint>,
    ) -> BoxFuture<'a, Result<Event<'static>, CaptureError>> {
        let event = Event {
            message: Some(message.to_owned()),
            level,
            ..Default::default()
        };
        future::ready(Ok(event)).boxed()
    }

    fn send_event(
        &self,
        event: Event<'static>,
    ) -> BoxFuture<'static, Result<Response, CaptureError>> {
        match self.transport {
            Some(ref transport) => transport.send_event(event),
            None => {
                sentry_debug!("[StdBackend] Skipping event {}", event.event_id);
                future::ready(Ok(Response::new(Status::Skipped, None))).boxed()
            }
        }
    }

    fn buffer(&self) -> &DeliveryBuffer<Response> {
        &self.buffer
    }
}
