use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::filters::FilterReason;
use crate::protocol::Event;
use crate::types::Uuid;
use crate::{CaptureError, ClientOptions};

/// The trait for transports.
///
/// A transport is responsible for sending events to Sentry.  It owns the
/// wire format, retries and rate limiting; the pipeline only awaits the
/// returned future inside its delivery buffer.
pub trait Transport: Send + Sync + 'static {
    /// Sends an event.
    fn send_event(
        &self,
        event: Event<'static>,
    ) -> BoxFuture<'static, Result<Response, CaptureError>>;
}

/// A factory creating transport instances.
///
/// Because options are potentially reused between different clients the
/// options do not actually contain a transport but a factory object that
/// can create transports instead.
///
/// The factory has a single method that creates a new arced transport.
/// Because transports can be wrapped in `Arc`s and those are clonable
/// any `Arc<Transport>` is also a valid transport factory.  This for
/// instance lets you put a `Arc<TestTransport>` directly into the options.
///
/// This is automatically implemented for all closures optionally taking
/// options and returning a boxed factory.
pub trait TransportFactory: Send + Sync {
    /// Given some options creates a transport.
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn(&ClientOptions) -> Arc<dyn Transport> + Clone + Send + Sync + 'static,
{
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport> {
        (*self)(options)
    }
}

impl<T: Transport> Transport for Arc<T> {
    fn send_event(
        &self,
        event: Event<'static>,
    ) -> BoxFuture<'static, Result<Response, CaptureError>> {
        (**self).send_event(event)
    }
}

impl<T: Transport> TransportFactory for Arc<T> {
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport> {
        let _options = options;
        self.clone()
    }
}

/// The outcome a transport reports for a submitted event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Status {
    /// The outcome is not known.
    #[default]
    Unknown,
    /// The event was not sent.
    Skipped,
    /// The event was accepted.
    Success,
    /// The event was rejected because of rate limits.
    RateLimit,
    /// The event was rejected as invalid.
    Invalid,
    /// Sending failed on the server side.
    Failed,
}

impl Status {
    /// Maps an HTTP status code to a status.
    pub fn from_http_code(code: u16) -> Status {
        match code {
            200..=299 => Status::Success,
            429 => Status::RateLimit,
            400..=499 => Status::Invalid,
            500..=599 => Status::Failed,
            _ => Status::Unknown,
        }
    }

    /// Whether this status means the event was accepted.
    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Unknown => "unknown",
            Status::Skipped => "skipped",
            Status::Success => "success",
            Status::RateLimit => "rate_limit",
            Status::Invalid => "invalid",
            Status::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why the pipeline decided not to send an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The client is disabled.
    Disabled,
    /// The event was not selected by `sample_rate`.
    SampleRate,
    /// An integration or scope event processor discarded the event.
    EventProcessor,
    /// `before_send` discarded the event.
    BeforeSend,
    /// The inbound filters discarded the event.
    InboundFilter(FilterReason),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Disabled => write!(f, "client is disabled"),
            DropReason::SampleRate => write!(f, "not selected by sample rate"),
            DropReason::EventProcessor => write!(f, "discarded by an event processor"),
            DropReason::BeforeSend => write!(f, "discarded by before_send"),
            DropReason::InboundFilter(reason) => write!(f, "inbound filter {}", reason),
        }
    }
}

/// The result of a capture call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Response {
    /// What happened to the event.
    pub status: Status,
    /// The id of the event, if one was sent.
    pub event_id: Option<Uuid>,
    /// Set when the pipeline dropped the event.
    pub reason: Option<DropReason>,
}

impl Response {
    /// A response for an event the transport handled.
    pub fn new(status: Status, event_id: Option<Uuid>) -> Self {
        Response {
            status,
            event_id,
            reason: None,
        }
    }

    /// A response for an event that never reached the transport.
    pub fn skipped(reason: DropReason) -> Self {
        Response {
            status: Status::Skipped,
            event_id: None,
            reason: Some(reason),
        }
    }

    /// Whether the event was dropped or otherwise not sent.
    pub fn is_skipped(&self) -> bool {
        self.status == Status::Skipped
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(200, Status::Success)]
    #[case(202, Status::Success)]
    #[case(413, Status::Invalid)]
    #[case(429, Status::RateLimit)]
    #[case(503, Status::Failed)]
    #[case(101, Status::Unknown)]
    fn test_status_from_http_code(#[case] code: u16, #[case] expected: Status) {
        assert_eq!(Status::from_http_code(code), expected);
    }

    #[test]
    fn test_skipped_response_carries_reason() {
        let response = Response::skipped(DropReason::InboundFilter(FilterReason::IgnoredError));
        assert!(response.is_skipped());
        assert_eq!(response.event_id, None);
        assert_eq!(
            response.reason.unwrap().to_string(),
            "inbound filter matched by `ignore_errors`"
        );
    }
}
