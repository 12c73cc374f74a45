use std::error::Error;

use thiserror::Error;

use crate::protocol::{Event, Exception, Level};

/// A boxed error as produced by backends and transports.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// The ways a capture call can fail.
///
/// Events that are intentionally dropped (sampling, `before_send`, inbound
/// filters) are *not* errors; they resolve to a skipped
/// [`Response`](crate::Response) instead.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The backend failed to turn the input into an event.
    #[error("failed to create event")]
    Backend(#[source] BoxError),
    /// The transport failed to submit the event.
    #[error("failed to send event")]
    Transport(#[source] BoxError),
    /// The delivery task went away before it settled, either because it
    /// panicked or because its runtime was shut down.
    #[error("delivery was aborted before it settled")]
    Aborted,
}

impl CaptureError {
    /// Wraps a backend failure.
    pub fn backend<E: Into<BoxError>>(err: E) -> Self {
        CaptureError::Backend(err.into())
    }

    /// Wraps a transport failure.
    pub fn transport<E: Into<BoxError>>(err: E) -> Self {
        CaptureError::Transport(err.into())
    }
}

/// Create a sentry `Event` from a `std::error::Error`.
///
/// A chain of errors will be resolved as well, and sorted oldest to newest, as
/// described on https://develop.sentry.dev/sdk/event-payloads/exception/.
///
/// # Examples
///
/// ```
/// use thiserror::Error;
///
/// #[derive(Debug, Error)]
/// #[error("inner")]
/// struct InnerError;
///
/// #[derive(Debug, Error)]
/// #[error("outer")]
/// struct OuterError(#[from] InnerError);
///
/// let event = sentry_pipeline::event_from_error(&OuterError(InnerError));
/// assert_eq!(event.level, sentry_pipeline::Level::Error);
/// assert_eq!(event.exception.len(), 2);
/// assert_eq!(&event.exception[0].ty, "InnerError");
/// assert_eq!(event.exception[0].value, Some("inner".into()));
/// assert_eq!(&event.exception[1].ty, "OuterError");
/// assert_eq!(event.exception[1].value, Some("outer".into()));
/// ```
pub fn event_from_error<E: Error + ?Sized>(err: &E) -> Event<'static> {
    let mut exceptions = vec![exception_from_error(err)];

    let mut source = err.source();
    while let Some(err) = source {
        exceptions.push(exception_from_error(err));
        source = err.source();
    }

    exceptions.reverse();
    Event {
        exception: exceptions.into(),
        level: Level::Error,
        ..Default::default()
    }
}

fn exception_from_error<E: Error + ?Sized>(err: &E) -> Exception {
    Exception {
        ty: parse_type_from_debug(err),
        value: Some(err.to_string()),
        ..Default::default()
    }
}

/// Parse the types name from `Debug` output.
///
/// # Examples
///
/// ```
/// use sentry_pipeline::parse_type_from_debug;
///
/// let err = "NaN".parse::<usize>().unwrap_err();
/// assert_eq!(&parse_type_from_debug(&err), "ParseIntError");
/// ```
pub fn parse_type_from_debug<D: std::fmt::Debug + ?Sized>(d: &D) -> String {
    let dbg = format!("{:#?}", d);

    dbg.split(&[' ', '(', '{', '\r', '\n'][..])
        .next()
        .unwrap_or(&dbg)
        .trim()
        .to_owned()
}

#[test]
fn test_parse_type_from_debug() {
    use parse_type_from_debug as parse;
    #[derive(Debug)]
    struct MyStruct;
    assert_eq!(&parse(&MyStruct), "MyStruct");

    let err = "NaN".parse::<usize>().unwrap_err();
    assert_eq!(&parse(&err), "ParseIntError");

    let err = CaptureError::Aborted;
    assert_eq!(&parse(&err), "Aborted");
}
