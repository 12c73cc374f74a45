//! Inbound filters that discard noise before it reaches the transport.
//!
//! Three pattern lists decide whether an event is dropped:
//!
//! * `ignore_errors` is matched against the event message, or against
//!   `"<type>: <value>"` of the first exception when there is no message.
//! * `blacklist_urls` is matched against the filename of the innermost stack
//!   frame.  A match drops the event.
//! * `whitelist_urls` is matched against the same filename.  If it is
//!   configured and nothing matches, the event is dropped.
//!
//! Events that carry no usable frame are never dropped by the URL lists.
//! The blacklist always wins over the whitelist.
//!
//! # Examples
//!
//! ```
//! use sentry_pipeline::filters::{FilterOptions, Pattern};
//! use sentry_pipeline::protocol::Event;
//!
//! let options = FilterOptions {
//!     ignore_errors: vec![Pattern::from("ResizeObserver")],
//!     ..Default::default()
//! };
//! let event = Event {
//!     message: Some("ResizeObserver loop limit exceeded".into()),
//!     ..Default::default()
//! };
//! assert!(options.should_drop_event(&event));
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::protocol::Event;
use crate::Integration;

/// A single matcher in one of the filter lists.
#[derive(Clone, Debug)]
pub enum Pattern {
    /// Matches any value containing this string.
    Literal(String),
    /// Matches any value the expression finds a match in.
    ///
    /// The expression is not implicitly anchored; use `^` and `$` to require
    /// a full match.
    Regex(Regex),
}

impl Pattern {
    /// Compiles a regular expression pattern.
    pub fn regex(expr: &str) -> Result<Pattern, regex::Error> {
        Regex::new(expr).map(Pattern::Regex)
    }

    /// Checks whether the pattern matches the given value.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Pattern::Literal(needle) => value.contains(needle.as_str()),
            Pattern::Regex(regex) => regex.is_match(value),
        }
    }
}

impl From<&str> for Pattern {
    fn from(value: &str) -> Self {
        Pattern::Literal(value.to_owned())
    }
}

impl From<String> for Pattern {
    fn from(value: String) -> Self {
        Pattern::Literal(value)
    }
}

impl From<Regex> for Pattern {
    fn from(regex: Regex) -> Self {
        Pattern::Regex(regex)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(needle) => write!(f, "{:?}", needle),
            Pattern::Regex(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

fn matches_any(patterns: &[Pattern], value: &str) -> bool {
    patterns.iter().any(|pattern| pattern.matches(value))
}

/// Why an event was discarded by the inbound filters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterReason {
    /// The message or exception matched `ignore_errors`.
    IgnoredError,
    /// The innermost frame matched `blacklist_urls`.
    BlacklistedUrl(String),
    /// `whitelist_urls` is configured and the innermost frame did not match it.
    NotWhitelistedUrl(String),
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterReason::IgnoredError => write!(f, "matched by `ignore_errors`"),
            FilterReason::BlacklistedUrl(url) => {
                write!(f, "matched by `blacklist_urls` (url: {})", url)
            }
            FilterReason::NotWhitelistedUrl(url) => {
                write!(f, "not matched by `whitelist_urls` (url: {})", url)
            }
        }
    }
}

/// The pattern lists used to filter events.
#[derive(Clone, Debug, Default)]
pub struct FilterOptions {
    /// Patterns matched against the message or the first exception.
    pub ignore_errors: Vec<Pattern>,
    /// Patterns matched against the innermost frame's filename; a match drops.
    pub blacklist_urls: Vec<Pattern>,
    /// Patterns matched against the innermost frame's filename; if non-empty,
    /// only matching events are kept.
    pub whitelist_urls: Vec<Pattern>,
}

impl FilterOptions {
    /// Checks whether the event's message or first exception is ignored.
    pub fn is_ignored_error(&self, event: &Event<'_>) -> bool {
        if self.ignore_errors.is_empty() {
            return false;
        }
        possible_event_messages(event)
            .iter()
            .any(|message| matches_any(&self.ignore_errors, message))
    }

    /// Checks whether the event originates from a blacklisted URL.
    ///
    /// Events without a locatable frame are never blacklisted.
    pub fn is_blacklisted_url(&self, event: &Event<'_>) -> bool {
        match event_url(event) {
            Some(url) => matches_any(&self.blacklist_urls, url),
            None => false,
        }
    }

    /// Checks whether the event originates from a whitelisted URL.
    ///
    /// This holds for every event when no whitelist is configured, and for
    /// events without a locatable frame.
    pub fn is_whitelisted_url(&self, event: &Event<'_>) -> bool {
        if self.whitelist_urls.is_empty() {
            return true;
        }
        match event_url(event) {
            Some(url) => matches_any(&self.whitelist_urls, url),
            None => true,
        }
    }

    /// Returns the first rule that discards the event, if any.
    pub fn drop_reason(&self, event: &Event<'_>) -> Option<FilterReason> {
        if self.is_ignored_error(event) {
            return Some(FilterReason::IgnoredError);
        }
        let url = event_url(event)?;
        if matches_any(&self.blacklist_urls, url) {
            Some(FilterReason::BlacklistedUrl(url.to_owned()))
        } else if !self.whitelist_urls.is_empty() && !matches_any(&self.whitelist_urls, url) {
            Some(FilterReason::NotWhitelistedUrl(url.to_owned()))
        } else {
            None
        }
    }

    /// Checks whether the event should be discarded.
    pub fn should_drop_event(&self, event: &Event<'_>) -> bool {
        self.is_ignored_error(event)
            || self.is_blacklisted_url(event)
            || !self.is_whitelisted_url(event)
    }
}

/// The strings `ignore_errors` is matched against.
///
/// A non-empty message takes precedence; otherwise the first exception is
/// rendered as `"<type>: <value>"`.
fn possible_event_messages<'a>(event: &'a Event<'_>) -> Vec<Cow<'a, str>> {
    if let Some(message) = event.message.as_deref().filter(|m| !m.is_empty()) {
        return vec![Cow::Borrowed(message)];
    }
    match event.exception.first() {
        Some(exc) => vec![Cow::Owned(format!(
            "{}: {}",
            exc.ty,
            exc.value.as_deref().unwrap_or("")
        ))],
        None => vec![],
    }
}

/// Finds the filename of the innermost frame of an event.
///
/// The top level stacktrace is preferred; otherwise the stacktrace of the
/// last exception is used.  Returns `None` if no frame with a filename can
/// be reached.
pub fn event_url<'a>(event: &'a Event<'_>) -> Option<&'a str> {
    let stacktrace = match event.stacktrace {
        Some(ref stacktrace) => stacktrace,
        None => event.exception.last()?.stacktrace.as_ref()?,
    };
    stacktrace.last_frame()?.filename.as_deref()
}

/// The inbound filters integration.
///
/// Holds the frozen [`FilterOptions`] of a client.  Until [`install`] is
/// called nothing is filtered.
///
/// [`install`]: InboundFilters::install
#[derive(Debug, Default)]
pub struct InboundFilters {
    default_ignore_errors: Vec<Pattern>,
    options: OnceLock<FilterOptions>,
}

impl InboundFilters {
    /// Creates filters without any built-in ignore patterns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates filters that prepend `defaults` to the user's `ignore_errors`.
    pub fn with_default_ignore_errors<I>(defaults: I) -> Self
    where
        I: IntoIterator<Item = Pattern>,
    {
        InboundFilters {
            default_ignore_errors: defaults.into_iter().collect(),
            options: OnceLock::new(),
        }
    }

    /// Freezes the filter configuration.
    ///
    /// The built-in ignore patterns are merged in front of the user's.  Only
    /// the first call has an effect; it returns `true`, every later call
    /// returns `false` and leaves the configuration untouched.
    pub fn install(&self, options: Option<FilterOptions>) -> bool {
        let mut installed = false;
        self.options.get_or_init(|| {
            installed = true;
            let mut options = options.unwrap_or_default();
            let mut ignore_errors = self.default_ignore_errors.clone();
            ignore_errors.append(&mut options.ignore_errors);
            options.ignore_errors = ignore_errors;
            sentry_debug!(
                "[InboundFilters] Installed with {} ignore, {} blacklist and {} whitelist patterns",
                options.ignore_errors.len(),
                options.blacklist_urls.len(),
                options.whitelist_urls.len()
            );
            options
        });
        installed
    }

    /// Whether the configuration has been frozen.
    pub fn is_installed(&self) -> bool {
        self.options.get().is_some()
    }

    /// The frozen configuration, if installed.
    pub fn options(&self) -> Option<&FilterOptions> {
        self.options.get()
    }

    /// Returns the rule that discards the event, if any.
    pub fn drop_reason(&self, event: &Event<'_>) -> Option<FilterReason> {
        self.options.get()?.drop_reason(event)
    }

    /// Checks whether the event should be discarded.
    pub fn should_drop_event(&self, event: &Event<'_>) -> bool {
        self.options
            .get()
            .is_some_and(|options| options.should_drop_event(event))
    }
}

impl Integration for InboundFilters {
    fn name(&self) -> &'static str {
        "InboundFilters"
    }
}
