use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};

use crate::constants::{DEFAULT_BUFFER_SIZE, DEFAULT_MAX_VALUE_LENGTH, MAX_BREADCRUMBS};
use crate::filters::{FilterOptions, Pattern};
use crate::protocol::{Breadcrumb, Event};
use crate::{BreadcrumbHint, EventHint, Integration, TransportFactory};

/// Type alias for the `before_send` hook.
///
/// The hook always returns a future; synchronous hooks are wrapped in a
/// ready future by [`ClientOptions::set_before_send`].
pub type BeforeSendCallback = Arc<
    dyn Fn(Event<'static>, Option<&EventHint>) -> BoxFuture<'static, Option<Event<'static>>>
        + Send
        + Sync,
>;

fn before_send_callback<F>(f: F) -> BeforeSendCallback
where
    F: Fn(Event<'static>, Option<&EventHint>) -> BoxFuture<'static, Option<Event<'static>>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// Type alias for the `before_breadcrumb` hook.
pub type BeforeBreadcrumbCallback =
    Arc<dyn Fn(Breadcrumb, Option<&BreadcrumbHint>) -> Option<Breadcrumb> + Send + Sync>;

/// Configuration settings for the client.
///
/// # Examples
///
/// ```
/// let _options = sentry_pipeline::ClientOptions {
///     sample_rate: 0.5,
///     ..Default::default()
/// };
/// ```
#[derive(Clone)]
pub struct ClientOptions {
    // Common options
    /// Whether the client captures anything at all. (defaults to true)
    pub enabled: bool,
    /// The release to be sent with events.
    pub release: Option<Cow<'static, str>>,
    /// The distribution of the release.
    pub dist: Option<Cow<'static, str>>,
    /// The environment to be sent with events.
    pub environment: Option<Cow<'static, str>>,
    /// The server name to be reported.
    pub server_name: Option<Cow<'static, str>>,
    /// The sample rate for event submission. (0.0 - 1.0, defaults to 1.0)
    pub sample_rate: f32,
    /// Maximum number of breadcrumbs. (defaults to 100, capped at 100)
    pub max_breadcrumbs: usize,
    /// Messages and exception values are truncated to this many characters.
    /// (defaults to 250)
    pub max_value_length: usize,
    // Inbound filter options
    /// Errors whose message matches one of these patterns are not sent.
    pub ignore_errors: Vec<Pattern>,
    /// Errors raised from a URL matching one of these patterns are not sent.
    pub blacklist_urls: Vec<Pattern>,
    /// If set, only errors raised from a URL matching one of these patterns
    /// are sent.
    pub whitelist_urls: Vec<Pattern>,
    // Integration options
    /// A list of integrations to enable.
    pub integrations: Vec<Arc<dyn Integration>>,
    /// Whether to add default integrations.
    ///
    /// This only controls whether [`InboundFilters`] is registered as an
    /// integration, and so whether it shows up in the SDK info and in
    /// `Client::get_integration`.  The client applies the filter lists either
    /// way.
    ///
    /// [`InboundFilters`]: crate::InboundFilters
    pub default_integrations: bool,
    // Hooks
    /// Callback that is executed before event sending.
    pub before_send: Option<BeforeSendCallback>,
    /// Callback that is executed for each Breadcrumb being added.
    pub before_breadcrumb: Option<BeforeBreadcrumbCallback>,
    // Transport options
    /// The transport to use.
    ///
    /// This is typically either a boxed function taking the client options by
    /// reference and returning a `Transport`, or a boxed `Arc<Transport>`.
    pub transport: Option<Arc<dyn TransportFactory>>,
    /// How many deliveries may be in flight at once. `None` for no limit.
    /// (defaults to 30)
    pub buffer_size: Option<usize>,
    /// How long `Hub::close` waits for pending deliveries when no timeout is
    /// given. (defaults to 2 seconds)
    pub shutdown_timeout: Duration,
}

impl ClientOptions {
    /// Creates new Options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates new Options and immediately configures them.
    pub fn configure<F>(f: F) -> Self
    where
        F: FnOnce(&mut ClientOptions) -> &mut ClientOptions,
    {
        let mut opts = Self::new();
        f(&mut opts);
        opts
    }

    /// Set a callback that is executed before event sending.
    ///
    /// Returning `None` discards the event.
    pub fn set_before_send<F>(&mut self, before_send: F) -> &mut Self
    where
        F: Fn(Event<'static>, Option<&EventHint>) -> Option<Event<'static>>
            + Send
            + Sync
            + 'static,
    {
        self.before_send = Some(before_send_callback(move |event, hint| {
            future::ready(before_send(event, hint)).boxed()
        }));
        self
    }

    /// Set an asynchronous callback that is executed before event sending.
    ///
    /// The callback only gets to look at the hint synchronously; the future
    /// it returns must be `'static`.
    pub fn set_before_send_async<F, Fut>(&mut self, before_send: F) -> &mut Self
    where
        F: Fn(Event<'static>, Option<&EventHint>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Event<'static>>> + Send + 'static,
    {
        self.before_send = Some(before_send_callback(move |event, hint| {
            before_send(event, hint).boxed()
        }));
        self
    }

    /// Set a callback that is executed for each Breadcrumb being added.
    pub fn set_before_breadcrumb<F>(&mut self, before_breadcrumb: F) -> &mut Self
    where
        F: Fn(Breadcrumb, Option<&BreadcrumbHint>) -> Option<Breadcrumb> + Send + Sync + 'static,
    {
        self.before_breadcrumb = Some(Arc::new(before_breadcrumb));
        self
    }

    /// The transport to use.
    pub fn set_transport<F>(&mut self, transport: F) -> &mut Self
    where
        F: TransportFactory + 'static,
    {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets all three inbound filter lists at once.
    pub fn set_filters(&mut self, filters: FilterOptions) -> &mut Self {
        self.ignore_errors = filters.ignore_errors;
        self.blacklist_urls = filters.blacklist_urls;
        self.whitelist_urls = filters.whitelist_urls;
        self
    }

    /// The inbound filter lists configured on these options.
    pub fn filters(&self) -> FilterOptions {
        FilterOptions {
            ignore_errors: self.ignore_errors.clone(),
            blacklist_urls: self.blacklist_urls.clone(),
            whitelist_urls: self.whitelist_urls.clone(),
        }
    }

    /// The effective breadcrumb limit.
    pub fn breadcrumb_limit(&self) -> usize {
        self.max_breadcrumbs.min(MAX_BREADCRUMBS)
    }

    /// Adds a configured integration to the options.
    ///
    /// # Examples
    ///
    /// ```
    /// struct MyIntegration;
    ///
    /// impl sentry_pipeline::Integration for MyIntegration {}
    ///
    /// let options = sentry_pipeline::ClientOptions::new().add_integration(MyIntegration);
    /// assert_eq!(options.integrations.len(), 1);
    /// ```
    pub fn add_integration<I: Integration>(mut self, integration: I) -> Self {
        self.integrations.push(Arc::new(integration));
        self
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Debug)]
        struct BeforeSend;
        let before_send = self.before_send.as_ref().map(|_| BeforeSend);
        #[derive(Debug)]
        struct BeforeBreadcrumb;
        let before_breadcrumb = self.before_breadcrumb.as_ref().map(|_| BeforeBreadcrumb);
        #[derive(Debug)]
        struct TransportFactory;
        let transport = self.transport.as_ref().map(|_| TransportFactory);

        let integrations: Vec<_> = self.integrations.iter().map(|i| i.name()).collect();

        f.debug_struct("ClientOptions")
            .field("enabled", &self.enabled)
            .field("release", &self.release)
            .field("dist", &self.dist)
            .field("environment", &self.environment)
            .field("server_name", &self.server_name)
            .field("sample_rate", &self.sample_rate)
            .field("max_breadcrumbs", &self.max_breadcrumbs)
            .field("max_value_length", &self.max_value_length)
            .field("ignore_errors", &self.ignore_errors)
            .field("blacklist_urls", &self.blacklist_urls)
            .field("whitelist_urls", &self.whitelist_urls)
            .field("integrations", &integrations)
            .field("default_integrations", &self.default_integrations)
            .field("before_send", &before_send)
            .field("before_breadcrumb", &before_breadcrumb)
            .field("transport", &transport)
            .field("buffer_size", &self.buffer_size)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

impl Default for ClientOptions {
    fn default() -> ClientOptions {
        ClientOptions {
            enabled: true,
            release: None,
            dist: None,
            environment: None,
            server_name: None,
            sample_rate: 1.0,
            max_breadcrumbs: MAX_BREADCRUMBS,
            max_value_length: DEFAULT_MAX_VALUE_LENGTH,
            ignore_errors: vec![],
            blacklist_urls: vec![],
            whitelist_urls: vec![],
            integrations: vec![],
            default_integrations: true,
            before_send: None,
            before_breadcrumb: None,
            transport: None,
            buffer_size: Some(DEFAULT_BUFFER_SIZE),
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

impl From<FilterOptions> for ClientOptions {
    fn from(filters: FilterOptions) -> ClientOptions {
        let mut options = ClientOptions::default();
        options.set_filters(filters);
        options
    }
}
