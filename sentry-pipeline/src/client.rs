use std::any::TypeId;
use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::panic::RefUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::random;

use crate::backend::{Backend, StdBackend};
use crate::constants::SDK_INFO;
use crate::filters::InboundFilters;
use crate::protocol::{Breadcrumb, ClientSdkInfo, Event, Level};
use crate::types::random_uuid;
use crate::{
    BreadcrumbHint, CaptureError, ClientOptions, DropReason, EventHint, Integration, Response,
    Scope,
};

impl<T: Into<ClientOptions>> From<T> for Client {
    fn from(o: T) -> Client {
        Client::with_options(o.into())
    }
}

/// The capture pipeline.
///
/// The client turns errors, messages and prebuilt events into events, merges
/// scope data into them, and decides whether they are sent.  Every capture
/// runs through the same stages, in order:
///
/// 1. the [`Backend`] creates the event,
/// 2. client defaults, the scope and integration processors are applied,
/// 3. the event is sampled according to `sample_rate`,
/// 4. `before_send` gets to modify or discard it,
/// 5. the [`InboundFilters`] decide whether it is noise,
/// 6. the backend sends it from within its delivery buffer.
///
/// Events dropped along the way resolve with a skipped [`Response`] that
/// names the [`DropReason`]; only backend and transport failures resolve as
/// errors.
///
/// # Examples
///
/// ```
/// use sentry_pipeline::{Client, ClientOptions, Level};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let client = Client::from(ClientOptions::default());
/// assert!(client.install());
/// let response = client
///     .capture_message("Hello World!", Level::Info, None, None)
///     .await
///     .unwrap();
/// // without a transport nothing is actually sent
/// assert!(response.is_skipped());
/// # }
/// ```
pub struct Client {
    options: ClientOptions,
    backend: Arc<dyn Backend>,
    filters: Arc<InboundFilters>,
    integrations: Vec<(TypeId, Arc<dyn Integration>)>,
    installed: AtomicBool,
    pub(crate) sdk_info: ClientSdkInfo,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("options", &self.options)
            .field("filters", &self.filters)
            .field("installed", &self.is_installed())
            .finish()
    }
}

impl Client {
    /// Creates a new client for the given options, backed by a [`StdBackend`].
    pub fn with_options(options: ClientOptions) -> Client {
        let backend = Arc::new(StdBackend::new(&options));
        Client::with_backend(options, backend)
    }

    /// Creates a new client that drives the given backend.
    pub fn with_backend(mut options: ClientOptions, backend: Arc<dyn Backend>) -> Client {
        sentry_debug!(
            "[Client] Creating new client (enabled: {}, sample_rate: {})",
            options.enabled,
            options.sample_rate
        );

        let filters = Arc::new(InboundFilters::with_default_ignore_errors(
            backend.default_ignore_errors(),
        ));

        let mut sdk_info = SDK_INFO.clone();

        // NOTE: We do not filter out duplicate integrations based on their
        // TypeId.
        let mut integrations: Vec<(TypeId, Arc<dyn Integration>)> = vec![];
        if options.default_integrations {
            let default: Arc<dyn Integration> = filters.clone();
            integrations.push((TypeId::of::<InboundFilters>(), default));
        }
        integrations.extend(
            options
                .integrations
                .iter()
                .map(|integration| (integration.as_ref().type_id(), integration.clone())),
        );

        sentry_debug!("[Client] Setting up {} integrations", integrations.len());
        for (_, integration) in integrations.iter() {
            integration.setup(&mut options);
            sdk_info.integrations.push(integration.name().to_string());
        }

        Client {
            options,
            backend,
            filters,
            integrations,
            installed: AtomicBool::new(false),
            sdk_info,
        }
    }

    /// Performs the one time setup of the environment.
    ///
    /// Installs the backend and every integration, then freezes the inbound
    /// filter configuration.  Only the first call does anything and returns
    /// `true`; every later call returns `false`.
    pub fn install(&self) -> bool {
        if self.installed.swap(true, Ordering::SeqCst) {
            sentry_debug!("[Client] Already installed");
            return false;
        }

        if !self.backend.install() {
            sentry_debug!("[Client] Backend installation failed");
        }
        for (_, integration) in self.integrations.iter() {
            sentry_debug!("[Client] Installing integration: {}", integration.name());
            integration.setup_once();
        }
        self.filters.install(Some(self.options.filters()));

        sentry_debug!("[Client] Installation complete");
        true
    }

    /// Whether [`install`](Client::install) has run.
    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    /// Returns the options of this client.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Returns the backend of this client.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Returns the inbound filters of this client.
    pub fn filters(&self) -> &InboundFilters {
        &self.filters
    }

    /// Quick check to see if the client is enabled.
    pub fn is_enabled(&self) -> bool {
        self.options.enabled
    }

    /// Looks up an integration by name.
    ///
    /// If several integrations share a name the first one wins.
    pub fn get_integration(&self, name: &str) -> Option<Arc<dyn Integration>> {
        self.integrations
            .iter()
            .find(|(_, integration)| integration.name() == name)
            .map(|(_, integration)| integration.clone())
    }

    /// Looks up an integration by type.
    pub fn integration<I>(&self) -> Option<&I>
    where
        I: Integration,
    {
        let id = TypeId::of::<I>();
        let integration = &self.integrations.iter().find(|(iid, _)| *iid == id)?.1;
        integration.as_ref().as_any().downcast_ref()
    }

    /// Captures an error.
    pub async fn capture_exception(
        &self,
        exception: &(dyn Error + Send + Sync),
        hint: Option<&EventHint>,
        scope: Option<&Scope>,
    ) -> Result<Response, CaptureError> {
        if !self.is_enabled() {
            return Ok(self.skip(DropReason::Disabled));
        }
        let event = self.backend.event_from_exception(exception, hint).await?;
        self.process_event(event, hint, scope).await
    }

    /// Captures a message.
    pub async fn capture_message(
        &self,
        message: &str,
        level: Level,
        hint: Option<&EventHint>,
        scope: Option<&Scope>,
    ) -> Result<Response, CaptureError> {
        if !self.is_enabled() {
            return Ok(self.skip(DropReason::Disabled));
        }
        let event = self.backend.event_from_message(message, level, hint).await?;
        self.process_event(event, hint, scope).await
    }

    /// Captures a prebuilt event.
    pub async fn capture_event(
        &self,
        event: Event<'static>,
        hint: Option<&EventHint>,
        scope: Option<&Scope>,
    ) -> Result<Response, CaptureError> {
        if !self.is_enabled() {
            return Ok(self.skip(DropReason::Disabled));
        }
        self.process_event(event, hint, scope).await
    }

    async fn process_event(
        &self,
        event: Event<'static>,
        hint: Option<&EventHint>,
        scope: Option<&Scope>,
    ) -> Result<Response, CaptureError> {
        let Some(mut event) = self.prepare_event(event, hint, scope) else {
            return Ok(self.skip(DropReason::EventProcessor));
        };
        let event_id = event.event_id;

        if !self.sample_should_send(self.options.sample_rate) {
            sentry_debug!(
                "[Client] Event {} dropped due to sampling (rate: {})",
                event_id,
                self.options.sample_rate
            );
            return Ok(self.skip(DropReason::SampleRate));
        }

        if let Some(ref func) = self.options.before_send {
            event = match func(event, hint).await {
                Some(event) => event,
                None => {
                    sentry_debug!("[Client] before_send callback dropped event {}", event_id);
                    return Ok(self.skip(DropReason::BeforeSend));
                }
            };
        }

        if let Some(reason) = self.filters.drop_reason(&event) {
            sentry_debug!("[Client] Event {} dropped: {}", event_id, reason);
            return Ok(self.skip(DropReason::InboundFilter(reason)));
        }

        sentry_debug!("[Client] Sending event {}", event_id);
        let delivery = self.backend.buffer().add(self.backend.send_event(event));
        let mut response = delivery.await?;
        if response.event_id.is_none() && !response.is_skipped() {
            response.event_id = Some(event_id);
        }
        Ok(response)
    }

    fn skip(&self, reason: DropReason) -> Response {
        sentry_debug!("[Client] Event skipped: {}", reason);
        Response::skipped(reason)
    }

    /// Prepares an event for transmission to sentry.
    ///
    /// Fills in client defaults, truncates long values, applies the scope and
    /// runs the integration processors.  Returns `None` if a processor
    /// discarded the event.
    pub fn prepare_event(
        &self,
        mut event: Event<'static>,
        hint: Option<&EventHint>,
        scope: Option<&Scope>,
    ) -> Option<Event<'static>> {
        // event_id and sdk_info are set before the processors run so that the
        // processors can poke around in that data.
        if let Some(event_id) = hint.and_then(|hint| hint.event_id) {
            event.event_id = event_id;
        } else if event.event_id.is_nil() {
            event.event_id = random_uuid();
        }

        if event.sdk.is_none() {
            // NOTE: we need to clone here because `Event` must be `'static`
            event.sdk = Some(Cow::Owned(self.sdk_info.clone()));
        }

        if event.release.is_none() {
            event.release.clone_from(&self.options.release);
        }
        if event.dist.is_none() {
            event.dist.clone_from(&self.options.dist);
        }
        if event.environment.is_none() {
            event.environment.clone_from(&self.options.environment);
        }
        if event.server_name.is_none() {
            event.server_name.clone_from(&self.options.server_name);
        }
        if &event.platform == "other" {
            event.platform = "native".into();
        }

        let max_length = self.options.max_value_length;
        if let Some(ref mut message) = event.message {
            truncate_value(message, max_length);
        }
        for exception in event.exception.iter_mut() {
            if let Some(ref mut value) = exception.value {
                truncate_value(value, max_length);
            }
        }

        if let Some(scope) = scope {
            event = scope.apply_to_event(event)?;
        }

        // the event may bring its own breadcrumbs; keep the newest
        let limit = self.options.breadcrumb_limit();
        let excess = event.breadcrumbs.len().saturating_sub(limit);
        if excess > 0 {
            event.breadcrumbs.values.drain(..excess);
        }

        for (_, integration) in self.integrations.iter() {
            let id = event.event_id;
            event = match integration.process_event(event, &self.options) {
                Some(event) => event,
                None => {
                    sentry_debug!(
                        "[Client] Integration '{}' dropped event {}",
                        integration.name(),
                        id
                    );
                    return None;
                }
            }
        }

        Some(event)
    }

    /// Records a breadcrumb on the given scope.
    ///
    /// `before_breadcrumb` runs first and may modify or discard the
    /// breadcrumb, then the backend may veto it.  If the scope then holds
    /// more than the configured maximum, the oldest breadcrumbs are evicted.
    /// Returns whether the breadcrumb was recorded.
    pub fn add_breadcrumb(
        &self,
        breadcrumb: Breadcrumb,
        hint: Option<&BreadcrumbHint>,
        scope: &mut Scope,
    ) -> bool {
        let limit = self.options.breadcrumb_limit();
        if !self.is_enabled() || limit == 0 {
            return false;
        }

        let breadcrumb = match self.options.before_breadcrumb {
            Some(ref callback) => match callback(breadcrumb, hint) {
                Some(breadcrumb) => breadcrumb,
                None => {
                    sentry_debug!("[Client] before_breadcrumb callback dropped breadcrumb");
                    return false;
                }
            },
            None => breadcrumb,
        };

        if !self.backend.store_breadcrumb(&breadcrumb) {
            sentry_debug!("[Client] Backend kept breadcrumb off the scope");
            return false;
        }

        let breadcrumbs = Arc::make_mut(&mut scope.breadcrumbs);
        breadcrumbs.push_back(breadcrumb);
        while breadcrumbs.len() > limit {
            breadcrumbs.pop_front();
        }
        true
    }

    /// Waits for all pending deliveries to settle.
    ///
    /// Without a timeout this waits for as long as it takes.
    pub async fn flush(&self, timeout: Option<Duration>) -> bool {
        sentry_debug!("[Client] Flushing pending deliveries");
        self.backend.buffer().drain(timeout).await
    }

    /// Waits for all pending deliveries to settle, for graceful shutdown.
    ///
    /// This returns `true` if the buffer was drained in the given time or
    /// `false` if not.  Without a timeout this waits for as long as it takes
    /// and returns `true`.  Deliveries that are still running when the
    /// timeout expires are not cancelled.
    pub async fn close(&self, timeout: Option<Duration>) -> bool {
        sentry_debug!("[Client] Closing client (timeout: {:?})", timeout);
        self.backend.buffer().drain(timeout).await
    }

    /// Returns a random boolean with a probability defined
    /// by rate
    pub fn sample_should_send(&self, rate: f32) -> bool {
        if rate >= 1.0 {
            true
        } else if rate <= 0.0 {
            false
        } else {
            random::<f32>() < rate
        }
    }
}

/// Truncates a value to `max_length` characters, marking the cut with `...`.
///
/// A `max_length` of zero disables truncation.
fn truncate_value(value: &mut String, max_length: usize) {
    if max_length == 0 {
        return;
    }
    if let Some((idx, _)) = value.char_indices().nth(max_length) {
        value.truncate(idx);
        value.push_str("...");
    }
}

// Make this unwind safe. It's not out of the box because of the
// callbacks inside `ClientOptions`, and the contained Integrations
impl RefUnwindSafe for Client {}
