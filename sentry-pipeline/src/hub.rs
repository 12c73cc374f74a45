use std::error::Error;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::protocol::{Breadcrumb, Event, Level};
use crate::stack::Stack;
use crate::types::Uuid;
use crate::{BreadcrumbHint, CaptureError, Client, EventHint, Response, Scope};

/// A scope guard which is returned from [`Hub::push_scope`].
///
/// The pushed scope is popped again when the guard is dropped.
pub struct ScopeGuard(Option<(Hub, usize)>);

impl fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeGuard")
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Some((hub, depth)) = self.0.take() {
            let popped_depth = hub.with_stack_mut(|stack| {
                let popped_depth = stack.depth();
                stack.pop();
                popped_depth
            });
            // The lock is released before panicking so that other users of
            // the hub are not poisoned.
            if popped_depth != depth {
                panic!("Popped scope guard out of order");
            }
        }
    }
}

/// Manages a client together with a stack of scopes.
///
/// The hub is internally synchronized and cheap to clone; clones share the
/// same stack.  Capture calls take a snapshot of the topmost scope before
/// suspending, so scope changes made while an event is in flight do not
/// affect it.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use sentry_pipeline::{Client, ClientOptions, Hub, Level};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let hub = Hub::new(Some(Arc::new(Client::from(ClientOptions::default()))), Default::default());
/// hub.configure_scope(|scope| scope.set_tag("component", "worker"));
/// let response = hub.capture_message("hello", Level::Info).await.unwrap();
/// assert!(response.is_skipped());
/// # }
/// ```
#[derive(Clone)]
pub struct Hub(Arc<HubInner>);

struct HubInner {
    stack: RwLock<Stack>,
    last_event_id: RwLock<Option<Uuid>>,
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_stack(|stack| {
            f.debug_struct("Hub")
                .field("depth", &stack.depth())
                .field("top", stack.top())
                .finish()
        })
    }
}

impl Hub {
    fn with_stack<F: FnOnce(&Stack) -> R, R>(&self, f: F) -> R {
        let guard = self.0.stack.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn with_stack_mut<F: FnOnce(&mut Stack) -> R, R>(&self, f: F) -> R {
        let mut guard = self.0.stack.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Creates a new hub from the given client and scope.
    pub fn new(client: Option<Arc<Client>>, scope: Scope) -> Hub {
        Hub(Arc::new(HubInner {
            stack: RwLock::new(Stack::from_client_and_scope(client, scope)),
            last_event_id: RwLock::new(None),
        }))
    }

    /// Returns the currently bound client.
    pub fn client(&self) -> Option<Arc<Client>> {
        self.with_stack(|stack| stack.top().client.clone())
    }

    /// Binds a new client to the hub.
    pub fn bind_client(&self, client: Option<Arc<Client>>) {
        self.with_stack_mut(|stack| {
            stack.top_mut().client = client;
        })
    }

    /// Returns a copy of the topmost scope.
    pub fn scope(&self) -> Scope {
        self.with_stack(|stack| stack.top().scope.clone())
    }

    /// Invokes a function that can modify the current scope.
    ///
    /// The bound client's backend is told about the change afterwards.
    pub fn configure_scope<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Scope) -> R,
    {
        self.with_stack_mut(|stack| {
            let top = stack.top_mut();
            let rv = f(&mut top.scope);
            if let Some(ref client) = top.client {
                client.backend().store_scope(&top.scope);
            }
            rv
        })
    }

    /// Pushes a new scope.
    ///
    /// This returns a guard that when dropped will pop the scope again.
    pub fn push_scope(&self) -> ScopeGuard {
        self.with_stack_mut(|stack| {
            stack.push();
            ScopeGuard(Some((self.clone(), stack.depth())))
        })
    }

    /// Temporarily pushes a scope for a single call optionally reconfiguring it.
    pub fn with_scope<C, F, R>(&self, scope_config: C, callback: F) -> R
    where
        C: FnOnce(&mut Scope),
        F: FnOnce() -> R,
    {
        let _guard = self.push_scope();
        self.configure_scope(scope_config);
        callback()
    }

    /// Adds a new breadcrumb to the current scope.
    ///
    /// Does nothing if no client is bound.
    pub fn add_breadcrumb(&self, breadcrumb: Breadcrumb, hint: Option<&BreadcrumbHint>) {
        self.with_stack_mut(|stack| {
            let top = stack.top_mut();
            if let Some(ref client) = top.client {
                if client.add_breadcrumb(breadcrumb, hint, &mut top.scope) {
                    client.backend().store_scope(&top.scope);
                }
            }
        })
    }

    fn snapshot(&self) -> Option<(Arc<Client>, Scope)> {
        self.with_stack(|stack| {
            let top = stack.top();
            top.client
                .clone()
                .map(|client| (client, top.scope.clone()))
        })
    }

    fn record(&self, result: &Result<Response, CaptureError>) {
        if let Ok(Response {
            event_id: Some(event_id),
            ..
        }) = result
        {
            *self
                .0
                .last_event_id
                .write()
                .unwrap_or_else(PoisonError::into_inner) = Some(*event_id);
        }
    }

    /// Sends the event to the current client with the current scope.
    ///
    /// Without a bound client the event is skipped as if the client were
    /// disabled.
    pub async fn capture_event(&self, event: Event<'static>) -> Result<Response, CaptureError> {
        let Some((client, scope)) = self.snapshot() else {
            sentry_debug!("[Hub] No client bound, skipping event");
            return Ok(Response::skipped(crate::DropReason::Disabled));
        };
        let result = client.capture_event(event, None, Some(&scope)).await;
        self.record(&result);
        result
    }

    /// Captures an arbitrary message.
    pub async fn capture_message(
        &self,
        message: &str,
        level: Level,
    ) -> Result<Response, CaptureError> {
        let Some((client, scope)) = self.snapshot() else {
            return Ok(Response::skipped(crate::DropReason::Disabled));
        };
        let result = client.capture_message(message, level, None, Some(&scope)).await;
        self.record(&result);
        result
    }

    /// Captures an error with an optional hint.
    pub async fn capture_error(
        &self,
        error: &(dyn Error + Send + Sync),
        hint: Option<&EventHint>,
    ) -> Result<Response, CaptureError> {
        let Some((client, scope)) = self.snapshot() else {
            return Ok(Response::skipped(crate::DropReason::Disabled));
        };
        let result = client.capture_exception(error, hint, Some(&scope)).await;
        self.record(&result);
        result
    }

    /// Returns the last event id.
    pub fn last_event_id(&self) -> Option<Uuid> {
        *self
            .0
            .last_event_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Drains the bound client's deliveries.
    ///
    /// Without a timeout this waits for as long as `shutdown_timeout` in the
    /// client's options.  Returns `true` if there is no client.
    pub async fn close(&self, timeout: Option<Duration>) -> bool {
        match self.client() {
            Some(client) => {
                let timeout = timeout.unwrap_or(client.options().shutdown_timeout);
                client.close(Some(timeout)).await
            }
            None => true,
        }
    }
}
