use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::protocol::{Breadcrumb, Event, Level, User, Value};

/// A callback that may modify or discard an event while the scope is applied.
pub type EventProcessor = Arc<dyn Fn(Event<'static>) -> Option<Event<'static>> + Send + Sync>;

/// Holds contextual data for the current scope.
///
/// The scope is an object that can be cloned efficiently and stores data that
/// is locally relevant to an event.  For instance the scope will hold recorded
/// breadcrumbs and similar information.
///
/// A capture call applies a snapshot of the scope to the event, so changes
/// made to the scope afterwards never show up in an event that is already
/// on its way.
///
/// The scope can be interacted with in two ways:
///
/// 1. the scope is routinely updated with information by functions such as
///    [`Client::add_breadcrumb`] which will modify the given scope.
/// 2. the topmost scope of a hub can also be configured through
///    [`Hub::configure_scope`].
///
/// [`Client::add_breadcrumb`]: crate::Client::add_breadcrumb
/// [`Hub::configure_scope`]: crate::Hub::configure_scope
#[derive(Clone, Default)]
pub struct Scope {
    pub(crate) level: Option<Level>,
    pub(crate) fingerprint: Option<Arc<[Cow<'static, str>]>>,
    pub(crate) transaction: Option<Arc<str>>,
    pub(crate) breadcrumbs: Arc<VecDeque<Breadcrumb>>,
    pub(crate) user: Option<Arc<User>>,
    pub(crate) extra: Arc<HashMap<String, Value>>,
    pub(crate) tags: Arc<HashMap<String, String>>,
    pub(crate) contexts: Arc<HashMap<String, Value>>,
    pub(crate) event_processors: Arc<Vec<EventProcessor>>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("level", &self.level)
            .field("fingerprint", &self.fingerprint)
            .field("transaction", &self.transaction)
            .field("breadcrumbs", &self.breadcrumbs)
            .field("user", &self.user)
            .field("extra", &self.extra)
            .field("tags", &self.tags)
            .field("contexts", &self.contexts)
            .field("event_processors", &self.event_processors.len())
            .finish()
    }
}

impl Scope {
    /// Clear the scope.
    ///
    /// By default a scope will inherit all values from the higher scope.
    /// In some situations this might not be what a user wants.  Calling
    /// this method will wipe all data contained within.
    pub fn clear(&mut self) {
        sentry_debug!("[Scope] Clearing all scope data");
        *self = Default::default();
    }

    /// Deletes current breadcrumbs from the scope.
    pub fn clear_breadcrumbs(&mut self) {
        let previous_count = self.breadcrumbs.len();
        self.breadcrumbs = Default::default();
        sentry_debug!("[Scope] Cleared {} breadcrumbs", previous_count);
    }

    /// The breadcrumbs recorded on this scope, oldest first.
    pub fn breadcrumbs(&self) -> &VecDeque<Breadcrumb> {
        &self.breadcrumbs
    }

    /// Sets a level override.
    pub fn set_level(&mut self, level: Option<Level>) {
        match (&self.level, &level) {
            (None, Some(new_level)) => {
                sentry_debug!("[Scope] Setting level override: {:?}", new_level)
            }
            (Some(old_level), Some(new_level)) if old_level != new_level => sentry_debug!(
                "[Scope] Changing level override: {:?} -> {:?}",
                old_level,
                new_level
            ),
            (Some(_), None) => sentry_debug!("[Scope] Removing level override"),
            _ => {}
        }
        self.level = level;
    }

    /// Sets the fingerprint.
    pub fn set_fingerprint(&mut self, fingerprint: Option<&[&str]>) {
        if let Some(fp) = fingerprint {
            sentry_debug!("[Scope] Setting fingerprint: {:?}", fp);
        } else {
            sentry_debug!("[Scope] Removing fingerprint");
        }
        self.fingerprint =
            fingerprint.map(|fp| fp.iter().map(|s| Cow::Owned((*s).into())).collect())
    }

    /// Sets the transaction.
    pub fn set_transaction(&mut self, transaction: Option<&str>) {
        if let Some(name) = transaction {
            sentry_debug!("[Scope] Setting transaction: {}", name);
        }
        self.transaction = transaction.map(Arc::from);
    }

    /// Sets the user for the current scope.
    pub fn set_user(&mut self, user: Option<User>) {
        match &user {
            Some(new_user) => sentry_debug!(
                "[Scope] Setting user: id={:?}, username={:?}",
                new_user.id,
                new_user.username
            ),
            None if self.user.is_some() => sentry_debug!("[Scope] Removing user"),
            None => {}
        }
        self.user = user.map(Arc::new);
    }

    /// Retrieves the user of the current scope.
    pub fn user(&self) -> Option<&User> {
        self.user.as_deref()
    }

    /// Sets a tag to a specific value.
    pub fn set_tag<V: ToString>(&mut self, key: &str, value: V) {
        let value = value.to_string();
        sentry_debug!("[Scope] Setting tag: {} = {}", key, value);
        Arc::make_mut(&mut self.tags).insert(key.to_string(), value);
    }

    /// Removes a tag.
    ///
    /// If the tag is not set, does nothing.
    pub fn remove_tag(&mut self, key: &str) {
        if Arc::make_mut(&mut self.tags).remove(key).is_some() {
            sentry_debug!("[Scope] Removed tag: {}", key);
        }
    }

    /// Sets a context for a key.
    pub fn set_context<C: Into<Value>>(&mut self, key: &str, value: C) {
        sentry_debug!("[Scope] Setting context: {}", key);
        Arc::make_mut(&mut self.contexts).insert(key.to_string(), value.into());
    }

    /// Removes a context for a key.
    pub fn remove_context(&mut self, key: &str) {
        if Arc::make_mut(&mut self.contexts).remove(key).is_some() {
            sentry_debug!("[Scope] Removed context: {}", key);
        }
    }

    /// Sets a extra to a specific value.
    pub fn set_extra(&mut self, key: &str, value: Value) {
        sentry_debug!("[Scope] Setting extra: {} = {:?}", key, value);
        Arc::make_mut(&mut self.extra).insert(key.to_string(), value);
    }

    /// Removes a extra.
    pub fn remove_extra(&mut self, key: &str) {
        if Arc::make_mut(&mut self.extra).remove(key).is_some() {
            sentry_debug!("[Scope] Removed extra: {}", key);
        }
    }

    /// Add an event processor to the scope.
    pub fn add_event_processor<F>(&mut self, f: F)
    where
        F: Fn(Event<'static>) -> Option<Event<'static>> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.event_processors).push(Arc::new(f));
        sentry_debug!(
            "[Scope] Added event processor (total: {})",
            self.event_processors.len()
        );
    }

    /// Applies the contained scoped data to fill an event.
    ///
    /// Values already present on the event win over the scope's, except for
    /// the level override.  Returns `None` if an event processor discarded
    /// the event.
    pub fn apply_to_event(&self, mut event: Event<'static>) -> Option<Event<'static>> {
        if let Some(level) = self.level {
            event.level = level;
        }

        if event.user.is_none() {
            if let Some(user) = self.user.as_deref() {
                event.user = Some(user.clone());
            }
        }

        event.breadcrumbs.extend(self.breadcrumbs.iter().cloned());
        for (key, value) in self.extra.iter() {
            event.extra.entry(key.clone()).or_insert_with(|| value.clone());
        }
        for (key, value) in self.tags.iter() {
            event.tags.entry(key.clone()).or_insert_with(|| value.clone());
        }
        for (key, value) in self.contexts.iter() {
            event
                .contexts
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        if event.transaction.is_none() {
            if let Some(txn) = self.transaction.as_deref() {
                event.transaction = Some(txn.to_owned());
            }
        }

        if event.fingerprint.len() == 1
            && (event.fingerprint[0] == "{{ default }}" || event.fingerprint[0] == "{{default}}")
        {
            if let Some(fp) = self.fingerprint.as_deref() {
                event.fingerprint = Cow::Owned(fp.to_owned());
            }
        }

        for (i, processor) in self.event_processors.iter().enumerate() {
            let id = event.event_id;
            event = match processor(event) {
                Some(event) => event,
                None => {
                    sentry_debug!("[Scope] Event processor {} dropped event {}", i + 1, id);
                    return None;
                }
            }
        }

        Some(event)
    }
}
