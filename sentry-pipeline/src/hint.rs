use crate::protocol::{Map, Value};
use crate::types::Uuid;

/// Extra information passed alongside an event through the pipeline.
///
/// Hints are handed to `before_send` and to the backend, but never end up in
/// the event payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventHint {
    /// Forces the id of the created event.
    pub event_id: Option<Uuid>,
    /// Arbitrary data for hooks and backends.
    pub data: Map<String, Value>,
}

impl EventHint {
    /// Creates a hint that forces the given event id.
    pub fn with_event_id(event_id: Uuid) -> Self {
        EventHint {
            event_id: Some(event_id),
            ..Default::default()
        }
    }
}

/// Extra information passed to `before_breadcrumb`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BreadcrumbHint {
    /// Arbitrary data for hooks.
    pub data: Map<String, Value>,
}
