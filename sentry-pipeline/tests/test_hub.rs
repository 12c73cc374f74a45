#![cfg(feature = "test")]

use std::sync::Arc;
use std::time::Duration;

use sentry_pipeline::protocol::{Event, Value};
use sentry_pipeline::test::{captured_client, captured_client_with_backend};
use sentry_pipeline::{Breadcrumb, ClientOptions, DropReason, Hub, Level, Scope};

fn breadcrumb(message: &str) -> Breadcrumb {
    Breadcrumb {
        ty: "log".into(),
        message: Some(message.into()),
        ..Default::default()
    }
}

fn messages(breadcrumbs: impl IntoIterator<Item = Breadcrumb>) -> Vec<String> {
    breadcrumbs
        .into_iter()
        .filter_map(|breadcrumb| breadcrumb.message)
        .collect()
}

#[tokio::test]
async fn test_hub_capture_and_last_event_id() {
    let (client, transport) = captured_client(ClientOptions::default());
    let hub = Hub::new(Some(Arc::new(client)), Scope::default());
    assert_eq!(hub.last_event_id(), None);

    hub.configure_scope(|scope| scope.set_tag("worker", "worker1"));
    let response = hub.capture_message("Hello World!", Level::Warning).await.unwrap();

    let event = transport.fetch_and_clear_events().pop().unwrap();
    assert_eq!(event.tags.get("worker").map(String::as_str), Some("worker1"));
    assert_eq!(response.event_id, Some(event.event_id));
    assert_eq!(hub.last_event_id(), Some(event.event_id));
}

#[tokio::test]
async fn test_hub_without_client() {
    let hub = Hub::new(None, Scope::default());
    let response = hub.capture_message("nobody listens", Level::Error).await.unwrap();
    assert_eq!(response.reason, Some(DropReason::Disabled));
    assert_eq!(hub.last_event_id(), None);
    assert!(hub.close(None).await);
}

#[tokio::test]
async fn test_breadcrumbs_are_attached() {
    let (client, transport) = captured_client(ClientOptions::default());
    let hub = Hub::new(Some(Arc::new(client)), Scope::default());

    hub.add_breadcrumb(breadcrumb("First breadcrumb"), None);
    hub.add_breadcrumb(breadcrumb("Second breadcrumb"), None);
    hub.capture_message("Hello World!", Level::Warning).await.unwrap();

    let event = transport.fetch_and_clear_events().pop().unwrap();
    assert_eq!(
        messages(event.breadcrumbs),
        ["First breadcrumb", "Second breadcrumb"]
    );
}

#[tokio::test]
async fn test_breadcrumb_cap_evicts_oldest() {
    let (client, _transport) = captured_client(ClientOptions {
        max_breadcrumbs: 3,
        ..Default::default()
    });

    let mut scope = Scope::default();
    for i in 0..5 {
        assert!(client.add_breadcrumb(breadcrumb(&i.to_string()), None, &mut scope));
    }
    assert_eq!(messages(scope.breadcrumbs().iter().cloned()), ["2", "3", "4"]);
}

#[tokio::test]
async fn test_breadcrumb_cap_is_clamped() {
    let (client, _transport) = captured_client(ClientOptions {
        max_breadcrumbs: 1000,
        ..Default::default()
    });

    let mut scope = Scope::default();
    for i in 0..150 {
        client.add_breadcrumb(breadcrumb(&i.to_string()), None, &mut scope);
    }
    assert_eq!(scope.breadcrumbs().len(), sentry_pipeline::MAX_BREADCRUMBS);
    assert_eq!(scope.breadcrumbs()[0].message.as_deref(), Some("50"));
}

#[tokio::test]
async fn test_sent_event_breadcrumbs_respect_cap() {
    let (client, transport) = captured_client(ClientOptions {
        max_breadcrumbs: 5,
        ..Default::default()
    });
    let hub = Hub::new(Some(Arc::new(client)), Scope::default());
    for i in 0..5 {
        hub.add_breadcrumb(breadcrumb(&format!("scope {}", i)), None);
    }

    let event = Event {
        message: Some("prebuilt".into()),
        breadcrumbs: (0..5).map(|i| breadcrumb(&format!("event {}", i))).collect(),
        ..Default::default()
    };
    hub.capture_event(event).await.unwrap();

    let sent = transport.fetch_and_clear_events().pop().unwrap();
    assert_eq!(
        messages(sent.breadcrumbs),
        ["scope 0", "scope 1", "scope 2", "scope 3", "scope 4"]
    );
}

#[tokio::test]
async fn test_zero_max_breadcrumbs_records_nothing() {
    let (client, backend, _transport) = captured_client_with_backend(ClientOptions {
        max_breadcrumbs: 0,
        ..Default::default()
    });

    let mut scope = Scope::default();
    assert!(!client.add_breadcrumb(breadcrumb("ignored"), None, &mut scope));
    assert!(scope.breadcrumbs().is_empty());
    assert_eq!(backend.breadcrumbs_seen(), 0);
}

#[tokio::test]
async fn test_before_breadcrumb_runs_before_backend() {
    let (client, backend, _transport) =
        captured_client_with_backend(ClientOptions::configure(|o| {
            o.set_before_breadcrumb(|mut breadcrumb, hint| {
                if breadcrumb.category.as_deref() == Some("ui.click") {
                    return None;
                }
                if let Some(hint) = hint {
                    breadcrumb.data.extend(hint.data.clone());
                }
                Some(breadcrumb)
            })
        }));

    let mut scope = Scope::default();
    let click = Breadcrumb {
        category: Some("ui.click".into()),
        ..Default::default()
    };
    assert!(!client.add_breadcrumb(click, None, &mut scope));
    assert_eq!(backend.breadcrumbs_seen(), 0);

    let mut hint = sentry_pipeline::BreadcrumbHint::default();
    hint.data.insert("status".into(), 200.into());
    assert!(client.add_breadcrumb(breadcrumb("fetch"), Some(&hint), &mut scope));
    assert_eq!(backend.breadcrumbs_seen(), 1);
    assert_eq!(scope.breadcrumbs()[0].data.get("status"), Some(&Value::from(200)));
}

#[tokio::test]
async fn test_backend_can_veto_breadcrumbs() {
    let (client, backend, transport) = captured_client_with_backend(ClientOptions::default());
    backend.set_veto_breadcrumbs(true);
    let hub = Hub::new(Some(Arc::new(client)), Scope::default());

    hub.add_breadcrumb(breadcrumb("vetoed"), None);
    assert_eq!(backend.breadcrumbs_seen(), 1);
    assert!(hub.scope().breadcrumbs().is_empty());
    assert_eq!(backend.scopes_stored(), 0);

    hub.capture_message("Hello", Level::Info).await.unwrap();
    assert!(transport.fetch_and_clear_events()[0].breadcrumbs.is_empty());
}

#[tokio::test]
async fn test_scope_changes_are_stored_on_backend() {
    let (client, backend, _transport) = captured_client_with_backend(ClientOptions::default());
    let hub = Hub::new(Some(Arc::new(client)), Scope::default());

    hub.configure_scope(|scope| scope.set_tag("a", 1));
    hub.add_breadcrumb(breadcrumb("stored"), None);
    assert_eq!(backend.scopes_stored(), 2);
}

#[tokio::test]
async fn test_push_scope_and_with_scope() {
    let (client, transport) = captured_client(ClientOptions::default());
    let hub = Hub::new(Some(Arc::new(client)), Scope::default());
    hub.configure_scope(|scope| scope.set_tag("outer", "yes"));

    {
        let _guard = hub.push_scope();
        hub.configure_scope(|scope| scope.set_tag("inner", "yes"));
        hub.capture_message("inside", Level::Info).await.unwrap();
    }
    hub.capture_message("outside", Level::Info).await.unwrap();

    let user = sentry_pipeline::User {
        id: Some("42".into()),
        ..Default::default()
    };
    let seen = hub.with_scope(
        |scope| scope.set_user(Some(user.clone())),
        || hub.scope().user().cloned(),
    );
    assert_eq!(seen, Some(user));
    assert_eq!(hub.scope().user(), None);

    let events = transport.fetch_and_clear_events();
    assert_eq!(events.len(), 2);
    assert!(events[0].tags.contains_key("inner"));
    assert!(events[0].tags.contains_key("outer"));
    assert!(!events[1].tags.contains_key("inner"));
    assert!(events[1].tags.contains_key("outer"));
}

#[tokio::test(start_paused = true)]
async fn test_scope_snapshot_is_isolated_from_later_changes() {
    let (client, transport) = captured_client(ClientOptions::configure(|o| {
        o.set_before_send_async(|event, _| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Some(event)
        })
    }));
    let hub = Hub::new(Some(Arc::new(client)), Scope::default());
    hub.configure_scope(|scope| scope.set_tag("phase", "before"));

    let capture = tokio::spawn({
        let hub = hub.clone();
        async move { hub.capture_message("snapshot", Level::Info).await }
    });
    tokio::task::yield_now().await;
    hub.configure_scope(|scope| scope.set_tag("phase", "after"));
    capture.await.unwrap().unwrap();

    let event = transport.fetch_and_clear_events().pop().unwrap();
    assert_eq!(event.tags.get("phase").map(String::as_str), Some("before"));
}

#[test]
#[should_panic(expected = "Popped scope guard out of order")]
fn test_scope_guards_out_of_order() {
    let hub = Hub::new(None, Scope::default());
    let first = hub.push_scope();
    let second = hub.push_scope();
    std::mem::forget(second);
    drop(first);
}
