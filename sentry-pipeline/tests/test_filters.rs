#![cfg(feature = "test")]

use std::sync::Arc;

use sentry_pipeline::protocol::{Event, Exception, Frame, Stacktrace};
use sentry_pipeline::test::{captured_client, TestBackend, TestTransport};
use sentry_pipeline::{
    Client, ClientOptions, DropReason, FilterOptions, FilterReason, Level, Pattern, Status,
};

fn event_from_url(url: &str) -> Event<'static> {
    Event {
        exception: vec![Exception {
            ty: "TypeError".into(),
            value: Some("undefined is not a function".into()),
            stacktrace: Some(Stacktrace {
                frames: vec![
                    Frame {
                        filename: Some("https://example.com/app.js".into()),
                        ..Default::default()
                    },
                    Frame {
                        filename: Some(url.into()),
                        ..Default::default()
                    },
                ],
            }),
            ..Default::default()
        }]
        .into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_ignored_messages_are_dropped() {
    let (client, transport) = captured_client(ClientOptions {
        ignore_errors: vec![
            "ResizeObserver".into(),
            Pattern::regex(r"^Script error\.?$").unwrap(),
        ],
        ..Default::default()
    });

    for message in ["ResizeObserver loop limit exceeded", "Script error."] {
        let response = client
            .capture_message(message, Level::Error, None, None)
            .await
            .unwrap();
        assert_eq!(
            response.reason,
            Some(DropReason::InboundFilter(FilterReason::IgnoredError))
        );
    }

    let response = client
        .capture_message("Script error in checkout", Level::Error, None, None)
        .await
        .unwrap();
    assert_eq!(response.status, Status::Success);

    let events = transport.fetch_and_clear_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message.as_deref(), Some("Script error in checkout"));
}

#[derive(Debug, thiserror::Error)]
#[error("undefined is not a function")]
struct TypeError;

#[tokio::test]
async fn test_ignored_exceptions_are_dropped() {
    let (client, transport) = captured_client(ClientOptions {
        ignore_errors: vec!["TypeError: undefined".into()],
        ..Default::default()
    });

    let response = client.capture_exception(&TypeError, None, None).await.unwrap();
    assert!(response.is_skipped());
    assert!(transport.fetch_and_clear_events().is_empty());
}

#[tokio::test]
async fn test_blacklisted_urls_are_dropped() {
    let (client, transport) = captured_client(ClientOptions {
        blacklist_urls: vec!["https://awesome-analytics.io".into()],
        ..Default::default()
    });

    let response = client
        .capture_event(
            event_from_url("https://awesome-analytics.io/some/file.js"),
            None,
            None,
        )
        .await
        .unwrap();
    assert_eq!(
        response.reason,
        Some(DropReason::InboundFilter(FilterReason::BlacklistedUrl(
            "https://awesome-analytics.io/some/file.js".into()
        )))
    );

    client
        .capture_event(event_from_url("https://example.com/vendor.js"), None, None)
        .await
        .unwrap();
    assert_eq!(transport.fetch_and_clear_events().len(), 1);
}

#[tokio::test]
async fn test_whitelist_keeps_only_matching_urls() {
    let (client, transport) = captured_client(ClientOptions {
        whitelist_urls: vec![Pattern::regex(r"^https://example\.com/").unwrap()],
        ..Default::default()
    });

    let response = client
        .capture_event(event_from_url("https://cdn.thirdparty.net/lib.js"), None, None)
        .await
        .unwrap();
    assert!(matches!(
        response.reason,
        Some(DropReason::InboundFilter(FilterReason::NotWhitelistedUrl(_)))
    ));

    client
        .capture_event(event_from_url("https://example.com/vendor.js"), None, None)
        .await
        .unwrap();

    // messages carry no frames and are never filtered by url
    client
        .capture_message("no frames", Level::Error, None, None)
        .await
        .unwrap();

    assert_eq!(transport.fetch_and_clear_events().len(), 2);
}

#[tokio::test]
async fn test_blacklist_wins_over_whitelist() {
    let (client, transport) = captured_client(ClientOptions::configure(|o| {
        o.set_filters(FilterOptions {
            blacklist_urls: vec!["https://awesome-analytics.io".into()],
            whitelist_urls: vec!["https://awesome-analytics.io".into()],
            ..Default::default()
        })
    }));

    let response = client
        .capture_event(
            event_from_url("https://awesome-analytics.io/some/file.js"),
            None,
            None,
        )
        .await
        .unwrap();
    assert!(matches!(
        response.reason,
        Some(DropReason::InboundFilter(FilterReason::BlacklistedUrl(_)))
    ));
    assert!(transport.fetch_and_clear_events().is_empty());
}

#[tokio::test]
async fn test_filters_run_after_before_send() {
    let (client, transport) = captured_client(ClientOptions::configure(|o| {
        o.ignore_errors = vec!["[filtered]".into()];
        o.set_before_send(|mut event, _| {
            if let Some(ref mut message) = event.message {
                message.insert_str(0, "[filtered] ");
            }
            Some(event)
        })
    }));

    let response = client
        .capture_message("rewritten", Level::Error, None, None)
        .await
        .unwrap();
    assert_eq!(
        response.reason,
        Some(DropReason::InboundFilter(FilterReason::IgnoredError))
    );
    assert!(transport.fetch_and_clear_events().is_empty());
}

#[tokio::test]
async fn test_backend_default_ignore_errors() {
    let transport = TestTransport::new();
    let options = ClientOptions {
        ignore_errors: vec!["user supplied".into()],
        transport: Some(Arc::new(transport.clone())),
        ..Default::default()
    };
    let backend =
        TestBackend::with_default_ignore_errors(&options, vec!["Non-Error exception".into()]);
    let client = Client::with_backend(options, backend);

    // nothing is filtered before installation
    client
        .capture_message("Non-Error exception captured", Level::Error, None, None)
        .await
        .unwrap();
    assert_eq!(transport.fetch_and_clear_events().len(), 1);

    assert!(client.install());
    let patterns: Vec<String> = client
        .filters()
        .options()
        .unwrap()
        .ignore_errors
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(patterns, ["\"Non-Error exception\"", "\"user supplied\""]);

    for message in ["Non-Error exception captured", "user supplied noise"] {
        let response = client
            .capture_message(message, Level::Error, None, None)
            .await
            .unwrap();
        assert!(response.is_skipped());
    }
    assert!(transport.fetch_and_clear_events().is_empty());
}

#[tokio::test]
async fn test_filter_configuration_is_frozen_on_install() {
    let (client, transport) = captured_client(ClientOptions {
        ignore_errors: vec!["first".into()],
        ..Default::default()
    });

    assert!(!client.filters().install(Some(FilterOptions {
        ignore_errors: vec!["second".into()],
        ..Default::default()
    })));

    client
        .capture_message("second", Level::Error, None, None)
        .await
        .unwrap();
    let response = client
        .capture_message("first", Level::Error, None, None)
        .await
        .unwrap();
    assert!(response.is_skipped());
    assert_eq!(transport.fetch_and_clear_events().len(), 1);
}
