#![cfg(feature = "test")]

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use sentry_pipeline::test::captured_client;
use sentry_pipeline::{ClientOptions, Hub, Level, Status};

#[tokio::test(start_paused = true)]
async fn test_buffer_size_bounds_concurrent_sends() {
    let _ = pretty_env_logger::try_init();
    let (client, transport) = captured_client(ClientOptions {
        buffer_size: Some(2),
        ..Default::default()
    });
    transport.set_delay(Some(Duration::from_millis(50)));

    let captures = (0..6).map(|i| {
        let message = format!("event {}", i);
        let client = &client;
        async move { client.capture_message(&message, Level::Error, None, None).await }
    });
    let responses = join_all(captures).await;

    assert!(responses
        .iter()
        .all(|response| response.as_ref().unwrap().status == Status::Success));
    assert_eq!(transport.max_in_flight(), 2);
    assert_eq!(transport.fetch_and_clear_events().len(), 6);
    assert!(client.backend().buffer().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_queued_deliveries_start_in_order() {
    let (client, transport) = captured_client(ClientOptions {
        buffer_size: Some(1),
        ..Default::default()
    });
    transport.set_delay(Some(Duration::from_millis(10)));

    let captures = (0..5).map(|i| {
        let message = i.to_string();
        let client = &client;
        async move { client.capture_message(&message, Level::Error, None, None).await }
    });
    join_all(captures).await;

    let order: Vec<String> = transport
        .fetch_and_clear_events()
        .into_iter()
        .filter_map(|event| event.message)
        .collect();
    assert_eq!(order, ["0", "1", "2", "3", "4"]);
    assert_eq!(transport.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_buffer() {
    let (client, transport) = captured_client(ClientOptions {
        buffer_size: None,
        ..Default::default()
    });
    transport.set_delay(Some(Duration::from_millis(10)));

    let captures = (0..40).map(|_| client.capture_message("burst", Level::Error, None, None));
    join_all(captures).await;

    assert_eq!(transport.max_in_flight(), 40);
}

#[tokio::test(start_paused = true)]
async fn test_close_times_out_on_slow_transport() {
    let _ = pretty_env_logger::try_init();
    let (client, transport) = captured_client(ClientOptions::default());
    transport.set_delay(Some(Duration::from_secs(10)));
    let client = Arc::new(client);

    let capture = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .capture_message("slow", Level::Error, None, None)
                .await
        }
    });
    tokio::task::yield_now().await;
    assert_eq!(client.backend().buffer().len(), 1);

    assert!(!client.close(Some(Duration::from_millis(100))).await);

    // the delivery was not cancelled by the timeout
    assert!(client.flush(None).await);
    let response = capture.await.unwrap().unwrap();
    assert_eq!(response.status, Status::Success);
    assert_eq!(transport.fetch_and_clear_events().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_without_timeout_waits_for_deliveries() {
    // longer than the default shutdown_timeout
    let (client, transport) = captured_client(ClientOptions::default());
    transport.set_delay(Some(Duration::from_secs(5)));
    let client = Arc::new(client);

    let capture = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .capture_message("slow but sure", Level::Error, None, None)
                .await
        }
    });
    tokio::task::yield_now().await;
    assert_eq!(client.backend().buffer().len(), 1);

    assert!(client.close(None).await);
    assert!(client.backend().buffer().is_empty());
    assert_eq!(capture.await.unwrap().unwrap().status, Status::Success);
}

#[tokio::test(start_paused = true)]
async fn test_hub_close_uses_shutdown_timeout() {
    let (client, transport) = captured_client(ClientOptions {
        shutdown_timeout: Duration::from_secs(1),
        ..Default::default()
    });
    transport.set_delay(Some(Duration::from_secs(5)));
    let hub = Hub::new(Some(Arc::new(client)), Default::default());

    let capture = tokio::spawn({
        let hub = hub.clone();
        async move { hub.capture_message("too slow", Level::Error).await }
    });
    tokio::task::yield_now().await;

    assert!(!hub.close(None).await);
    assert!(hub.close(Some(Duration::from_secs(10))).await);
    assert!(capture.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_close_with_nothing_pending() {
    let (client, _transport) = captured_client(ClientOptions::default());
    assert!(client.close(Some(Duration::from_millis(10))).await);
    assert!(client.flush(None).await);
}
