//! End-to-end streaming tests against a mock service.

use fauna_client::{Client, ConnectionConfig, Dialect, ErrorKind, StreamEventType};
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STREAM_BODY: &str = concat!(
    "{\"type\":\"start\",\"event\":1620000000000000}\n",
    "{\"type\":\"version\",\"txn\":1,\"event\":{\"action\":\"update\",\"document\":{\"data\":{\"testField\":\"testValue1\"}}}}\n",
    "{\"type\":\"version\",\"txn\":2,\"event\":{\"action\":\"update\",\"document\":{\"data\":{\"testField\":\"testValue2\"}}}}\n",
    "{\"type\":\"version\",\"txn\":3,\"event\":{\"action\":\"update\",\"document\":{\"data\":{\"testField\":\"testValue3\"}}}}\n",
);

fn client_for(server: &MockServer) -> Client {
    let mut config = ConnectionConfig::new("valid-secret", Dialect::Rust);
    config.endpoint = Url::parse(&server.uri()).unwrap();
    config.check_latest_version = false;
    Client::connect(config).unwrap()
}

async fn mount_stream(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/stream"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(STREAM_BODY, "application/x-ndjson"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn one_subscriber_receives_start_then_versions_in_order() {
    let server = MockServer::start().await;
    mount_stream(&server).await;

    let client = client_for(&server);
    let source = client
        .stream(json!({"@ref": "classes/spells/1234"}))
        .await
        .unwrap();
    let mut stream = source.subscribe().unwrap();
    stream.request(4);

    let start = stream.next().await.unwrap().unwrap();
    assert_eq!(start.event_type, StreamEventType::Start);

    for expected in ["testValue1", "testValue2", "testValue3"] {
        let event = stream.next().await.unwrap().unwrap();
        assert_eq!(event.event_type, StreamEventType::Version);
        assert_eq!(event.event["document"]["data"]["testField"], expected);
    }
}

#[tokio::test]
async fn hundred_concurrent_streams_deliver_everything() {
    let server = MockServer::start().await;
    mount_stream(&server).await;

    let client = client_for(&server);
    let mut tasks = Vec::new();

    for _ in 0..100 {
        let source = client
            .stream(json!({"@ref": "classes/spells/1234"}))
            .await
            .unwrap();
        tasks.push(tokio::spawn(async move {
            let mut stream = source.subscribe().unwrap();
            stream.request(4);

            let start = stream.next().await.unwrap().unwrap();
            assert_eq!(start.event_type, StreamEventType::Start);

            for expected in ["testValue1", "testValue2", "testValue3"] {
                let event = stream.next().await.unwrap().unwrap();
                assert_eq!(event.event["document"]["data"]["testField"], expected);
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }
}

#[tokio::test]
async fn deliveries_never_exceed_requested_credit() {
    let server = MockServer::start().await;
    mount_stream(&server).await;

    let client = client_for(&server);
    let source = client
        .stream(json!({"@ref": "classes/spells/1234"}))
        .await
        .unwrap();
    let mut stream = source.subscribe().unwrap();
    stream.request(2);

    assert!(stream.next().await.unwrap().is_ok());
    assert!(stream.next().await.unwrap().is_ok());

    // Third event exists in the body but no credit remains for it.
    let starved = timeout(Duration::from_millis(150), stream.next()).await;
    assert!(starved.is_err(), "delivery exceeded the requested credit");

    stream.request(1);
    let third = stream.next().await.unwrap().unwrap();
    assert_eq!(third.event["document"]["data"]["testField"], "testValue2");
}

#[tokio::test]
async fn stream_open_failure_is_taxonomized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(401).set_body_raw(
            r#"{"errors":[{"code":"unauthorized","description":"Unauthorized"}]}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .stream(json!({"@ref": "classes/spells/1234"}))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn service_error_event_terminates_the_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            concat!(
                "{\"type\":\"start\",\"event\":1}\n",
                "{\"type\":\"error\",\"event\":{\"code\":\"permission denied\",\"description\":\"denied\"}}\n",
            ),
            "application/x-ndjson",
        ))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let source = client.stream(json!({"@ref": "x"})).await.unwrap();
    let mut stream = source.subscribe().unwrap();
    stream.request(2);

    assert!(stream.next().await.unwrap().is_ok());
    let err = stream.next().await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Streaming);
    assert_eq!(err.errors()[0].code, "permission denied");
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn closing_the_connection_terminates_active_streams() {
    let server = MockServer::start().await;
    mount_stream(&server).await;

    let client = client_for(&server);
    let source = client.stream(json!({"@ref": "x"})).await.unwrap();
    // No credit requested: the stream idles, waiting for demand.
    let mut stream = source.subscribe().unwrap();

    client.close();

    let err = timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("close must terminate the stream")
        .unwrap()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ClientClosed);
}
